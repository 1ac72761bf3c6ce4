use std::sync::Arc;
use std::time::Duration;

use crate::gate::OperationGate;
use crate::operations::Deployer;

/// Shared by every request handler. Built once at startup; the gate lives
/// here rather than in a global so tests can build as many as they like.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<OperationGate>,
    pub deployer: Arc<Deployer>,
    pub operation_timeout: Duration,
}

impl AppState {
    pub fn new(gate: OperationGate, deployer: Deployer, operation_timeout: Duration) -> Self {
        Self {
            gate: Arc::new(gate),
            deployer: Arc::new(deployer),
            operation_timeout,
        }
    }
}
