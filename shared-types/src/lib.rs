//! Shared types between the deploy agent and its callers
//!
//! These types are used by both:
//! - the `deployer` HTTP surface (response bodies)
//! - CI-side clients that trigger deploys and inspect the answer
//!
//! Serializable with serde for JSON over HTTP

use serde::{Deserialize, Serialize};

// ============================================================================
// Operations
// ============================================================================

/// The two long-running operations the agent can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Fetch the branch archive, unpack it, restart the compose project.
    Deploy,
    /// Tear the compose project down with its volumes and start it again.
    Reset,
}

impl OperationKind {
    /// Last path segment of the route that triggers this operation.
    pub fn path_segment(self) -> &'static str {
        match self {
            OperationKind::Deploy => "deploy",
            OperationKind::Reset => "reset",
        }
    }

    /// Status string returned in the 200 body.
    pub fn success_status(self) -> &'static str {
        match self {
            OperationKind::Deploy => STATUS_DEPLOYED,
            OperationKind::Reset => STATUS_RESET,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}

// ============================================================================
// Response bodies
// ============================================================================

/// Body of a successful deploy or reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn for_operation(kind: OperationKind) -> Self {
        Self {
            status: kind.success_status().to_string(),
        }
    }
}

/// Body of every non-200 answer (429, 500, 504).
///
/// For failed operations `detail` carries the captured diagnostic verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

// ============================================================================
// Status Constants
// ============================================================================

pub const STATUS_DEPLOYED: &str = "deployed via HTTP archive";
pub const STATUS_RESET: &str = "reset and deployed";

// ============================================================================
// Tests
// ============================================================================
