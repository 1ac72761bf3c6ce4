//! Deploy and reset bodies, run while the gate is held.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shared_types::OperationKind;
use tracing::info;

use crate::archive::ArchiveSource;
use crate::error::DeployError;
use crate::orchestrator::{ComposeAction, Orchestrator};

/// Composes the archive source and the orchestrator into the two
/// operations. Every step runs in order; the first error ends the operation
/// and nothing already done is undone.
pub struct Deployer {
    archive: Arc<dyn ArchiveSource>,
    orchestrator: Arc<dyn Orchestrator>,
    compose_dir: PathBuf,
    rebuild_on_deploy: bool,
}

impl Deployer {
    pub fn new(
        archive: Arc<dyn ArchiveSource>,
        orchestrator: Arc<dyn Orchestrator>,
        compose_dir: PathBuf,
        rebuild_on_deploy: bool,
    ) -> Self {
        Self {
            archive,
            orchestrator,
            compose_dir,
            rebuild_on_deploy,
        }
    }

    pub fn compose_dir(&self) -> &Path {
        &self.compose_dir
    }

    pub async fn run(&self, kind: OperationKind) -> Result<(), DeployError> {
        match kind {
            OperationKind::Deploy => self.deploy().await,
            OperationKind::Reset => self.reset().await,
        }
    }

    /// Fetch and unpack the archive, then `down` and `up` the project.
    pub async fn deploy(&self) -> Result<(), DeployError> {
        self.archive.fetch_and_unpack().await?;
        self.require_compose_dir()?;

        self.step(ComposeAction::Down).await?;
        let up = if self.rebuild_on_deploy {
            ComposeAction::UpBuild
        } else {
            ComposeAction::Up
        };
        self.step(up).await
    }

    /// `down -v` then `up` against the tree already on disk.
    pub async fn reset(&self) -> Result<(), DeployError> {
        self.require_compose_dir()?;

        self.step(ComposeAction::DownVolumes).await?;
        self.step(ComposeAction::Up).await
    }

    async fn step(&self, action: ComposeAction) -> Result<(), DeployError> {
        self.orchestrator.run(action, &self.compose_dir).await?;
        info!(%action, "step complete");
        Ok(())
    }

    fn require_compose_dir(&self) -> Result<(), DeployError> {
        if self.compose_dir.is_dir() {
            Ok(())
        } else {
            Err(DeployError::MissingComposeDir(self.compose_dir.clone()))
        }
    }
}
