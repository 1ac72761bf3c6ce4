use std::path::PathBuf;

/// Why a deploy or reset body failed.
///
/// The `Display` text is what callers see in the 500 body, so each variant
/// renders the diagnostic of the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Download, HTTP status or unzip failure.
    #[error("archive fetch failed: {0}")]
    UpstreamFetch(String),

    /// An orchestrator command could not be started or exited non-zero.
    #[error("`{command}` failed: {message}")]
    Orchestrator { command: String, message: String },

    /// The compose directory is absent, so there is nothing to run against.
    #[error("compose directory {} does not exist", .0.display())]
    MissingComposeDir(PathBuf),

    #[error("{0}")]
    Unexpected(String),
}

impl DeployError {
    pub fn upstream(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::UpstreamFetch(format!("{context}: {err}"))
    }
}
