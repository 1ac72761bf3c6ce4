use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Host the agent listens on
    pub host: String,
    /// Port the agent listens on
    pub port: u16,
    /// Opaque path segment in front of `/deploy` and `/reset`
    pub route_token: String,
    /// Archive host, e.g. `https://codeload.github.com`
    pub archive_base_url: String,
    pub archive_owner: String,
    pub archive_repo: String,
    pub archive_branch: String,
    /// Root for everything the agent writes
    pub work_dir: PathBuf,
    /// Wiped and re-created on every deploy
    pub extract_dir: PathBuf,
    /// Working directory for orchestrator commands
    pub compose_dir: PathBuf,
    /// Orchestrator command line, split like a shell would
    pub compose_command: String,
    /// Use `up -d --build` on deploy
    pub rebuild_on_deploy: bool,
    /// Upper bound on one deploy or reset
    pub operation_timeout: Duration,
    /// Connect and read timeout for the archive download
    pub fetch_timeout: Duration,
    /// Minimum gap after a successful run of the same operation; zero disables it
    pub cooldown: Duration,
    /// Kill the running orchestrator process when an operation times out
    pub kill_on_timeout: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let env = Env(&lookup);

        let route_token = env.required("DEPLOY_ROUTE_TOKEN")?;
        validate_route_token(&route_token)?;

        let archive_owner = env.required("DEPLOY_ARCHIVE_OWNER")?;
        let archive_repo = env.required("DEPLOY_ARCHIVE_REPO")?;
        let archive_branch = env.str("DEPLOY_ARCHIVE_BRANCH", "main");

        let work_dir = PathBuf::from(env.str("DEPLOY_WORK_DIR", "./deploy"));
        let extract_dir = env
            .get("DEPLOY_EXTRACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| work_dir.join("src"));
        // Zip archives from codeload unpack into `{repo}-{branch}` with `/` flattened.
        let compose_dir = env
            .get("DEPLOY_COMPOSE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                extract_dir.join(format!("{archive_repo}-{}", archive_branch.replace('/', "-")))
            });

        Ok(Self {
            host: env.str("DEPLOY_HOST", "0.0.0.0"),
            port: env.parse("DEPLOY_PORT", 8080)?,
            route_token,
            archive_base_url: env
                .str("DEPLOY_ARCHIVE_BASE_URL", "https://codeload.github.com")
                .trim_end_matches('/')
                .to_string(),
            archive_owner,
            archive_repo,
            archive_branch,
            work_dir,
            extract_dir,
            compose_dir,
            compose_command: env.str("DEPLOY_COMPOSE_COMMAND", "docker compose"),
            rebuild_on_deploy: env.parse("DEPLOY_REBUILD", false)?,
            operation_timeout: Duration::from_secs(env.parse("DEPLOY_TIMEOUT_SECS", 600)?),
            fetch_timeout: Duration::from_secs(env.parse("DEPLOY_FETCH_TIMEOUT_SECS", 30)?),
            cooldown: Duration::from_secs(env.parse("DEPLOY_COOLDOWN_SECS", 0)?),
            kill_on_timeout: env.parse("DEPLOY_KILL_ON_TIMEOUT", false)?,
        })
    }

    pub fn archive_url(&self) -> String {
        format!(
            "{}/{}/{}/zip/{}",
            self.archive_base_url, self.archive_owner, self.archive_repo, self.archive_branch
        )
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn str(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> anyhow::Result<String> {
        self.get(key)
            .ok_or_else(|| anyhow::anyhow!("Missing required env var {key}"))
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(val) => val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
            None => Ok(default),
        }
    }
}

/// The token becomes a literal path segment, so it must not contain
/// separators or route syntax.
fn validate_route_token(token: &str) -> anyhow::Result<()> {
    if token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Invalid DEPLOY_ROUTE_TOKEN: only ASCII letters, digits, '-' and '_' are allowed"
        ))
    }
}
