use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;

/// Cooperative cancellation token backed by an `AtomicBool`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Re-arm the token for the next command. The menu loop shares one
    /// token with the SIGINT handler and clears it between commands.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Failures surfaced by the container runtime capability.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The `docker` binary is missing or the daemon is unreachable.
    /// Fatal to the current command; the menu survives.
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
    /// A runtime command ran and rejected the request. Carries the
    /// runtime's own diagnostic, never a generic message.
    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
    /// Metadata for one container could not be read; listings degrade
    /// to `Unknown` for that entry instead of aborting.
    #[error("unreadable metadata for `{name}`: {reason}")]
    Inspect { name: String, reason: String },
}

impl RuntimeError {
    /// True when retrying against another container cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::Unavailable(_))
    }
}

/// Everything needed to create one worker container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// KEY, VALUE pairs passed as `-e KEY=VALUE`.
    pub env: Vec<(String, String)>,
    /// Host path, container path pairs passed as `-v host:container`.
    pub binds: Vec<(PathBuf, String)>,
    /// Operator-configured extra `docker run` arguments.
    pub extra_args: Vec<String>,
}

/// Coarse container state as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Dead,
}

impl ContainerState {
    /// Map a docker `State.Status` string onto the coarse state.
    pub fn from_docker(status: &str) -> Self {
        match status {
            "running" | "restarting" => ContainerState::Running,
            "created" | "exited" | "paused" => ContainerState::Stopped,
            _ => ContainerState::Dead,
        }
    }
}

/// Metadata read back from the runtime for one container.
#[derive(Debug, Clone)]
pub struct ContainerMeta {
    pub name: String,
    pub state: ContainerState,
    /// Raw `KEY=VALUE` environment entries from the container config.
    pub env: Vec<String>,
}

impl ContainerMeta {
    /// Look up one environment variable by key.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find_map(|entry| entry.strip_prefix(key)?.strip_prefix('='))
    }
}

/// The container runtime capability. All lifecycle operations the fleet
/// manager performs go through this seam; production uses [`super::DockerCli`],
/// tests substitute an in-memory fake.
pub trait ContainerRuntime {
    /// Create and start a container; returns the runtime's container id.
    fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;
    /// Names of all containers (running or not) whose name starts with
    /// `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<String>, RuntimeError>;
    fn inspect(&self, name: &str) -> Result<ContainerMeta, RuntimeError>;
    fn start(&self, name: &str) -> Result<(), RuntimeError>;
    /// Graceful restart bounded by `timeout`.
    fn restart(&self, name: &str, timeout: Duration) -> Result<(), RuntimeError>;
    fn stop(&self, name: &str, grace: Duration) -> Result<(), RuntimeError>;
    /// `force` removes a running container immediately.
    fn remove(&self, name: &str, force: bool) -> Result<(), RuntimeError>;
}

/// Describes a streamed docker invocation (build, log tail). The `args`
/// field is the full argument list passed to `docker`.
pub struct StreamCommand {
    pub args: Vec<String>,
    pub timeout: Duration,
    /// When set, the captured output is appended here on completion.
    pub log_path: Option<PathBuf>,
}

/// Outcome of a streamed run.
#[derive(Debug)]
pub struct StreamResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub log: String,
    pub cancelled: bool,
    pub timed_out: bool,
}

/// Streamed output from a running docker process.
#[derive(Debug)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
    Done(StreamResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_token_is_visible_across_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn cancel_token_reset_rearms() {
        let token = CancelToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn state_mapping_covers_docker_statuses() {
        assert_eq!(ContainerState::from_docker("running"), ContainerState::Running);
        assert_eq!(ContainerState::from_docker("restarting"), ContainerState::Running);
        assert_eq!(ContainerState::from_docker("exited"), ContainerState::Stopped);
        assert_eq!(ContainerState::from_docker("created"), ContainerState::Stopped);
        assert_eq!(ContainerState::from_docker("dead"), ContainerState::Dead);
    }

    #[test]
    fn env_var_lookup_requires_exact_key() {
        let meta = ContainerMeta {
            name: "fleet-node-1".into(),
            state: ContainerState::Running,
            env: vec!["NODE_ID=42".into(), "NODE_ID_EXTRA=9".into()],
        };
        assert_eq!(meta.env_var("NODE_ID"), Some("42"));
        assert_eq!(meta.env_var("NODE"), None);
        assert_eq!(meta.env_var("THREADS"), None);
    }

    #[test]
    fn unavailable_is_the_only_fatal_error() {
        assert!(RuntimeError::Unavailable("no docker".into()).is_fatal());
        assert!(
            !RuntimeError::Command {
                command: "docker rm x".into(),
                stderr: "no such container".into()
            }
            .is_fatal()
        );
    }
}
