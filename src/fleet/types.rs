use std::path::PathBuf;

use thiserror::Error;

use crate::docker::{ContainerState, RuntimeError};

use super::ident::NodeId;

/// Observed status of one instance. Transitions are driven only by
/// runtime observation, never asserted by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Create was issued; no observation yet.
    Requested,
    Running,
    Stopped,
    Failed,
    /// Metadata for this instance could not be read.
    Unknown,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Requested => "requested",
            InstanceStatus::Running => "running",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Failed => "failed",
            InstanceStatus::Unknown => "unknown",
        }
    }
}

impl From<ContainerState> for InstanceStatus {
    fn from(state: ContainerState) -> Self {
        match state {
            ContainerState::Running => InstanceStatus::Running,
            ContainerState::Stopped => InstanceStatus::Stopped,
            ContainerState::Dead => InstanceStatus::Failed,
        }
    }
}

/// One managed worker: slot, identity, container name, log sink, status.
#[derive(Debug, Clone)]
pub struct Instance {
    pub slot: u32,
    /// `None` when the container's metadata was unreadable.
    pub node_id: Option<NodeId>,
    pub container: String,
    pub log_path: Option<PathBuf>,
    pub status: InstanceStatus,
}

/// Result of a node-id conflict probe against live runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Free,
    /// The id is already bound to the instance at this slot.
    InUse(u32),
}

/// What to do when a requested node id is already in use. Always an
/// explicit parameter; there is no destructive default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Abort the create, leaving the existing instance untouched.
    Skip,
    /// Tear down the existing instance first, then create.
    Replace,
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("node id {node_id} is already in use by slot {slot}")]
    Conflict { node_id: NodeId, slot: u32 },
    /// The runtime rejected the create call; carries its diagnostic.
    #[error("container create failed: {0}")]
    Creation(String),
    #[error("log sink not ready: {0}")]
    LogSink(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Runtime(RuntimeError),
}

impl CreateError {
    /// True when the whole batch should stop, not just this instance.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CreateError::Runtime(e) if e.is_fatal())
    }
}

/// How a single restart concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartResult {
    /// Graceful restart succeeded within the timeout.
    Restarted,
    /// Graceful restart failed; stop+start escalation recovered it.
    Recovered,
    Failed(String),
}

impl RestartResult {
    pub fn is_ok(&self) -> bool {
        !matches!(self, RestartResult::Failed(_))
    }
}

/// Per-instance entry in a `restart all` report.
#[derive(Debug, Clone)]
pub struct RestartOutcome {
    pub slot: u32,
    pub node_id: Option<NodeId>,
    pub result: RestartResult,
}

/// Per-instance entry in a batch start report.
#[derive(Debug)]
pub struct BatchEntry {
    pub node_id: NodeId,
    pub outcome: Result<Instance, CreateError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_from_container_state() {
        assert_eq!(
            InstanceStatus::from(ContainerState::Running),
            InstanceStatus::Running
        );
        assert_eq!(
            InstanceStatus::from(ContainerState::Stopped),
            InstanceStatus::Stopped
        );
        assert_eq!(
            InstanceStatus::from(ContainerState::Dead),
            InstanceStatus::Failed
        );
    }

    #[test]
    fn only_unavailable_runtime_errors_are_batch_fatal() {
        let conflict = CreateError::Conflict {
            node_id: NodeId::parse("7").unwrap(),
            slot: 1,
        };
        assert!(!conflict.is_fatal());
        assert!(!CreateError::Creation("image missing".into()).is_fatal());
        assert!(CreateError::Runtime(RuntimeError::Unavailable("gone".into())).is_fatal());
    }
}
