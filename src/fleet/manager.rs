use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;
use crate::docker::{CancelToken, ContainerRuntime, ContainerSpec, RuntimeError};
use crate::logsink::LogSink;

use super::ident::NodeId;
use super::slot::{allocate_next_slot, container_name, parse_slot};
use super::types::{
    BatchEntry, Conflict, ConflictPolicy, CreateError, Instance, InstanceStatus, RestartOutcome,
    RestartResult,
};

/// Where the node log directory is mounted inside the worker container.
const WORKER_LOG_DIR: &str = "/var/log/worker";

/// The instance registry and lifecycle manager.
///
/// Holds no state of its own: every operation re-reads the live container
/// set through the runtime capability, so instances removed by other
/// tools are picked up rather than drifting.
pub struct FleetManager<'a, R: ContainerRuntime, L: LogSink> {
    cfg: &'a Config,
    runtime: &'a R,
    logs: &'a L,
}

impl<'a, R: ContainerRuntime, L: LogSink> FleetManager<'a, R, L> {
    pub fn new(cfg: &'a Config, runtime: &'a R, logs: &'a L) -> Self {
        Self { cfg, runtime, logs }
    }

    /// All managed instances, sorted by slot ascending.
    ///
    /// A container whose metadata cannot be read is reported with status
    /// `Unknown` instead of failing the whole listing. Containers whose
    /// names do not follow the `<prefix>-<slot>` convention are skipped.
    pub fn list_instances(&self) -> Result<Vec<Instance>, RuntimeError> {
        let names = self.runtime.list(&self.cfg.container_prefix)?;
        let mut instances = Vec::with_capacity(names.len());

        for name in names {
            let Some(slot) = parse_slot(&self.cfg.container_prefix, &name) else {
                continue;
            };
            let instance = match self.runtime.inspect(&name) {
                Ok(meta) => {
                    let node_id = meta.env_var("NODE_ID").and_then(|v| NodeId::parse(v).ok());
                    Instance {
                        slot,
                        node_id,
                        container: name,
                        log_path: node_id.map(|id| self.logs.path_for(id)),
                        status: meta.state.into(),
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(container = %name, error = %e, "metadata unreadable, reporting unknown");
                    Instance {
                        slot,
                        node_id: None,
                        container: name,
                        log_path: None,
                        status: InstanceStatus::Unknown,
                    }
                }
            };
            instances.push(instance);
        }

        instances.sort_by_key(|i| i.slot);
        Ok(instances)
    }

    /// The instance at `slot`, if any.
    pub fn instance_at(&self, slot: u32) -> Result<Option<Instance>, RuntimeError> {
        Ok(self.list_instances()?.into_iter().find(|i| i.slot == slot))
    }

    /// Probe live state for an instance already bound to `node_id`.
    pub fn check_conflict(&self, node_id: NodeId) -> Result<Conflict, RuntimeError> {
        let instances = self.list_instances()?;
        Ok(instances
            .iter()
            .find(|i| i.node_id == Some(node_id))
            .map_or(Conflict::Free, |i| Conflict::InUse(i.slot)))
    }

    /// Create one instance for `node_id`.
    ///
    /// The slot is allocated from live state immediately before the
    /// create call. No reservation exists outside the runtime, so a
    /// failed create leaves the slot free for the next attempt.
    pub fn create_instance(
        &self,
        node_id: NodeId,
        policy: ConflictPolicy,
    ) -> Result<Instance, CreateError> {
        let instances = self.list_instances().map_err(CreateError::Runtime)?;
        if let Some(existing) = instances.iter().find(|i| i.node_id == Some(node_id)) {
            match policy {
                ConflictPolicy::Skip => {
                    return Err(CreateError::Conflict {
                        node_id,
                        slot: existing.slot,
                    });
                }
                ConflictPolicy::Replace => {
                    debug!(slot = existing.slot, %node_id, "replacing existing instance");
                    match self.runtime.remove(&existing.container, true) {
                        Ok(()) => {}
                        Err(e) if e.is_fatal() => return Err(CreateError::Runtime(e)),
                        Err(e) => return Err(CreateError::Creation(e.to_string())),
                    }
                }
            }
        }

        // Re-read live slots after a possible replace removal.
        let slots: Vec<u32> = self
            .runtime
            .list(&self.cfg.container_prefix)
            .map_err(CreateError::Runtime)?
            .iter()
            .filter_map(|n| parse_slot(&self.cfg.container_prefix, n))
            .collect();
        let slot = allocate_next_slot(&slots);
        let name = container_name(&self.cfg.container_prefix, slot);

        // The log file must exist and be writable before the worker starts.
        let log_path = self
            .logs
            .ensure(node_id)
            .map_err(|e| CreateError::LogSink(format!("{e:#}")))?;

        let spec = self.worker_spec(node_id, &name, &log_path)?;
        debug!(container = %name, %node_id, "creating instance");
        match self.runtime.create(&spec) {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(CreateError::Runtime(e)),
            Err(RuntimeError::Command { stderr, .. }) => {
                return Err(CreateError::Creation(stderr));
            }
            Err(e) => return Err(CreateError::Creation(e.to_string())),
        }

        // Status comes from observation, not assumption.
        let status = match self.runtime.inspect(&name) {
            Ok(meta) => meta.state.into(),
            Err(_) => InstanceStatus::Unknown,
        };

        Ok(Instance {
            slot,
            node_id: Some(node_id),
            container: name,
            log_path: Some(log_path),
            status,
        })
    }

    /// Create instances for `ids` strictly in order, one at a time.
    ///
    /// Per-instance failures (conflict, rejected create) are recorded and
    /// the batch continues; an unreachable runtime stops the batch after
    /// recording the failure, leaving the already-created prefix standing.
    pub fn start_batch(&self, ids: &[NodeId]) -> Vec<BatchEntry> {
        let mut entries = Vec::with_capacity(ids.len());
        for &node_id in ids {
            let outcome = self.create_instance(node_id, ConflictPolicy::Skip);
            let fatal = outcome.as_ref().err().is_some_and(CreateError::is_fatal);
            entries.push(BatchEntry { node_id, outcome });
            if fatal {
                break;
            }
        }
        entries
    }

    /// Restart the instance at `slot`.
    ///
    /// Tries a graceful restart bounded by the configured timeout; on
    /// failure escalates to stop (bounded grace) followed by start. An
    /// interruption between steps leaves the instance at worst stopped,
    /// recoverable by a later start.
    pub fn restart(&self, slot: u32, cancel: &CancelToken) -> RestartResult {
        let name = container_name(&self.cfg.container_prefix, slot);

        match self.runtime.restart(&name, self.cfg.restart_timeout()) {
            Ok(()) => return RestartResult::Restarted,
            Err(e) if e.is_fatal() => return RestartResult::Failed(e.to_string()),
            Err(e) => {
                warn!(container = %name, error = %e, "graceful restart failed, escalating");
            }
        }

        if cancel.is_cancelled() {
            return RestartResult::Failed("interrupted before escalation".into());
        }

        // A failed stop may just mean the container is already down, so
        // the start is attempted either way.
        if let Err(e) = self.runtime.stop(&name, self.cfg.stop_grace()) {
            if e.is_fatal() {
                return RestartResult::Failed(e.to_string());
            }
            debug!(container = %name, error = %e, "stop during escalation failed");
        }

        if cancel.is_cancelled() {
            return RestartResult::Failed("interrupted; instance left stopped".into());
        }

        if let Err(e) = self.runtime.start(&name) {
            return RestartResult::Failed(e.to_string());
        }
        match self.runtime.inspect(&name) {
            Ok(meta) if meta.state == crate::docker::ContainerState::Running => {
                RestartResult::Recovered
            }
            Ok(meta) => RestartResult::Failed(format!(
                "started but observed {}",
                InstanceStatus::from(meta.state).as_str()
            )),
            Err(e) => RestartResult::Failed(e.to_string()),
        }
    }

    /// Restart every instance independently, continuing past individual
    /// failures. The report always has one entry per instance.
    pub fn restart_all(&self, cancel: &CancelToken) -> Result<Vec<RestartOutcome>, RuntimeError> {
        let instances = self.list_instances()?;
        let mut outcomes = Vec::with_capacity(instances.len());

        for instance in &instances {
            let result = if cancel.is_cancelled() {
                RestartResult::Failed("interrupted".into())
            } else {
                self.restart(instance.slot, cancel)
            };
            if let RestartResult::Failed(msg) = &result {
                warn!(slot = instance.slot, %msg, "restart failed");
            }
            outcomes.push(RestartOutcome {
                slot: instance.slot,
                node_id: instance.node_id,
                result,
            });
        }
        Ok(outcomes)
    }

    /// Forcefully remove every managed instance; returns the count.
    /// Idempotent: an empty fleet yields zero, not an error.
    pub fn stop_all(&self) -> Result<usize, RuntimeError> {
        let names = self.runtime.list(&self.cfg.container_prefix)?;
        let mut removed = 0;

        for name in names
            .iter()
            .filter(|n| parse_slot(&self.cfg.container_prefix, n).is_some())
        {
            match self.runtime.remove(name, true) {
                Ok(()) => removed += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(container = %name, error = %e, "failed to remove container"),
            }
        }
        Ok(removed)
    }

    fn worker_spec(
        &self,
        node_id: NodeId,
        name: &str,
        log_path: &Path,
    ) -> Result<ContainerSpec, CreateError> {
        let extra_args = self
            .cfg
            .run_extra_args()
            .map_err(|e| CreateError::Config(e.to_string()))?;

        let host_dir = log_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        // Bind mounts need an absolute host path.
        let host_dir = std::fs::canonicalize(&host_dir).unwrap_or(host_dir);
        let file_name = log_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(ContainerSpec {
            name: name.to_string(),
            image: self.cfg.image.clone(),
            env: vec![
                ("NODE_ID".into(), node_id.to_string()),
                ("THREADS".into(), self.cfg.threads.resolve().to_string()),
                ("NODE_LOG".into(), format!("{WORKER_LOG_DIR}/{file_name}")),
            ],
            binds: vec![(host_dir, WORKER_LOG_DIR.to_string())],
            extra_args,
        })
    }
}
