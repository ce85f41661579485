use std::io::ErrorKind;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::engine;
use super::types::{ContainerMeta, ContainerRuntime, ContainerSpec, ContainerState, RuntimeError};

/// Production [`ContainerRuntime`] driving the `docker` binary.
///
/// Every query uses a structured `--format` so no human-readable output
/// is ever string-matched.
#[derive(Debug, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        DockerCli
    }

    fn run(&self, args: &[String]) -> Result<String, RuntimeError> {
        debug!(argv = %args.join(" "), "docker");
        let output = match Command::new("docker").args(args).output() {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RuntimeError::Unavailable(
                    "`docker` not found on PATH".to_string(),
                ));
            }
            Err(e) => return Err(RuntimeError::Unavailable(e.to_string())),
        };

        if !output.status.success() {
            return Err(RuntimeError::Command {
                command: format!("docker {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Subset of `docker inspect` output the manager needs.
#[derive(Debug, Deserialize)]
struct InspectPayload {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "State")]
    state: InspectState,
    #[serde(rename = "Config")]
    config: InspectConfig,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Env", default)]
    env: Vec<String>,
}

impl From<InspectPayload> for ContainerMeta {
    fn from(payload: InspectPayload) -> Self {
        ContainerMeta {
            // Docker prefixes names with a leading slash.
            name: payload.name.trim_start_matches('/').to_string(),
            state: ContainerState::from_docker(&payload.state.status),
            env: payload.config.env,
        }
    }
}

impl ContainerRuntime for DockerCli {
    fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name.clone(),
        ];
        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        for (host, inner) in &spec.binds {
            args.push("-v".into());
            args.push(format!("{}:{inner}", host.display()));
        }
        args.extend(engine::user_args());
        args.extend(spec.extra_args.iter().cloned());
        args.push(spec.image.clone());

        let stdout = self.run(&args)?;
        Ok(stdout.trim().to_string())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, RuntimeError> {
        let args: Vec<String> = vec![
            "ps".into(),
            "-a".into(),
            "--filter".into(),
            // Docker name filters are regexes over `/name`.
            format!("name=^/{prefix}"),
            "--format".into(),
            "{{.Names}}".into(),
        ];
        let stdout = self.run(&args)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn inspect(&self, name: &str) -> Result<ContainerMeta, RuntimeError> {
        let args: Vec<String> = vec![
            "inspect".into(),
            "--format".into(),
            "{{json .}}".into(),
            name.into(),
        ];
        let stdout = match self.run(&args) {
            Ok(out) => out,
            Err(e @ RuntimeError::Unavailable(_)) => return Err(e),
            Err(e) => {
                return Err(RuntimeError::Inspect {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let payload: InspectPayload =
            serde_json::from_str(stdout.trim()).map_err(|e| RuntimeError::Inspect {
                name: name.to_string(),
                reason: format!("bad inspect payload: {e}"),
            })?;
        Ok(payload.into())
    }

    fn start(&self, name: &str) -> Result<(), RuntimeError> {
        self.run(&["start".into(), name.into()]).map(|_| ())
    }

    fn restart(&self, name: &str, timeout: Duration) -> Result<(), RuntimeError> {
        self.run(&[
            "restart".into(),
            "-t".into(),
            timeout.as_secs().to_string(),
            name.into(),
        ])
        .map(|_| ())
    }

    fn stop(&self, name: &str, grace: Duration) -> Result<(), RuntimeError> {
        self.run(&[
            "stop".into(),
            "-t".into(),
            grace.as_secs().to_string(),
            name.into(),
        ])
        .map(|_| ())
    }

    fn remove(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        let mut args: Vec<String> = vec!["rm".into()];
        if force {
            args.push("-f".into());
        }
        args.push(name.into());
        self.run(&args).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_payload_maps_to_meta() {
        let raw = r#"{
            "Name": "/fleet-node-2",
            "State": {"Status": "running", "Pid": 4242},
            "Config": {"Env": ["NODE_ID=102", "PATH=/usr/bin"], "Image": "acme/worker"}
        }"#;
        let payload: InspectPayload = serde_json::from_str(raw).unwrap();
        let meta: ContainerMeta = payload.into();
        assert_eq!(meta.name, "fleet-node-2");
        assert_eq!(meta.state, ContainerState::Running);
        assert_eq!(meta.env_var("NODE_ID"), Some("102"));
    }

    #[test]
    fn inspect_payload_tolerates_null_env() {
        // Containers created without env report Config.Env as null.
        let raw = r#"{"Name": "/x", "State": {"Status": "exited"}, "Config": {}}"#;
        let payload: InspectPayload = serde_json::from_str(raw).unwrap();
        let meta: ContainerMeta = payload.into();
        assert!(meta.env.is_empty());
        assert_eq!(meta.state, ContainerState::Stopped);
    }
}
