use std::fmt;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Per-node worker thread budget: `"auto"` or a fixed positive count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threads {
    Auto,
    Fixed(usize),
}

impl Threads {
    pub fn resolve(self) -> usize {
        match self {
            Threads::Fixed(n) => n,
            Threads::Auto => std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(1),
        }
    }
}

impl Serialize for Threads {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Threads::Auto => serializer.serialize_str("auto"),
            Threads::Fixed(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Threads {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ThreadsVisitor;

        impl<'de> Visitor<'de> for ThreadsVisitor {
            type Value = Threads;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"auto\" or a positive integer")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Threads, E> {
                if value == 0 {
                    return Err(E::custom("threads must be a positive integer"));
                }
                Ok(Threads::Fixed(value as usize))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Threads, E> {
                if value <= 0 {
                    return Err(E::custom("threads must be a positive integer"));
                }
                Ok(Threads::Fixed(value as usize))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Threads, E> {
                if value.eq_ignore_ascii_case("auto") {
                    Ok(Threads::Auto)
                } else {
                    Err(E::custom("threads must be \"auto\" or a positive integer"))
                }
            }
        }

        deserializer.deserialize_any(ThreadsVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tag of the worker image, both for `build` and `run`.
    pub image: String,
    /// Build context directory passed to `docker build`.
    pub build_context: String,
    /// Optional Dockerfile path relative to the build context.
    pub dockerfile: Option<String>,
    /// Container names are `<prefix>-<slot>`.
    pub container_prefix: String,
    /// Host directory holding one log file per node id.
    pub log_dir: String,
    pub threads: Threads,
    /// Bound on streaming operations (build, log tail), seconds.
    pub docker_timeout: u64,
    /// Graceful restart bound before escalating, seconds.
    pub restart_timeout: u64,
    /// Stop grace period used during restart escalation, seconds.
    pub stop_grace: u64,
    /// How many lines the `logs` command shows.
    pub logs_tail: u64,
    /// Extra arguments spliced into every `docker run`, shell-quoted.
    pub extra_run_args: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image: "nodefleet/worker:latest".to_string(),
            build_context: ".".to_string(),
            dockerfile: None,
            container_prefix: "fleet-node".to_string(),
            log_dir: "logs".to_string(),
            threads: Threads::Auto,
            docker_timeout: 600,
            restart_timeout: 10,
            stop_grace: 5,
            logs_tail: 200,
            extra_run_args: String::new(),
        }
    }
}

impl Config {
    pub fn docker_timeout(&self) -> Duration {
        Duration::from_secs(self.docker_timeout)
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace)
    }

    /// Split `extra_run_args` with shell quoting rules.
    pub fn run_extra_args(&self) -> anyhow::Result<Vec<String>> {
        if self.extra_run_args.trim().is_empty() {
            return Ok(Vec::new());
        }
        shell_words::split(&self.extra_run_args)
            .map_err(|e| anyhow::anyhow!("bad extra_run_args: {e}"))
    }
}
