// Docker runtime capability — typed lifecycle ops, streaming output, cancellation.

pub mod cli;
pub mod engine;
pub mod stream;
pub mod types;

pub use cli::DockerCli;
pub use engine::{ensure_available, user_args};
pub use stream::spawn;
pub use types::{
    CancelToken, ContainerMeta, ContainerRuntime, ContainerSpec, ContainerState, OutputLine,
    RuntimeError, StreamCommand, StreamResult,
};
