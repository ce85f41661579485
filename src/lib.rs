pub mod config;
pub mod docker;
pub mod fleet;
pub mod logsink;
pub mod prompt;
