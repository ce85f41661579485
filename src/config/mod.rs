// Fleet configuration — `.fleetrc` file plus defaults.

pub mod loader;
pub mod types;

pub use loader::load;
pub use types::{Config, Threads};
