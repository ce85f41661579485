// Instance registry & lifecycle — slots, node identities, create/list/restart/teardown.

pub mod ident;
pub mod manager;
pub mod slot;
pub mod types;

pub use ident::{InvalidNodeId, NodeId};
pub use manager::FleetManager;
pub use slot::{allocate_next_slot, container_name, parse_slot};
pub use types::{
    BatchEntry, Conflict, ConflictPolicy, CreateError, Instance, InstanceStatus, RestartOutcome,
    RestartResult,
};
