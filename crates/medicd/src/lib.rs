//! Medic daemon library - handlers, sampler and heartbeat used by the binary

pub mod actions;
pub mod heartbeat;
pub mod sampler;
