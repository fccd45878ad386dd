// Rotation trainer core

pub mod core;
pub mod runtime;
pub mod transport;
