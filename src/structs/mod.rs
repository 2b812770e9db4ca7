pub mod parameters;
pub mod swarm;
