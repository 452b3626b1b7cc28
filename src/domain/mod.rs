pub mod module;
pub mod simulation;

pub use module::*;
pub use simulation::*;
