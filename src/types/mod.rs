pub mod deployment;
pub mod stack;

pub use deployment::*;
pub use stack::*;
