//! Infrastructure: process execution and filesystem primitives

pub mod command;
pub mod fs;

pub use command::CommandRunner;
