//! Domain models

pub mod release;

pub use release::{AppPaths, Release, ReleaseId};
