//! Release lifecycle services

pub mod activation;
pub mod deploy;
pub mod retention;
pub mod rollback;
pub mod shared;
pub mod store;

pub use deploy::{DeployOptions, DeployService};
pub use rollback::RollbackService;
pub use shared::SharedResourceLinker;
pub use store::ReleaseStore;
