//! Harvest - zero-downtime release deployment
//!
//! Library entry point for the deployment core: release store, shared
//! resource linking, atomic activation, retention and rollback.

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
