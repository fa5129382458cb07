//! Strata Core
//!
//! Shared model for the strata resource providers: resources and their
//! observed state, attribute schemas, the `Provider` trait, planning and
//! plan execution, and the named-mutex store used to serialize mutations of
//! shared remote objects.

pub mod config;
pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod mutex_kv;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod schema;
