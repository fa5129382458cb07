//! Strata State Management
//!
//! Records what strata has created so later runs can read, update and
//! delete the same remote objects. State lives in a backend behind the
//! `StateBackend` trait; the local backend keeps a JSON file next to a
//! `.lock` file that guards concurrent runs.
//!
//! # Example
//!
//! ```ignore
//! use strata_state::create_backend;
//!
//! let backend = create_backend(config.backend.as_ref())?;
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! state.record(&created, "pureport");
//! state.increment_serial();
//! backend.write_state(&state).await?;
//!
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
