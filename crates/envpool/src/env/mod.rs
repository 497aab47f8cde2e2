//! The environment plugin contract.
//!
//! Provides the `PoolEnv` trait every environment family implements, the
//! per-instance random generator type, and the error type environments use
//! to report faults.

mod traits;

pub use traits::{EnvError, EnvRng, PoolEnv};
