//! Service layer for the refresh pipeline.
//!
//! This module contains domain logic separated from UI concerns.
//! Services can be used by the CLI, the web server or the scheduler.

pub mod refresh;
pub mod transform;

pub use refresh::{RefreshCoordinator, RefreshError, RefreshGuard, RefreshOutcome};
pub use transform::{RecordTransformer, TransformError};
