//! Shared utility functions.
//!
//! This module contains reusable utilities used across the codebase:
//! - `fs`: directory creation and file listing with size/mtime
//! - `retry`: fixed-delay retry executor for async operations

mod fs;
mod retry;

pub use fs::{ensure_dir, file_names, list_files, FileEntry};
pub use retry::{retry, RetryError, RetryPolicy};
