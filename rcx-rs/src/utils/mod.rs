//! Shared utilities for the rcx-rs CLI

pub mod format;
pub mod table;

pub use format::*;
pub use table::*;
