//! Biochub common library
//!
//! Shared types, logging, and error handling for the biochub workspace.
//!
//! - **Error Handling**: [`BiochubError`] and the [`Result`] alias
//! - **Logging**: subscriber setup in [`logging`]
//! - **Types**: hub codes, storage location schemes, entity kinds
//!
//! # Example
//!
//! ```
//! use biochub_common::types::HubCode;
//!
//! let hub: HubCode = "EH".parse().unwrap();
//! assert_eq!(hub.display_name(), "ExperimentHub");
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

pub use error::{BiochubError, Result};
