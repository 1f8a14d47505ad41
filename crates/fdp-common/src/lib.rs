//! # FDP Common
//!
//! Shared utilities for the FDP workspace.
//!
//! This crate provides common functionality used across FDP tools:
//!
//! - **Error handling**: The [`FdpError`] type and [`Result`] alias
//! - **Logging**: Structured logging setup built on `tracing`
//! - **Checksums**: SHA-256 digests for snapshot provenance
//!
//! ## Example
//!
//! ```no_run
//! use fdp_common::checksum::Checksum;
//!
//! # fn main() -> fdp_common::Result<()> {
//! let digest = Checksum::from_file("snapshots/equity_20240115.csv.gz")?;
//! println!("sha256 = {digest}");
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{FdpError, Result};
