//! Foundation types for folio.
//!
//! Shared by every folio crate: the error taxonomy and the article view
//! configuration loaded from TOML.

pub mod config;
pub mod error;
