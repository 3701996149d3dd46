//! Configuration management for halfscan.
//!
//! Provides XDG-compliant storage for persisted scan defaults.

mod settings;

pub use settings::{AppSettings, OutputFormat, Paths};
