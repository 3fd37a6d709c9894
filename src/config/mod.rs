//! Configuration management
//!
//! Handles controller.toml: switch roles, gateways, named hosts and the
//! security deny list. Without a file the built-in reference topology is
//! used.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::{Error, Result};
use std::path::Path;

const REFERENCE: &str = include_str!("reference.toml");

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Parse(e.to_string()))
}

/// The reference five-switch topology
pub fn reference() -> Result<Config> {
    parse(REFERENCE)
}
