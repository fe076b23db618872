//! Configuration types for dsvc-rs.
//!
//! This module defines the structures used to represent application configuration
//! as parsed from an INI-format config file.

use std::path::PathBuf;
use std::str::FromStr;

use crate::dataset::BodyFormat;
use crate::dsref::BadCasePolicy;
use crate::fsi::MetaFormat;

// =============================================================================
// Primitive Types
// =============================================================================

/// Where repository state is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// Objects, index and logbook under the repository directory.
    #[default]
    Disk,
    /// Everything in memory; lost when the process exits.
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disk" | "local" => Ok(StoreKind::Disk),
            "memory" | "mem" => Ok(StoreKind::Memory),
            other => Err(format!(
                "unknown store '{}': expected 'disk' or 'memory'",
                other
            )),
        }
    }
}

// =============================================================================
// Config Sections
// =============================================================================

/// [repo] section - repository location.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    pub path: PathBuf,
    pub store: StoreKind,
}

/// [identity] section - the active user.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Username substituted for `me` in references.
    pub username: Option<String>,
}

/// [reference] section - reference parsing.
#[derive(Debug, Clone, Default)]
pub struct ReferenceConfig {
    pub bad_case: BadCasePolicy,
}

/// [resolve] section - reference resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveConfig {
    /// Default resolution mode. Empty selects the default chain.
    pub mode: String,
}

/// [fsi] section - working directory files.
#[derive(Debug, Clone, Default)]
pub struct FsiConfig {
    /// Format used when writing new meta files.
    pub meta_format: MetaFormat,
    /// Body format used when a structure does not declare one.
    pub body_format: BodyFormat,
}

// =============================================================================
// Top-Level Config
// =============================================================================

/// Complete application configuration as parsed from config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub repo: RepoConfig,
    pub identity: IdentityConfig,
    pub reference: ReferenceConfig,
    pub resolve: ResolveConfig,
    pub fsi: FsiConfig,
}
