//! Domain types for the projects manifest.
//!
//! The manifest is a YAML document of the form:
//!
//! ```yaml
//! projects:
//!   kubernetes:
//!     order: 1
//!     psql_db: gha
//!     influx_db: k8s
//!   prometheus:
//!     order: 2
//!     disabled: true
//!     psql_db: prometheus
//!     influx_db: prometheus
//!     env:
//!       GHA2DB_EXCLUDE_REPOS: "prometheus/nagios_plugins"
//! ```
//!
//! Keys not listed here (display names, status, etc.) are ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed project name; the unique key in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectName(pub String);

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One project entry from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Position in the sync schedule, ascending. Should be unique.
    pub order: i64,
    #[serde(default)]
    pub disabled: bool,
    /// Relational (PDB) database name. Empty when the entry omits it.
    #[serde(rename = "psql_db", default)]
    pub pdb: String,
    /// Time-series (IDB) database name. Empty when the entry omits it.
    #[serde(rename = "influx_db", alias = "idb_db", default)]
    pub idb: String,
    /// Extra variables for this project's sync step. They shadow the
    /// generated `GHA2DB_PROJECT`/`PG_DB`/`IDB_DB` entries.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Root of the projects manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub projects: BTreeMap<ProjectName, ProjectDescriptor>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
