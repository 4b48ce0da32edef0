//! Projects manifest loading and sync scheduling.
//!
//! # API pattern
//!
//! - [`load`] parses manifest bytes; [`load_file`] reads them from disk
//!   first and annotates parse errors with the path.
//! - [`schedule`] applies the configuration's override set and returns the
//!   enabled projects in ascending `order`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::config::Configuration;
use crate::error::ManifestError;
use crate::types::{Manifest, ProjectDescriptor, ProjectName};

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

/// Parse a manifest document.
pub fn load(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    Ok(serde_yaml::from_slice(bytes)?)
}

/// Read and parse the manifest at `path`.
pub fn load_file(path: &Path) -> Result<Manifest, ManifestError> {
    let bytes = std::fs::read(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_slice(&bytes).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// 2. Schedule
// ---------------------------------------------------------------------------

/// A project selected for syncing, in schedule position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledProject {
    pub name: ProjectName,
    pub descriptor: ProjectDescriptor,
}

impl ScheduledProject {
    /// Environment additions for this project's sync step.
    ///
    /// Generated identifiers first, then the manifest's `env` mapping, which
    /// may shadow them.
    pub fn sync_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::from([
            ("GHA2DB_PROJECT".to_string(), self.name.0.clone()),
            ("PG_DB".to_string(), self.descriptor.pdb.clone()),
            ("IDB_DB".to_string(), self.descriptor.idb.clone()),
        ]);
        env.extend(
            self.descriptor
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        env
    }
}

/// Enabled projects in ascending `order`.
///
/// A project is dropped when its manifest `disabled` flag is set, unless
/// `config.projects_override` force-enables it; an entry force-disabled by
/// the override set is dropped regardless of the manifest. Equal orders keep
/// name order but are reported, since the schedule between them is not
/// meaningful.
pub fn schedule(manifest: &Manifest, config: &Configuration) -> Vec<ScheduledProject> {
    let mut selected: Vec<ScheduledProject> = manifest
        .projects
        .iter()
        .filter(|(name, desc)| !config.is_project_disabled(&name.0, desc.disabled))
        .map(|(name, desc)| ScheduledProject {
            name: name.clone(),
            descriptor: desc.clone(),
        })
        .collect();
    selected.sort_by_key(|p| p.descriptor.order);

    let mut seen: HashMap<i64, &ProjectName> = HashMap::new();
    for project in &selected {
        if let Some(first) = seen.insert(project.descriptor.order, &project.name) {
            tracing::warn!(
                order = project.descriptor.order,
                "projects '{first}' and '{}' share the same order",
                project.name
            );
        }
    }
    selected
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
projects:
  kubernetes:
    order: 1
    psql_db: gha
    influx_db: k8s
  prometheus:
    order: 2
    disabled: true
    psql_db: prometheus
    influx_db: prometheus_idb
  opentracing:
    order: 3
    psql_db: opentracing
    influx_db: opentracing_idb
    env:
      IDB_DB: shadowed
      GHA2DB_EXCLUDE_REPOS: a/b
";

    fn names(projects: &[ScheduledProject]) -> Vec<&str> {
        projects.iter().map(|p| p.name.0.as_str()).collect()
    }

    #[test]
    fn schedule_skips_disabled_and_orders_ascending() {
        let manifest = load(MANIFEST.as_bytes()).expect("load");
        let got = schedule(&manifest, &Configuration::with_home(""));
        assert_eq!(names(&got), vec!["kubernetes", "opentracing"]);
    }

    #[test]
    fn schedule_honours_override_set() {
        let manifest = load(MANIFEST.as_bytes()).expect("load");
        let config = Configuration {
            projects_override: BTreeMap::from([
                ("prometheus".to_string(), true),
                ("kubernetes".to_string(), false),
            ]),
            ..Configuration::with_home("")
        };
        let got = schedule(&manifest, &config);
        assert_eq!(names(&got), vec!["prometheus", "opentracing"]);
    }

    #[test]
    fn sync_env_lets_manifest_env_shadow_generated_values() {
        let manifest = load(MANIFEST.as_bytes()).expect("load");
        let got = schedule(&manifest, &Configuration::with_home(""));
        let env = got[1].sync_env();
        assert_eq!(env["GHA2DB_PROJECT"], "opentracing");
        assert_eq!(env["PG_DB"], "opentracing");
        assert_eq!(env["IDB_DB"], "shadowed");
        assert_eq!(env["GHA2DB_EXCLUDE_REPOS"], "a/b");
    }

    #[test]
    fn load_rejects_non_mapping_document() {
        let err = load(b"- just\n- a list\n").unwrap_err();
        assert!(matches!(err, ManifestError::Yaml(_)), "got: {err}");
    }

    #[test]
    fn load_rejects_missing_required_field() {
        let err = load(b"projects:\n  k8s:\n    psql_db: gha\n").unwrap_err();
        assert!(err.to_string().contains("order"), "got: {err}");
    }
}
