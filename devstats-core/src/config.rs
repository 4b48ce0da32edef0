//! Runtime configuration resolved from environment variables.
//!
//! # Resolution order
//!
//! 1. Start from [`Configuration::with_home`] defaults.
//! 2. Overlay every variable that is present (empty strings keep the default
//!    for non-string fields).
//! 3. Coerce with [`crate::coerce`]; unusable values keep the default.
//! 4. Derive project-scoped manifest paths from `GHA2DB_PROJECT`, then apply
//!    explicit `GHA2DB_*_YAML` overrides on top.
//! 5. Normalize the webhook port (`:` prefix) and repos dir (`/` suffix).
//! 6. Compile the actor patterns only when `GHA2DB_ACTORS_FILTER` is set.
//!
//! Resolution is total. A malformed value logs a warning and is ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::coerce;
use crate::env::EnvReader;

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// A compiled regular expression that compares and serializes by its source.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Every knob the devstats tools read from the environment.
///
/// Built once per process by [`Configuration::resolve`] and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub debug: i32,
    pub cmd_debug: i32,
    /// Minimum remaining GitHub API points before waiting for a reset.
    pub min_ghapi_points: u32,
    pub max_ghapi_wait_secs: u32,
    pub json_out: bool,
    pub db_out: bool,
    pub single_threaded: bool,
    pub ncpus: i32,

    pub pg_host: String,
    pub pg_port: String,
    pub pg_db: String,
    pub pg_user: String,
    pub pg_pass: String,
    pub pg_ssl: String,

    pub index: bool,
    pub table: bool,
    pub tools: bool,
    /// Canned answer for interactive prompts; at most one character.
    pub mgetc: String,

    pub idb_host: String,
    pub idb_port: String,
    pub idb_db: String,
    pub idb_user: String,
    pub idb_pass: String,
    pub idb_max_batch_points: u32,

    pub query_out: bool,
    pub ctx_out: bool,
    pub default_start_date: DateTime<Utc>,
    pub force_start_date: bool,
    pub last_series: String,

    pub skip_idb: bool,
    pub skip_pdb: bool,
    pub skip_ghapi: bool,
    pub skip_artificial_clean: bool,
    pub skip_get_repos: bool,
    pub reset_idb: bool,
    pub reset_ranges: bool,
    pub explain: bool,
    pub old_format: bool,
    pub exact: bool,
    pub log_to_db: bool,
    pub local: bool,
    pub idb_drop: bool,
    /// Series are dropped with probability `1/idb_drop_prob_n`; `0` never drops.
    pub idb_drop_prob_n: u32,

    pub metrics_yaml: String,
    pub gaps_yaml: String,
    pub tags_yaml: String,
    pub ivars_yaml: String,
    pub pvars_yaml: String,

    /// OAuth token, or a path to a file holding it.
    pub github_oauth: String,
    pub clear_db_period: String,
    /// Retry back-off schedule in seconds.
    pub trials: Vec<i32>,
    pub log_time: bool,

    pub webhook_root: String,
    pub webhook_port: String,
    pub webhook_host: String,
    pub check_payload: bool,
    pub full_deploy: bool,
    pub deploy_branches: Vec<String>,
    pub deploy_statuses: Vec<String>,
    pub deploy_results: Vec<i32>,
    pub deploy_types: Vec<String>,
    pub project_root: String,

    pub project: String,
    pub tests_yaml: String,
    pub repos_dir: String,
    pub process_repos: bool,
    pub process_commits: bool,
    pub external_info: bool,
    pub projects_commits: String,
    pub projects_yaml: String,
    pub projects_override: BTreeMap<String, bool>,
    pub exclude_repos: BTreeSet<String>,
    pub input_dbs: Vec<String>,
    pub output_db: String,
    pub tm_offset: i32,
    pub recent_range: String,
    pub only_issues: Vec<i64>,
    pub only_events: Vec<i64>,
    pub csv_file: String,
    pub compute_all: bool,

    pub actors_filter: bool,
    pub actors_allow: Option<Pattern>,
    pub actors_forbid: Option<Pattern>,
    pub only_metrics: BTreeSet<String>,
}

/// Directory that holds the default (non project-scoped) metric manifests.
const METRICS_DIR: &str = "metrics";

/// Manifest file names shared by the global and project-scoped layouts.
const METRICS_FILE: &str = "metrics.yaml";
const GAPS_FILE: &str = "gaps.yaml";
const TAGS_FILE: &str = "idb_tags.yaml";
const IVARS_FILE: &str = "idb_vars.yaml";
const PVARS_FILE: &str = "pdb_vars.yaml";

impl Configuration {
    /// Defaults for every field. `home` only feeds the default repos dir.
    pub fn with_home(home: &str) -> Self {
        Self {
            debug: 0,
            cmd_debug: 0,
            min_ghapi_points: 1,
            max_ghapi_wait_secs: 1,
            json_out: false,
            db_out: true,
            single_threaded: false,
            ncpus: 0,
            pg_host: "localhost".into(),
            pg_port: "5432".into(),
            pg_db: "gha".into(),
            pg_user: "gha_admin".into(),
            pg_pass: "password".into(),
            pg_ssl: "disable".into(),
            index: false,
            table: true,
            tools: true,
            mgetc: String::new(),
            idb_host: "http://localhost".into(),
            idb_port: "8086".into(),
            idb_db: "gha".into(),
            idb_user: "gha_admin".into(),
            idb_pass: "password".into(),
            idb_max_batch_points: 10240,
            query_out: false,
            ctx_out: false,
            default_start_date: Utc
                .with_ymd_and_hms(2014, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            force_start_date: false,
            last_series: "events_h".into(),
            skip_idb: false,
            skip_pdb: false,
            skip_ghapi: false,
            skip_artificial_clean: false,
            skip_get_repos: false,
            reset_idb: false,
            reset_ranges: false,
            explain: false,
            old_format: false,
            exact: false,
            log_to_db: true,
            local: false,
            idb_drop: false,
            idb_drop_prob_n: 20,
            metrics_yaml: manifest_path(None, METRICS_FILE),
            gaps_yaml: manifest_path(None, GAPS_FILE),
            tags_yaml: manifest_path(None, TAGS_FILE),
            ivars_yaml: manifest_path(None, IVARS_FILE),
            pvars_yaml: manifest_path(None, PVARS_FILE),
            github_oauth: "/etc/github/oauth".into(),
            clear_db_period: "1 week".into(),
            trials: vec![10, 30, 60, 120, 300, 600],
            log_time: true,
            webhook_root: "/hook".into(),
            webhook_port: ":1982".into(),
            webhook_host: "127.0.0.1".into(),
            check_payload: true,
            full_deploy: true,
            deploy_branches: vec!["master".into()],
            deploy_statuses: vec!["Passed".into(), "Fixed".into()],
            deploy_results: vec![0],
            deploy_types: vec!["push".into()],
            project_root: String::new(),
            project: String::new(),
            tests_yaml: "tests.yaml".into(),
            repos_dir: format!("{home}/devstats_repos/"),
            process_repos: false,
            process_commits: false,
            external_info: false,
            projects_commits: String::new(),
            projects_yaml: "projects.yaml".into(),
            projects_override: BTreeMap::new(),
            exclude_repos: BTreeSet::new(),
            input_dbs: Vec::new(),
            output_db: String::new(),
            tm_offset: 0,
            recent_range: "2 hours".into(),
            only_issues: Vec::new(),
            only_events: Vec::new(),
            csv_file: String::new(),
            compute_all: false,
            actors_filter: false,
            actors_allow: None,
            actors_forbid: None,
            only_metrics: BTreeSet::new(),
        }
    }

    /// Resolve the full configuration from `env`.
    pub fn resolve(env: &impl EnvReader) -> Self {
        let home = env.var("HOME").unwrap_or_default();
        let mut cfg = Self::with_home(&home);
        let env = Lookup(env);

        env.int("GHA2DB_DEBUG", &mut cfg.debug);
        env.int("GHA2DB_CMDDEBUG", &mut cfg.cmd_debug);
        env.non_negative("GHA2DB_MIN_GHAPI_POINTS", &mut cfg.min_ghapi_points);
        env.non_negative("GHA2DB_MAX_GHAPI_WAIT", &mut cfg.max_ghapi_wait_secs);
        env.flag("GHA2DB_JSON", &mut cfg.json_out);
        env.skip_flag("GHA2DB_NODB", &mut cfg.db_out);
        env.flag("GHA2DB_ST", &mut cfg.single_threaded);
        env.int("GHA2DB_NCPUS", &mut cfg.ncpus);

        env.string("PG_HOST", &mut cfg.pg_host);
        env.string("PG_PORT", &mut cfg.pg_port);
        env.string("PG_DB", &mut cfg.pg_db);
        env.string("PG_USER", &mut cfg.pg_user);
        env.string("PG_PASS", &mut cfg.pg_pass);
        env.string("PG_SSL", &mut cfg.pg_ssl);

        env.flag("GHA2DB_INDEX", &mut cfg.index);
        env.skip_flag("GHA2DB_SKIPTABLE", &mut cfg.table);
        env.skip_flag("GHA2DB_SKIPTOOLS", &mut cfg.tools);
        if let Some(raw) = env.present("GHA2DB_MGETC") {
            cfg.mgetc = raw.chars().take(1).collect();
        }

        if let Some(host) = env.present("IDB_HOST") {
            cfg.idb_host = if host.contains("://") {
                host
            } else {
                coerce::ensure_prefix(&host, "http://")
            };
        }
        env.string("IDB_PORT", &mut cfg.idb_port);
        env.string("IDB_DB", &mut cfg.idb_db);
        env.string("IDB_USER", &mut cfg.idb_user);
        env.string("IDB_PASS", &mut cfg.idb_pass);
        env.non_negative("IDB_MAXBATCHPOINTS", &mut cfg.idb_max_batch_points);

        env.flag("GHA2DB_QOUT", &mut cfg.query_out);
        env.flag("GHA2DB_CTXOUT", &mut cfg.ctx_out);
        if let Some(raw) = env.present("GHA2DB_STARTDT") {
            match coerce::parse_datetime(&raw) {
                Some(dt) => cfg.default_start_date = dt,
                None => ignored("GHA2DB_STARTDT", &raw, "expected a date or date-time"),
            }
        }
        env.flag("GHA2DB_STARTDT_FORCE", &mut cfg.force_start_date);
        env.string("GHA2DB_LASTSERIES", &mut cfg.last_series);

        env.flag("GHA2DB_SKIPIDB", &mut cfg.skip_idb);
        env.flag("GHA2DB_SKIPPDB", &mut cfg.skip_pdb);
        env.flag("GHA2DB_GHAPISKIP", &mut cfg.skip_ghapi);
        env.flag("GHA2DB_AECLEANSKIP", &mut cfg.skip_artificial_clean);
        env.flag("GHA2DB_GETREPOSSKIP", &mut cfg.skip_get_repos);
        env.flag("GHA2DB_RESETIDB", &mut cfg.reset_idb);
        env.flag("GHA2DB_RESETRANGES", &mut cfg.reset_ranges);
        env.flag("GHA2DB_EXPLAIN", &mut cfg.explain);
        env.flag("GHA2DB_OLDFMT", &mut cfg.old_format);
        env.flag("GHA2DB_EXACT", &mut cfg.exact);
        env.skip_flag("GHA2DB_SKIPLOG", &mut cfg.log_to_db);
        env.flag("GHA2DB_LOCAL", &mut cfg.local);

        env.flag("GHA2DB_IDB_DROP_SERIES", &mut cfg.idb_drop);
        if let Some(raw) = env.present("GHA2DB_IDB_DROP_PROB_N") {
            match coerce::parse_int::<i64>(&raw) {
                Some(n) => cfg.idb_drop_prob_n = u32::try_from(n.max(0)).unwrap_or(u32::MAX),
                None => ignored("GHA2DB_IDB_DROP_PROB_N", &raw, "expected an integer"),
            }
        }
        // Nothing to drop when the time-series store is skipped or rebuilt.
        if cfg.skip_idb || cfg.reset_idb {
            cfg.idb_drop_prob_n = 0;
        }

        env.string("GHA2DB_PROJECT", &mut cfg.project);
        if !cfg.project.is_empty() {
            let project = Some(cfg.project.as_str());
            cfg.metrics_yaml = manifest_path(project, METRICS_FILE);
            cfg.gaps_yaml = manifest_path(project, GAPS_FILE);
            cfg.tags_yaml = manifest_path(project, TAGS_FILE);
            cfg.ivars_yaml = manifest_path(project, IVARS_FILE);
            cfg.pvars_yaml = manifest_path(project, PVARS_FILE);
        }
        env.string("GHA2DB_METRICS_YAML", &mut cfg.metrics_yaml);
        env.string("GHA2DB_GAPS_YAML", &mut cfg.gaps_yaml);
        env.string("GHA2DB_TAGS_YAML", &mut cfg.tags_yaml);
        env.string("GHA2DB_IVARS_YAML", &mut cfg.ivars_yaml);
        env.string("GHA2DB_PVARS_YAML", &mut cfg.pvars_yaml);

        env.string("GHA2DB_GITHUB_OAUTH", &mut cfg.github_oauth);
        env.string("GHA2DB_MAXLOGAGE", &mut cfg.clear_db_period);
        env.list("GHA2DB_TRIALS", &mut cfg.trials);
        env.skip_flag("GHA2DB_SKIPTIME", &mut cfg.log_time);

        env.string("GHA2DB_WHROOT", &mut cfg.webhook_root);
        if let Some(port) = env.present("GHA2DB_WHPORT") {
            cfg.webhook_port = coerce::ensure_prefix(&port, ":");
        }
        env.string("GHA2DB_WHHOST", &mut cfg.webhook_host);
        env.skip_flag("GHA2DB_SKIP_VERIFY_PAYLOAD", &mut cfg.check_payload);
        env.skip_flag("GHA2DB_SKIP_FULL_DEPLOY", &mut cfg.full_deploy);
        env.string_list("GHA2DB_DEPLOY_BRANCHES", &mut cfg.deploy_branches);
        env.string_list("GHA2DB_DEPLOY_STATUSES", &mut cfg.deploy_statuses);
        env.list("GHA2DB_DEPLOY_RESULTS", &mut cfg.deploy_results);
        env.string_list("GHA2DB_DEPLOY_TYPES", &mut cfg.deploy_types);
        env.string("GHA2DB_PROJECT_ROOT", &mut cfg.project_root);

        env.string("GHA2DB_TESTS_YAML", &mut cfg.tests_yaml);
        if let Some(dir) = env.present("GHA2DB_REPOS_DIR") {
            cfg.repos_dir = coerce::ensure_suffix(&dir, "/");
        }
        env.flag("GHA2DB_PROCESS_REPOS", &mut cfg.process_repos);
        env.flag("GHA2DB_PROCESS_COMMITS", &mut cfg.process_commits);
        env.flag("GHA2DB_EXTERNAL_INFO", &mut cfg.external_info);
        env.string("GHA2DB_PROJECTS_COMMITS", &mut cfg.projects_commits);
        env.string("GHA2DB_PROJECTS_YAML", &mut cfg.projects_yaml);
        if let Some(raw) = env.present("GHA2DB_PROJECTS_OVERRIDE") {
            cfg.projects_override = coerce::parse_signed_overrides(&raw);
        }
        if let Some(raw) = env.present("GHA2DB_EXCLUDE_REPOS") {
            cfg.exclude_repos = coerce::parse_string_set(&raw);
        }
        env.string_list("GHA2DB_INPUT_DBS", &mut cfg.input_dbs);
        env.string("GHA2DB_OUTPUT_DB", &mut cfg.output_db);
        env.int("GHA2DB_TMOFFSET", &mut cfg.tm_offset);
        env.string("GHA2DB_RECENT_RANGE", &mut cfg.recent_range);
        env.list("GHA2DB_ONLY_ISSUES", &mut cfg.only_issues);
        env.list("GHA2DB_ONLY_EVENTS", &mut cfg.only_events);
        env.string("GHA2DB_CSVOUT", &mut cfg.csv_file);
        env.flag("GHA2DB_COMPUTE_ALL", &mut cfg.compute_all);
        if let Some(raw) = env.present("GHA2DB_ONLY_METRICS") {
            cfg.only_metrics = coerce::parse_string_set(&raw);
        }

        // The actor filter is all-or-nothing: without the master flag both
        // patterns stay unset whatever their variables say.
        env.flag("GHA2DB_ACTORS_FILTER", &mut cfg.actors_filter);
        if cfg.actors_filter {
            cfg.actors_allow = env.pattern("GHA2DB_ACTORS_ALLOW");
            cfg.actors_forbid = env.pattern("GHA2DB_ACTORS_FORBID");
        }

        cfg
    }

    /// Whether `name` should be synced given its manifest `disabled` flag.
    ///
    /// An entry in [`Configuration::projects_override`] wins over the
    /// manifest in both directions.
    pub fn is_project_disabled(&self, name: &str, disabled: bool) -> bool {
        match self.projects_override.get(name) {
            Some(enabled) => !enabled,
            None => disabled,
        }
    }

    /// `./` in local mode, empty otherwise (commands come from `PATH`).
    pub fn command_prefix(&self) -> &'static str {
        if self.local {
            "./"
        } else {
            ""
        }
    }

    /// Directory holding data files such as the projects manifest.
    pub fn data_prefix(&self) -> &'static str {
        if self.local {
            "./"
        } else {
            DATA_DIR
        }
    }
}

/// Shared data directory used outside local mode.
pub const DATA_DIR: &str = "/etc/gha2db/";

fn manifest_path(project: Option<&str>, file: &str) -> String {
    match project {
        Some(project) => format!("{METRICS_DIR}/{project}/{file}"),
        None => format!("{METRICS_DIR}/{file}"),
    }
}

fn ignored(key: &str, raw: &str, reason: &str) {
    tracing::warn!(variable = key, value = raw, "ignoring {key}: {reason}");
}

// ---------------------------------------------------------------------------
// Typed lookups
// ---------------------------------------------------------------------------

/// Per-type overlay helpers. Each one leaves the target untouched when the
/// variable is absent or empty.
struct Lookup<'a, E: ?Sized>(&'a E);

impl<E: EnvReader + ?Sized> Lookup<'_, E> {
    /// Raw value when set to something non-empty.
    fn present(&self, key: &str) -> Option<String> {
        self.0.var(key).filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some(value) = self.present(key) {
            *target = value;
        }
    }

    fn flag(&self, key: &str, target: &mut bool) {
        if let Some(value) = self.present(key) {
            *target = coerce::parse_bool(&value);
        }
    }

    /// `GHA2DB_SKIP*`-style variable that turns a default-on feature off.
    fn skip_flag(&self, key: &str, target: &mut bool) {
        if let Some(value) = self.present(key) {
            *target = !coerce::parse_bool(&value);
        }
    }

    fn int(&self, key: &str, target: &mut i32) {
        if let Some(raw) = self.present(key) {
            match coerce::parse_int(&raw) {
                Some(n) => *target = n,
                None => ignored(key, &raw, "expected an integer"),
            }
        }
    }

    fn non_negative(&self, key: &str, target: &mut u32) {
        if let Some(raw) = self.present(key) {
            match coerce::parse_non_negative(&raw) {
                Some(n) => *target = n,
                None => ignored(key, &raw, "expected a non-negative integer"),
            }
        }
    }

    fn list<T: std::str::FromStr>(&self, key: &str, target: &mut Vec<T>) {
        if let Some(raw) = self.present(key) {
            match coerce::parse_list(&raw) {
                Some(list) => *target = list,
                None => ignored(key, &raw, "expected a comma separated list of integers"),
            }
        }
    }

    fn string_list(&self, key: &str, target: &mut Vec<String>) {
        if let Some(raw) = self.present(key) {
            match coerce::parse_string_list(&raw) {
                Some(list) => *target = list,
                None => ignored(key, &raw, "expected at least one entry"),
            }
        }
    }

    fn pattern(&self, key: &str) -> Option<Pattern> {
        let raw = self.present(key)?;
        match Pattern::new(&raw) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                ignored(key, &raw, &err.to_string());
                None
            }
        }
    }
}
