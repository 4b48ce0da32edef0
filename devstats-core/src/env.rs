//! Key-value view of the environment.
//!
//! Resolution never touches `std::env` directly; it goes through an
//! [`EnvReader`], so tests inject a fresh map per case instead of mutating
//! the real process environment.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Read-only lookup of raw environment values.
pub trait EnvReader {
    /// Raw value of `key`, or `None` when the variable is absent.
    fn var(&self, key: &str) -> Option<String>;
}

/// The live process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<S: BuildHasher> EnvReader for HashMap<String, String, S> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvReader for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: EnvReader + ?Sized> EnvReader for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_lookup_distinguishes_absent_from_empty() {
        let env = HashMap::from([("SET".to_string(), String::new())]);
        assert_eq!(env.var("SET"), Some(String::new()));
        assert_eq!(env.var("UNSET"), None);
    }

    fn lookup(env: impl EnvReader, key: &str) -> Option<String> {
        env.var(key)
    }

    #[test]
    fn reference_delegates() {
        let env = BTreeMap::from([("K".to_string(), "v".to_string())]);
        assert_eq!(lookup(&env, "K").as_deref(), Some("v"));
    }
}
