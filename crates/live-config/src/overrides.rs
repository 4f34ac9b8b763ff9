//! Per-source concurrency overrides taken from the process environment.

use std::collections::BTreeMap;
use tracing::{info, warn};

/// Prefix for the namespaced form: `HARVEST_CONCURRENCY__<ID>`.
pub const OVERRIDE_PREFIX: &str = "HARVEST_CONCURRENCY__";

/// Concurrency values that win over the remote configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcurrencyOverrides(BTreeMap<String, u32>);

impl ConcurrencyOverrides {
    pub fn new(overrides: BTreeMap<String, u32>) -> Self {
        Self(overrides)
    }

    /// Reads one variable per known source id.
    ///
    /// A variable named exactly like the id wins over the namespaced form.
    /// Non-integer values are ignored with a warning.
    pub fn from_env<'a>(source_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self::from_lookup(source_ids, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<'a>(
        source_ids: impl IntoIterator<Item = &'a str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut overrides = BTreeMap::new();

        for id in source_ids {
            let namespaced = format!("{}{}", OVERRIDE_PREFIX, id.to_ascii_uppercase());
            let Some((name, raw)) = lookup(id)
                .map(|v| (id.to_string(), v))
                .or_else(|| lookup(&namespaced).map(|v| (namespaced.clone(), v)))
            else {
                continue;
            };

            match raw.trim().parse::<u32>() {
                Ok(value) => {
                    info!(source = %id, variable = %name, value, "Concurrency override");
                    overrides.insert(id.to_string(), value);
                }
                Err(_) => {
                    warn!(source = %id, variable = %name, value = %raw, "Ignoring non-integer concurrency override");
                }
            }
        }

        Self(overrides)
    }

    pub fn get(&self, source_id: &str) -> Option<u32> {
        self.0.get(source_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
