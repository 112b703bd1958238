//! Config-table-backed source reputation.

use std::collections::HashMap;
use worldview_core::services::ReputationProvider;
use worldview_config::ServicesConfig;

/// Reputation lookups against the static table in the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticReputation {
    table: HashMap<String, f64>,
}

impl StaticReputation {
    pub fn new(table: HashMap<String, f64>) -> Self {
        Self { table }
    }

    pub fn from_config(config: &ServicesConfig) -> Self {
        Self::new(config.reputation.clone())
    }
}

impl ReputationProvider for StaticReputation {
    fn reputation(&self, source_id: &str) -> Option<f64> {
        self.table.get(source_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_source_scores_unknown_does_not() {
        let mut table = HashMap::new();
        table.insert("reuters".to_string(), 9.0);
        let provider = StaticReputation::new(table);
        assert_eq!(provider.reputation("reuters"), Some(9.0));
        assert_eq!(provider.reputation("randomblog"), None);
    }
}
