use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Pipeline name to state TTL lookup
#[derive(Debug, Clone, Default)]
pub struct TtlTable {
    entries: HashMap<String, String>,
}

static BUILTIN: LazyLock<Arc<TtlTable>> = LazyLock::new(|| {
    Arc::new(TtlTable::from_pairs(&[
        ("daily_task_task", "2"),
        ("new_user_task", "2"),
        ("weekly_gold_task", "8"),
        ("Live_task", "32"),
        ("weekly_bean_task", "8"),
        ("agent_reward_task", "32"),
        ("player_20240930_task", "8"),
        ("player_20241104_task", "8"),
        ("honorAgent_20250301_task", "32"),
        ("player_20250303_task", "8"),
        ("honorAgent_20250401_task", "32"),
        ("player_20250331_task", "8"),
        ("gameKing_20250401_task", "32"),
        ("honorAgent_20250501_task", "32"),
        ("player_20250505_task", "8"),
        ("gameKing_20250501_task", "32"),
    ]))
});

impl TtlTable {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(name, ttl)| (name.to_string(), ttl.to_string()))
                .collect(),
        }
    }

    /// The process-wide table, built once on first use
    pub fn builtin() -> Arc<TtlTable> {
        BUILTIN.clone()
    }

    pub fn lookup(&self, pipeline_name: &str) -> Option<&str> {
        self.entries.get(pipeline_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_sensitive() {
        let table = TtlTable::builtin();
        assert_eq!(table.lookup("daily_task_task"), Some("2"));
        assert_eq!(table.lookup("Live_task"), Some("32"));
        assert_eq!(table.lookup("live_task"), None);
        assert_eq!(table.len(), 16);
    }
}
