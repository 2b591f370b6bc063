//! Committer pass configuration.

use serde::Deserialize;

/// Policy knobs for one committer pass.
///
/// The committer prefers full blocks: while the time since the last commit
/// stays under `max_commit_interval_ms`, a pass refuses to close a block
/// with fewer than `max_txs_per_block` transactions.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct CommitterConfig {
    pub max_txs_per_block: usize,
    pub max_commit_interval_ms: i64,
}

impl Default for CommitterConfig {
    fn default() -> Self {
        Self {
            max_txs_per_block: 16,
            // 15 minutes; after this even an under-filled block is committed.
            max_commit_interval_ms: 900_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: CommitterConfig = serde_json::from_str(r#"{"max_txs_per_block": 4}"#).unwrap();
        assert_eq!(config.max_txs_per_block, 4);
        assert_eq!(config.max_commit_interval_ms, 900_000);
    }
}
