//! Streaming configuration.

use std::path::PathBuf;
use std::time::Duration;

use hiverpc_client::DynamicGlobalProperties;
use serde::{Deserialize, Serialize};

/// Which block counts as "head".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockMode {
    /// The last irreversible block.
    Irreversible,
    /// The newest block, which may still be reorganized away.
    #[default]
    Latest,
}

impl BlockMode {
    /// Head number for this mode; `behind` only applies to `Latest`.
    pub fn head(&self, props: &DynamicGlobalProperties, behind: u64) -> u64 {
        match self {
            Self::Irreversible => props.last_irreversible_block_num,
            Self::Latest => props.head_block_number.saturating_sub(behind),
        }
    }
}

/// Configuration for one streaming session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    #[serde(default)]
    pub mode: BlockMode,
    /// Stay this many blocks behind the newest block (`Latest` mode only).
    #[serde(default)]
    pub blocks_behind_head: u64,
    /// Fetch this many blocks concurrently while catching up; 0 or 1
    /// fetches one at a time.
    #[serde(default)]
    pub replay_batch_size: usize,
    /// File used by [`FileStateStore`](crate::FileStateStore) when file
    /// persistence is enabled.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Delay between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Wait after a block that is not yet retrievable.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Gap (in blocks) at which the behind-blocks signal fires.
    #[serde(default = "default_behind_threshold")]
    pub behind_threshold: u64,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}
fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_behind_threshold() -> u64 {
    20
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            mode: BlockMode::Latest,
            blocks_behind_head: 0,
            replay_batch_size: 0,
            state_file: default_state_file(),
            tick_interval_ms: default_tick_interval_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            behind_threshold: default_behind_threshold(),
        }
    }
}

impl StreamConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Whether catch-up fetches run in concurrent batches.
    pub fn batched(&self) -> bool {
        self.replay_batch_size > 1
    }
}
