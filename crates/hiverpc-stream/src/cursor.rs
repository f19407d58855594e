//! Stream cursor: the last processed block and virtual-op block.

use serde::{Deserialize, Serialize};

/// A streaming session's position. Persisted as
/// `{"lastBlock": …, "lastVopBlock": …}`; zero means "not started".
///
/// Both fields only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCursor {
    #[serde(default)]
    pub last_block: u64,
    #[serde(default)]
    pub last_vop_block: u64,
}

impl StreamCursor {
    pub fn new(last_block: u64, last_vop_block: u64) -> Self {
        Self {
            last_block,
            last_vop_block,
        }
    }

    /// Record `block_num` as processed. Older numbers are ignored.
    pub fn advance_block(&mut self, block_num: u64) {
        self.last_block = self.last_block.max(block_num);
    }

    /// Record the virtual ops of `block_num` as consumed. Older numbers are
    /// ignored.
    pub fn advance_vop(&mut self, block_num: u64) {
        self.last_vop_block = self.last_vop_block.max(block_num);
    }

    /// Returns the next block to process.
    pub fn next_block(&self) -> u64 {
        self.last_block + 1
    }

    pub fn is_seeded(&self) -> bool {
        self.last_block > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let mut cursor = StreamCursor::new(10, 7);
        cursor.advance_block(12);
        cursor.advance_block(11);
        cursor.advance_vop(6);
        assert_eq!(cursor, StreamCursor::new(12, 7));
        assert_eq!(cursor.next_block(), 13);
    }

    #[test]
    fn persisted_shape() {
        let json = serde_json::to_string(&StreamCursor::new(10, 7)).unwrap();
        assert_eq!(json, r#"{"lastBlock":10,"lastVopBlock":7}"#);
        let partial: StreamCursor = serde_json::from_str(r#"{"lastBlock":3}"#).unwrap();
        assert_eq!(partial, StreamCursor::new(3, 0));
    }
}
