//! Lazy block-number sequence.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;

use crate::config::BlockMode;
use crate::error::StreamError;
use crate::reader::ChainReader;

/// Options for [`BlockNumbers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNumbersOptions {
    /// First number, inclusive. Defaults to the current head.
    pub from: Option<u64>,
    /// Last number, inclusive. Unbounded if `None`.
    pub to: Option<u64>,
    pub mode: BlockMode,
    /// Wait between head polls while caught up (one block interval).
    pub poll_interval: Duration,
}

impl Default for BlockNumbersOptions {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            mode: BlockMode::Irreversible,
            poll_interval: Duration::from_secs(3),
        }
    }
}

impl BlockNumbersOptions {
    pub fn starting_at(from: u64) -> Self {
        Self {
            from: Some(from),
            ..Default::default()
        }
    }

    pub fn range(from: u64, to: u64) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }
}

/// Pull-based sequence of block numbers that waits for the chain to catch
/// up. Numbers are produced only as fast as they are pulled; dropping the
/// sequence leaves nothing running.
pub struct BlockNumbers {
    reader: Arc<dyn ChainReader>,
    mode: BlockMode,
    poll_interval: Duration,
    next: u64,
    current: u64,
    to: Option<u64>,
    done: bool,
}

impl BlockNumbers {
    /// Resolve the start block. Fails if `from` is beyond the current head.
    pub async fn start(reader: Arc<dyn ChainReader>, options: BlockNumbersOptions) -> Result<Self, StreamError> {
        let current = current_head(reader.as_ref(), options.mode).await?;
        if let Some(from) = options.from {
            if from > current {
                return Err(StreamError::StartAheadOfHead { from, current });
            }
        }
        Ok(Self {
            reader,
            mode: options.mode,
            poll_interval: options.poll_interval,
            next: options.from.unwrap_or(current),
            current,
            to: options.to,
            done: false,
        })
    }

    /// The next block number, or `None` once past `to`.
    pub async fn next(&mut self) -> Option<Result<u64, StreamError>> {
        loop {
            if self.done {
                return None;
            }
            if self.to.is_some_and(|to| self.next > to) {
                self.done = true;
                return None;
            }
            if self.next <= self.current {
                let n = self.next;
                self.next += 1;
                return Some(Ok(n));
            }
            tokio::time::sleep(self.poll_interval).await;
            match current_head(self.reader.as_ref(), self.mode).await {
                Ok(current) => self.current = current,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<u64, StreamError>> {
        futures::stream::unfold(self, |mut numbers| async move {
            let item = numbers.next().await?;
            Some((item, numbers))
        })
    }
}

impl std::fmt::Debug for BlockNumbers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockNumbers")
            .field("mode", &self.mode)
            .field("next", &self.next)
            .field("current", &self.current)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

pub(crate) async fn current_head(reader: &dyn ChainReader, mode: BlockMode) -> Result<u64, StreamError> {
    let props = reader.dynamic_global_properties().await?;
    Ok(mode.head(&props, 0))
}
