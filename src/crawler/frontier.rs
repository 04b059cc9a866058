//! Bounded FIFO of addresses waiting to be fetched
//!
//! The frontier has exactly one producer (the visited tracker) and one
//! consumer (the fetcher). Its capacity bounds how many addresses can wait at
//! once; what the producer does when it is full is the [`OverflowPolicy`].

use crate::config::{CrawlerConfig, OverflowKind};
use crate::Address;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// What happens when an address is pushed onto a full frontier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for space, however long it takes (only cancellation interrupts)
    #[default]
    Block,
    /// Wait at most this long, then give up on the address
    BlockFor(Duration),
    /// Give up on the address immediately
    Reject,
}

impl OverflowPolicy {
    /// Builds the policy described by the crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        match config.overflow_policy {
            OverflowKind::Block => Self::Block,
            OverflowKind::BlockFor => Self::BlockFor(Duration::from_millis(config.overflow_wait_ms)),
            OverflowKind::Reject => Self::Reject,
        }
    }
}

/// Result of pushing one address onto the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The address is queued
    Enqueued,
    /// The frontier stayed full under the overflow policy; the address was dropped
    Overflowed(Address),
    /// The fetcher is gone
    Closed,
    /// The run was cancelled while waiting for space
    Cancelled,
}

/// Creates a frontier with room for `capacity` addresses
///
/// # Arguments
///
/// * `capacity` - Maximum addresses waiting at once
/// * `policy` - What [`FrontierSender::push`] does when the frontier is full
///
/// # Panics
///
/// Panics if `capacity` is zero or above tokio's channel limit;
/// `PipelineSettings::validate` rejects both before a pipeline builds one.
pub fn frontier(capacity: usize, policy: OverflowPolicy) -> (FrontierSender, FrontierReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (FrontierSender { tx, policy }, FrontierReceiver { rx })
}

/// Producer half of the frontier, owned by the visited tracker
#[derive(Debug)]
pub struct FrontierSender {
    tx: mpsc::Sender<Address>,
    policy: OverflowPolicy,
}

impl FrontierSender {
    /// Pushes an address, applying the overflow policy if the frontier is full
    ///
    /// # Returns
    ///
    /// * `Enqueued` - The address is queued
    /// * `Overflowed(address)` - No room under `BlockFor` or `Reject`; the address is handed back
    /// * `Closed` - The fetcher has dropped its half
    /// * `Cancelled` - `cancel` fired while waiting for space
    pub async fn push(&self, address: Address, cancel: &CancellationToken) -> PushOutcome {
        match self.policy {
            OverflowPolicy::Block => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => PushOutcome::Cancelled,
                    sent = self.tx.send(address) => match sent {
                        Ok(()) => PushOutcome::Enqueued,
                        Err(_) => PushOutcome::Closed,
                    },
                }
            }
            OverflowPolicy::BlockFor(wait) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => PushOutcome::Cancelled,
                    sent = self.tx.send_timeout(address, wait) => match sent {
                        Ok(()) => PushOutcome::Enqueued,
                        Err(SendTimeoutError::Timeout(address)) => PushOutcome::Overflowed(address),
                        Err(SendTimeoutError::Closed(_)) => PushOutcome::Closed,
                    },
                }
            }
            OverflowPolicy::Reject => match self.tx.try_send(address) {
                Ok(()) => PushOutcome::Enqueued,
                Err(TrySendError::Full(address)) => PushOutcome::Overflowed(address),
                Err(TrySendError::Closed(_)) => PushOutcome::Closed,
            },
        }
    }

    /// Number of addresses currently waiting
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of addresses that can wait at once
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

/// Consumer half of the frontier, owned by the fetcher
#[derive(Debug)]
pub struct FrontierReceiver {
    rx: mpsc::Receiver<Address>,
}

impl FrontierReceiver {
    /// Waits for the next address; `None` once the tracker has dropped its half
    pub async fn pop(&mut self) -> Option<Address> {
        self.rx.recv().await
    }
}
