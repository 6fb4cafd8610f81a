//! Receipt polling for submitted transactions (min-heap by next poll time)
//!
//! Each pending transaction is polled on its own bounded exponential backoff
//! schedule. Several transactions can share one tracker and one poll loop.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::TxHash;
use priority_queue::PriorityQueue;
use tokio::time::Instant;

use crate::config::ConfirmationConfig;
use crate::gateway::{ChainGateway, ChainId, TxReceipt};

/// initial delay, doubling, capped at `max_delay`, at most `max_attempts` polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Delay before poll number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl From<ConfirmationConfig> for BackoffPolicy {
    fn from(c: ConfirmationConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(c.initial_backoff_ms),
            max_delay: Duration::from_millis(c.max_backoff_ms),
            max_attempts: c.max_attempts,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        ConfirmationConfig::default().into()
    }
}

/// Resolution of a tracked transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Confirmed(TxReceipt),
    Reverted(TxReceipt),
    /// Attempts exhausted; the transaction may still be mined later
    TimedOut { attempts: u32 },
}

#[derive(Debug, Clone)]
struct PendingTx {
    chain: ChainId,
    attempts: u32,
    next_poll: Instant,
}

pub struct ConfirmationTracker {
    policy: BackoffPolicy,
    /// Priority queue (using Reverse for earliest-first)
    queue: PriorityQueue<TxHash, Reverse<Instant>>,
    pending: HashMap<TxHash, PendingTx>,
}

impl ConfirmationTracker {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            queue: PriorityQueue::new(),
            pending: HashMap::new(),
        }
    }

    /// Start tracking `tx`; first poll after the initial delay
    pub fn track(&mut self, chain: ChainId, tx: TxHash, now: Instant) {
        let next_poll = now + self.policy.delay_for(0);
        self.pending.insert(
            tx,
            PendingTx {
                chain,
                attempts: 0,
                next_poll,
            },
        );
        self.queue.push(tx, Reverse(next_poll));
    }

    pub fn untrack(&mut self, tx: &TxHash) -> bool {
        self.queue.remove(tx);
        self.pending.remove(tx).is_some()
    }

    pub fn contains(&self, tx: &TxHash) -> bool {
        self.pending.contains_key(tx)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest scheduled poll
    pub fn next_due(&self) -> Option<Instant> {
        self.queue.peek().map(|(_, Reverse(at))| *at)
    }

    /// Poll every transaction due at `now`; returns the ones that resolved
    pub async fn poll_due<G>(
        &mut self,
        gateway: &G,
        now: Instant,
    ) -> Vec<(TxHash, ConfirmationStatus)>
    where
        G: ChainGateway + ?Sized,
    {
        let mut resolved = Vec::new();

        while let Some((_, Reverse(at))) = self.queue.peek() {
            if *at > now {
                break;
            }
            let Some((tx, _)) = self.queue.pop() else {
                break;
            };
            let Some(mut entry) = self.pending.remove(&tx) else {
                continue;
            };

            entry.attempts += 1;

            match gateway.receipt(entry.chain, tx).await {
                Ok(Some(receipt)) if receipt.success => {
                    log::info!("Transaction {} confirmed", tx);
                    resolved.push((tx, ConfirmationStatus::Confirmed(receipt)));
                    continue;
                }
                Ok(Some(receipt)) => {
                    log::warn!("Transaction {} reverted", tx);
                    resolved.push((tx, ConfirmationStatus::Reverted(receipt)));
                    continue;
                }
                Ok(None) => {
                    log::debug!("Transaction {} pending (poll {})", tx, entry.attempts);
                }
                Err(e) => {
                    log::warn!("Receipt poll for {} failed: {}", tx, e);
                }
            }

            if entry.attempts >= self.policy.max_attempts {
                log::warn!("Giving up on {} after {} polls", tx, entry.attempts);
                resolved.push((
                    tx,
                    ConfirmationStatus::TimedOut {
                        attempts: entry.attempts,
                    },
                ));
                continue;
            }

            entry.next_poll = now + self.policy.delay_for(entry.attempts);
            self.queue.push(tx, Reverse(entry.next_poll));
            self.pending.insert(tx, entry);
        }

        resolved
    }

    /// Poll until `tx` resolves; other tracked transactions keep their schedule
    pub async fn wait_for<G>(&mut self, gateway: &G, tx: TxHash) -> Option<ConfirmationStatus>
    where
        G: ChainGateway + ?Sized,
    {
        while self.contains(&tx) {
            let Some(due) = self.next_due() else {
                break;
            };
            tokio::time::sleep_until(due).await;

            let resolved = self.poll_due(gateway, Instant::now()).await;
            if let Some((_, status)) = resolved.into_iter().find(|(h, _)| *h == tx) {
                return Some(status);
            }
        }
        None
    }
}
