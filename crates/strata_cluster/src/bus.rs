//! Message bus for member-to-member delivery.
//!
//! Each member owns an inbound and an outbound bus. The outbound bus fans a
//! message out to a snapshot of peers, one at a time, with no ack, retry or
//! persistence. The inbound bus gates whether the owner accepts deliveries.

use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use strata_core::{GridError, GridResult, MemberId};
use tokio_util::sync::CancellationToken;

/// What a peer did with a delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptOutcome {
    /// A new catalog entry was created
    Materialized,
    /// The name was already bound; the message was a duplicate
    AlreadyPresent,
    /// Self-delivery or an unrecognized message
    Ignored,
}

/// Anything that can receive broadcast messages
#[async_trait]
pub trait CatalogPeer: Send + Sync {
    /// Identity used to skip the sender during fan-out
    fn peer_id(&self) -> MemberId;

    /// Handle one inbound message
    async fn accept(&self, message: &Message) -> GridResult<AcceptOutcome>;
}

#[async_trait]
impl<T: CatalogPeer + ?Sized> CatalogPeer for Arc<T> {
    fn peer_id(&self) -> MemberId {
        (**self).peer_id()
    }

    async fn accept(&self, message: &Message) -> GridResult<AcceptOutcome> {
        (**self).accept(message).await
    }
}

/// Direction of a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusDirection {
    /// Receives deliveries for the owner
    Inbound,
    /// Sends the owner's messages to peers
    Outbound,
}

/// Result of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers that accepted the message, with what they did
    pub delivered: Vec<(MemberId, AcceptOutcome)>,
    /// Peers that failed; the fan-out continued past each of them
    pub failures: Vec<(MemberId, GridError)>,
    /// Fan-out stopped early because the sender is shutting down
    pub cancelled: bool,
}

impl BroadcastReport {
    /// Every recipient was reached without error
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Number of peers that accepted the message
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}

/// One direction of a member's message plumbing
#[derive(Debug)]
pub struct MessageBus {
    owner: MemberId,
    direction: BusDirection,
    running: AtomicBool,
    delivery_timeout: Duration,
}

impl MessageBus {
    /// Create a stopped bus
    #[must_use]
    pub fn new(owner: MemberId, direction: BusDirection, delivery_timeout: Duration) -> Self {
        Self {
            owner,
            direction,
            running: AtomicBool::new(false),
            delivery_timeout,
        }
    }

    /// Direction of this bus
    #[must_use]
    pub fn direction(&self) -> BusDirection {
        self.direction
    }

    /// Start the bus; false if it was already running
    pub fn start(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    /// Stop the bus; false if it was already stopped
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    /// Check if running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Fail unless the bus is running
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if the bus is stopped
    pub fn ensure_running(&self) -> GridResult<()> {
        if self.is_running() {
            return Ok(());
        }
        Err(GridError::NotRunning {
            member: self.owner.to_string(),
        })
    }

    /// Deliver `message` to every recipient except its sender.
    ///
    /// Recipients are visited in order and each delivery is bounded by the
    /// bus delivery timeout. A failing or slow peer is recorded in the report
    /// and skipped. Firing `cancel` stops the fan-out before the next peer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` on an inbound bus and `NotRunning` on a stopped one
    pub async fn send<P: CatalogPeer>(
        &self,
        recipients: &[P],
        message: &Message,
        cancel: &CancellationToken,
    ) -> GridResult<BroadcastReport> {
        if self.direction != BusDirection::Outbound {
            return Err(GridError::InvalidState {
                reason: "send called on an inbound bus".to_string(),
            });
        }
        self.ensure_running()?;

        let sender = message.sender();
        let mut report = BroadcastReport::default();

        for peer in recipients {
            let peer_id = peer.peer_id();
            if peer_id == sender {
                continue;
            }

            let delivery = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                result = tokio::time::timeout(self.delivery_timeout, peer.accept(message)) => {
                    result
                }
            };

            match delivery {
                Ok(Ok(outcome)) => report.delivered.push((peer_id, outcome)),
                Ok(Err(err)) => {
                    tracing::warn!(
                        member = %self.owner,
                        peer = %peer_id,
                        error = %err,
                        "peer rejected message"
                    );
                    report.failures.push((peer_id, err));
                }
                Err(_) => {
                    let err = GridError::DeliveryFailed {
                        peer: peer_id,
                        reason: format!("timed out after {}ms", self.delivery_timeout.as_millis()),
                    };
                    tracing::warn!(
                        member = %self.owner,
                        peer = %peer_id,
                        error = %err,
                        "peer delivery timed out"
                    );
                    report.failures.push((peer_id, err));
                }
            }
        }

        Ok(report)
    }
}
