//! Pending-request registry (§4.5).
//!
//! Owns a registry keyed by CoAP token. [`Correlator::allocate_token`] hands
//! out a fresh token up front so the caller can embed it into a message
//! before encoding; [`Correlator::submit`] then assigns a monotonically
//! increasing 16-bit message-ID (with wrap), records a deadline and retry
//! budget under that token. A scheduler ([`Correlator::tick`]) wakes on the
//! earliest deadline and either retransmits or fails the request.
//!
//! This module is intentionally Sans-IO: it never touches the transport
//! directly. `tick` and `submit` return actions; the driver (in
//! `vdsp-client`) executes them.

use std::{
    collections::HashMap,
    ops::{Add, Sub},
    time::Duration,
};

use bytes::Bytes;

use crate::env::Environment;

/// Block-wise transfer state for an outstanding exchange (§4.2 "Block
/// state").
#[derive(Debug, Clone, Default)]
pub struct BlockState {
    /// Outgoing blocks, populated up front by the Block1 splitter.
    pub tx_blocks: Vec<Bytes>,
    /// Index of the next outgoing block to send.
    pub tx_next_index: usize,
    /// Index of the last outgoing block acknowledged by the peer.
    pub tx_acked_index: Option<usize>,
    /// Incoming blocks, indexed by block number, as they arrive.
    pub rx_blocks: Vec<Bytes>,
    /// Whether the incoming block-wise transfer has seen its last block.
    pub rx_complete: bool,
    /// Negotiated block size in bytes.
    pub block_size: usize,
}

/// A single request awaiting completion (§4.5 "Pending request").
#[derive(Debug, Clone)]
pub struct PendingRequest<I, R> {
    /// CoAP message-ID assigned to this exchange.
    pub message_id: u16,
    /// Deadline at which the current retransmission window expires.
    pub deadline: I,
    /// Number of retransmissions sent so far (0 = original send only).
    pub retry_count: u8,
    /// Fixed retransmission interval (§4 "3 s initial interval").
    pub retry_interval: Duration,
    /// Maximum number of send attempts, original included (§4 "5 attempts").
    pub max_attempts: u8,
    /// Encoded CoAP request, kept around for retransmission.
    pub request_frame: Bytes,
    /// Block-wise transfer state, present only for block exchanges.
    pub block_state: Option<BlockState>,
    /// Caller-supplied handle used to resolve the exchange once it
    /// completes, fails, or is cancelled. Opaque to the correlator.
    pub resolver: R,
}

/// Action returned by [`Correlator::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelatorAction<R> {
    /// Resend the request frame for `token`; the CON timeout has elapsed
    /// but retries remain.
    Retransmit {
        /// Token of the exchange to retransmit.
        token: Bytes,
        /// Encoded CoAP frame to resend verbatim.
        frame: Bytes,
    },
    /// The exchange exhausted its retry budget; resolve it as `Timeout`.
    Fail {
        /// Token of the failed exchange.
        token: Bytes,
        /// Total time elapsed since the exchange was submitted.
        elapsed: Duration,
        /// Caller-supplied resolver handle for the failed exchange.
        resolver: R,
    },
}

impl<R> PartialEq for CorrelatorAction<R> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Retransmit { token: t1, frame: f1 },
                Self::Retransmit { token: t2, frame: f2 },
            ) => t1 == t2 && f1 == f2,
            (Self::Fail { token: t1, elapsed: e1, .. }, Self::Fail { token: t2, elapsed: e2, .. }) => {
                t1 == t2 && e1 == e2
            },
            _ => false,
        }
    }
}

impl<R> Eq for CorrelatorAction<R> {}

/// Token-keyed registry of pending requests.
pub struct Correlator<I, R>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    pending: HashMap<Bytes, PendingRequest<I, R>>,
    submitted_at: HashMap<Bytes, I>,
    next_message_id: u16,
}

impl<I, R> Default for Correlator<I, R>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, R> Correlator<I, R>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration> + Add<Duration, Output = I>,
{
    /// Creates an empty registry, with the message-ID counter starting at 0.
    #[must_use]
    pub fn new() -> Self {
        Self { pending: HashMap::new(), submitted_at: HashMap::new(), next_message_id: 0 }
    }

    /// Number of exchanges currently outstanding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the registry has no outstanding exchanges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Allocates a fresh token not currently held by any pending exchange,
    /// so the caller can embed it into a CoAP message *before* encoding it
    /// (the token must be part of the encoded bytes handed to
    /// [`Correlator::submit`] as `request_frame`).
    ///
    /// Tokens are drawn from `env.random_token()` and re-rolled on
    /// collision, so no two concurrent pending requests ever share a token
    /// (invariant 3).
    #[must_use]
    pub fn allocate_token<E: Environment>(&self, env: &E) -> Bytes {
        loop {
            let candidate = Bytes::copy_from_slice(&env.random_token());
            if !self.pending.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Registers a new pending request under `token` (previously obtained
    /// from [`Correlator::allocate_token`] and already encoded into
    /// `request_frame`), returning the same token for convenience.
    pub fn submit(
        &mut self,
        token: Bytes,
        now: I,
        request_frame: Bytes,
        retry_interval: Duration,
        max_attempts: u8,
        block_state: Option<BlockState>,
        resolver: R,
    ) -> Bytes {
        let message_id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);

        let deadline = now + retry_interval;
        self.pending.insert(
            token.clone(),
            PendingRequest {
                message_id,
                deadline,
                retry_count: 0,
                retry_interval,
                max_attempts,
                request_frame,
                block_state,
                resolver,
            },
        );
        self.submitted_at.insert(token.clone(), now);

        token
    }

    /// Looks up the pending request for `token`, if any is still
    /// outstanding. Returns `None` for unknown or already-completed tokens,
    /// which callers should treat as "log and drop" (§4.5).
    pub fn get_mut(&mut self, token: &[u8]) -> Option<&mut PendingRequest<I, R>> {
        self.pending.get_mut(token)
    }

    /// Marks activity on `token`: the caller received a matching ACK or
    /// reply and wants to extend the deadline by one more retry interval
    /// (used while a block-wise transfer is still in progress).
    pub fn refresh_deadline(&mut self, token: &[u8], now: I) {
        if let Some(pending) = self.pending.get_mut(token) {
            pending.deadline = now + pending.retry_interval;
            pending.retry_count = 0;
        }
    }

    /// Completes the exchange for `token`, removing it from the registry and
    /// returning its resolver. Returns `None` if `token` is unknown (e.g. a
    /// late reply for a cancelled or already-failed exchange).
    pub fn complete(&mut self, token: &[u8]) -> Option<R> {
        self.submitted_at.remove(token);
        self.pending.remove(token).map(|p| p.resolver)
    }

    /// Cancels the exchange for `token`, removing it from the registry and
    /// returning its resolver so the caller can resolve it as
    /// [`crate::error::CoreError::Cancelled`]. A late reply observed after
    /// cancellation finds no entry and is silently discarded (§4.5).
    pub fn cancel(&mut self, token: &[u8]) -> Option<R> {
        self.complete(token)
    }

    /// Drives the retry/timeout scheduler. Call this from the timer wheel;
    /// it inspects every pending request whose deadline has elapsed and
    /// either schedules a retransmission or fails the exchange.
    pub fn tick(&mut self, now: I) -> Vec<CorrelatorAction<R>> {
        let mut actions = Vec::new();
        let expired: Vec<Bytes> = self
            .pending
            .iter()
            .filter(|(_, p)| now >= p.deadline)
            .map(|(token, _)| token.clone())
            .collect();

        for token in expired {
            let Some(pending) = self.pending.get_mut(&token) else { continue };

            if pending.retry_count + 1 >= pending.max_attempts {
                let submitted_at = self.submitted_at.remove(&token).unwrap_or(now);
                let elapsed = now - submitted_at;
                let resolver = self.pending.remove(&token).expect("checked above").resolver;
                actions.push(CorrelatorAction::Fail { token, elapsed, resolver });
            } else {
                pending.retry_count += 1;
                pending.deadline = now + pending.retry_interval;
                actions.push(CorrelatorAction::Retransmit {
                    token: token.clone(),
                    frame: pending.request_frame.clone(),
                });
            }
        }

        actions
    }
}
