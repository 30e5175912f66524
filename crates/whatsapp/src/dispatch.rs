//! Outbound dispatch: a bounded FIFO queue drained by a single driver task.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    thiserror::Error as ThisError,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    transcript::{Sender, Transcript},
    types::OutboundPayload,
};

/// Seam between the sequencer and the Graph API client.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send one payload; resolves to the assigned message ID.
    async fn send(&self, payload: &OutboundPayload) -> Result<String>;
}

/// Typed rejection returned by [`DispatchSequencer::enqueue`].
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum DispatchError {
    #[error("outbound queue full ({capacity} pending)")]
    QueueFull { capacity: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchPhase {
    Idle,
    Sending,
}

struct DispatchState {
    queue: VecDeque<OutboundPayload>,
    phase: DispatchPhase,
}

/// FIFO dispatcher with at most one Channel API send in flight.
///
/// `enqueue` is synchronous and never touches the network. While sending,
/// the in-flight payload stays at the front of the queue; a single driver
/// task consumes each send outcome and advances the queue before starting
/// the next send, so ordering and single-flight hold by construction.
///
/// A failed send is dropped with a structured warning and the queue
/// advances; one bad payload never stalls the queue.
pub struct DispatchSequencer {
    // Held only for short, non-await sections.
    state: Mutex<DispatchState>,
    outbound: Arc<dyn Outbound>,
    transcript: Arc<Transcript>,
    capacity: usize,
}

impl DispatchSequencer {
    pub fn new(outbound: Arc<dyn Outbound>, transcript: Arc<Transcript>, capacity: usize) -> Self {
        Self {
            state: Mutex::new(DispatchState {
                queue: VecDeque::new(),
                phase: DispatchPhase::Idle,
            }),
            outbound,
            transcript,
            // capacity 0 would reject every enqueue
            capacity: capacity.max(1),
        }
    }

    /// Append a payload to the queue and start the driver if idle.
    ///
    /// Returns [`DispatchError::QueueFull`] without mutating the queue when
    /// `capacity` payloads (in-flight included) are already pending.
    pub fn enqueue(
        self: &Arc<Self>,
        payload: OutboundPayload,
    ) -> std::result::Result<(), DispatchError> {
        let first = {
            let mut state = self.lock_state();
            if state.queue.len() >= self.capacity {
                return Err(DispatchError::QueueFull {
                    capacity: self.capacity,
                });
            }
            state.queue.push_back(payload);
            if state.phase == DispatchPhase::Idle {
                state.phase = DispatchPhase::Sending;
                state.queue.front().cloned()
            } else {
                None
            }
        };

        if let Some(first) = first {
            debug!(to = %first.to, "dispatch driver starting");
            self.spawn_driver(first);
        }
        Ok(())
    }

    /// Consume a successful send outcome: pop the delivered payload, record
    /// it in the transcript, and hand back the next payload to send.
    ///
    /// This is the sole mechanism that advances the queue after a success.
    pub fn acknowledge_delivery(&self, message_id: &str) -> Option<OutboundPayload> {
        let mut state = self.lock_state();
        let Some(delivered) = state.queue.pop_front() else {
            warn!(message_id, "delivery acknowledged with an empty queue");
            state.phase = DispatchPhase::Idle;
            return None;
        };
        info!(message_id, to = %delivered.to, "message delivered");
        self.transcript.append(Sender::Bot, transcript_line(&delivered));
        Self::next_or_idle(&mut state)
    }

    /// Number of pending payloads, in-flight included.
    pub fn queued_len(&self) -> usize {
        self.lock_state().queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.lock_state().phase == DispatchPhase::Idle
    }

    fn spawn_driver(self: &Arc<Self>, first: OutboundPayload) {
        let sequencer = Arc::clone(self);
        tokio::spawn(async move {
            let mut current = first;
            loop {
                let next = match sequencer.outbound.send(&current).await {
                    Ok(message_id) => sequencer.acknowledge_delivery(&message_id),
                    Err(error) => sequencer.discard_failed(&error),
                };
                match next {
                    Some(payload) => current = payload,
                    None => break,
                }
            }
        });
    }

    /// Consume a failed send outcome: drop the front payload, log the
    /// cause, and advance. Drop-and-log keeps newer replies flowing instead
    /// of stalling the queue behind a payload the API already refused.
    fn discard_failed(&self, error: &Error) -> Option<OutboundPayload> {
        let mut state = self.lock_state();
        if let Some(dropped) = state.queue.pop_front() {
            warn!(to = %dropped.to, error = %error, "send failed, dropping payload");
        } else {
            warn!(error = %error, "send failed with an empty queue");
        }
        Self::next_or_idle(&mut state)
    }

    fn next_or_idle(state: &mut DispatchState) -> Option<OutboundPayload> {
        match state.queue.front().cloned() {
            Some(next) => Some(next),
            None => {
                state.phase = DispatchPhase::Idle;
                None
            },
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// What an outbound payload looks like in the transcript.
fn transcript_line(payload: &OutboundPayload) -> String {
    if payload.text.is_empty() {
        payload
            .media
            .as_ref()
            .map(|m| m.url.clone())
            .unwrap_or_default()
    } else {
        payload.text.clone()
    }
}
