//! One in-flight page request per stream.

use std::collections::HashMap;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// An independently paginated sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKey {
    Comments,
    Replies(Uuid),
}

/// Handle for one started request. Only the newest ticket of a stream may commit.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    stream: StreamKey,
    generation: u64,
    token: CancellationToken,
}

impl RequestTicket {
    pub fn stream(&self) -> StreamKey {
        self.stream
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `fut` until it completes or this ticket is cancelled.
    /// Returns `None` when cancelled.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

#[derive(Debug, Default)]
pub struct RequestLifecycle {
    pending: HashMap<StreamKey, RequestTicket>,
    next_generation: u64,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request on `stream`, cancelling whatever is still pending there
    pub fn begin(&mut self, stream: StreamKey) -> RequestTicket {
        if let Some(previous) = self.pending.remove(&stream) {
            previous.token.cancel();
        }
        self.next_generation += 1;
        let ticket = RequestTicket {
            stream,
            generation: self.next_generation,
            token: CancellationToken::new(),
        };
        self.pending.insert(stream, ticket.clone());
        ticket
    }

    /// True if `ticket` is still the live request of its stream
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        !ticket.is_cancelled()
            && self
                .pending
                .get(&ticket.stream)
                .is_some_and(|live| live.generation == ticket.generation)
    }

    /// Retire `ticket`. Returns false if it was superseded or cancelled,
    /// in which case its result must be discarded.
    pub fn finish(&mut self, ticket: &RequestTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.pending.remove(&ticket.stream);
        true
    }

    pub fn cancel(&mut self, stream: StreamKey) {
        if let Some(ticket) = self.pending.remove(&stream) {
            ticket.token.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, ticket) in self.pending.drain() {
            ticket.token.cancel();
        }
    }

    pub fn in_flight(&self, stream: StreamKey) -> bool {
        self.pending.contains_key(&stream)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
