// ── Sync notifications ──

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

use crate::model::StateValue;

/// What subscribers hear from the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// At least one state of this device changed value since the last
    /// successful poll. Carries the full new state list.
    StateChanged {
        device_id: String,
        states: Vec<StateValue>,
    },
    /// Devices entered or left the selected set.
    MembershipChanged {
        added: Vec<String>,
        removed: Vec<String>,
    },
    /// A poll failed; cached data is stale but still served.
    Degraded {
        reason: String,
        consecutive_failures: u32,
    },
    /// First successful poll after one or more failures.
    Recovered,
    /// Token refresh or a device-cloud call was refused. Polling stops.
    AuthenticationFailed { message: String },
}

/// Whether cached state can be trusted right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// No poll has completed yet.
    Unknown,
    Available,
    Degraded { consecutive_failures: u32 },
    /// Credentials were rejected; re-authentication is required.
    Unauthorized,
}

/// Where the poll state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
    Succeeded,
    Failed,
}

/// `Stream` adapter over the event broadcast.
///
/// Lagged receivers skip what they missed rather than ending the stream;
/// consumers re-read state from the catalog anyway.
pub struct SyncEventStream {
    inner: BroadcastStream<Arc<SyncEvent>>,
}

impl SyncEventStream {
    pub(crate) fn new(rx: broadcast::Receiver<Arc<SyncEvent>>) -> Self {
        Self {
            inner: BroadcastStream::new(rx),
        }
    }
}

impl Stream for SyncEventStream {
    type Item = Arc<SyncEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(n)))) => {
                    debug!(skipped = n, "sync event subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
