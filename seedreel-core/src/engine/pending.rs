//! Single-resolution handle for an in-flight torrent resolution.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::{EngineError, EngineTorrent};

type Resolution = Result<Arc<dyn EngineTorrent>, EngineError>;

/// Future of a torrent the engine is still resolving.
///
/// Resolves exactly once. Calling [`PendingTorrent::cancel`] tells the engine
/// to abandon the resolution; if it completes anyway, the engine destroys the
/// torrent itself instead of handing it out.
pub struct PendingTorrent {
    receiver: oneshot::Receiver<Resolution>,
    cancel: CancellationToken,
}

impl PendingTorrent {
    /// Pairs the engine side of a resolution with its caller.
    pub fn channel() -> (ResolutionResponder, Self) {
        let (sender, receiver) = oneshot::channel();
        let cancel = CancellationToken::new();
        (
            ResolutionResponder {
                sender,
                cancel: cancel.clone(),
            },
            Self { receiver, cancel },
        )
    }

    /// A handle that is already resolved.
    pub fn ready(result: Resolution) -> Self {
        let (responder, pending) = Self::channel();
        responder.respond(result);
        pending
    }

    /// Abandons the resolution. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Future for PendingTorrent {
    type Output = Resolution;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(EngineError::Shutdown)))
    }
}

/// Engine side of a [`PendingTorrent`].
pub struct ResolutionResponder {
    sender: oneshot::Sender<Resolution>,
    cancel: CancellationToken,
}

impl ResolutionResponder {
    /// True once the caller cancelled or dropped its handle.
    pub fn is_abandoned(&self) -> bool {
        self.cancel.is_cancelled() || self.sender.is_closed()
    }

    /// Token the engine can select on while resolving.
    pub fn cancelled(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Delivers the result.
    ///
    /// Returns the torrent back when nobody is waiting for it any more, so
    /// the engine can destroy it.
    pub fn respond(self, result: Resolution) -> Option<Arc<dyn EngineTorrent>> {
        if self.cancel.is_cancelled() {
            return result.ok();
        }
        match self.sender.send(result) {
            Ok(()) => None,
            Err(unclaimed) => unclaimed.ok(),
        }
    }
}
