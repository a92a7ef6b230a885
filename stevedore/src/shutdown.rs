//! Stop signalling between the listener and the flush worker.
//!
//! A [`Broadcaster`]/[`Watcher`] pair carries a one-time stop notice. The
//! `Broadcaster` side is held by whoever decides the pipeline is done, the
//! `quitting` event handler or the listener's own teardown; the `Watcher`
//! side sits in the flush worker's select loop. The signal fires at most
//! once and is observed at most once per pair.

use tokio::sync::broadcast::{self, error};

/// Construct a connected [`Watcher`] and [`Broadcaster`] pair.
#[must_use]
pub fn signal() -> (Watcher, Broadcaster) {
    // The channel never carries a payload. Dropping the sender closes the
    // channel, and that closure is the signal; a receiver waiting in
    // `recv` wakes with `Closed`.
    let (sender, receiver) = broadcast::channel(1);
    (
        Watcher {
            receiver,
            signal_seen: false,
        },
        Broadcaster { sender },
    )
}

/// Sends the one-time stop notice to the paired [`Watcher`].
#[derive(Debug)]
pub struct Broadcaster {
    sender: broadcast::Sender<()>,
}

impl Broadcaster {
    /// Send the stop notice. Consumes the broadcaster; the notice cannot
    /// be sent twice.
    pub fn signal(self) {
        drop(self.sender);
    }
}

/// Observes the stop notice sent by the paired [`Broadcaster`].
#[derive(Debug)]
pub struct Watcher {
    receiver: broadcast::Receiver<()>,
    signal_seen: bool,
}

impl Watcher {
    /// Wait for the stop notice. Returns immediately if it was already
    /// sent.
    ///
    /// # Panics
    ///
    /// Panics if the broadcast receiver reports lag, which a capacity-one
    /// channel that never carries a message cannot do.
    pub async fn recv(mut self) {
        match self.receiver.recv().await {
            Ok(()) | Err(error::RecvError::Closed) => {}
            Err(error::RecvError::Lagged(_)) => {
                panic!("stop channel lagged, which it cannot");
            }
        }
    }

    /// Check for the stop notice without blocking. Once the notice has
    /// been observed every later call returns `true`.
    ///
    /// # Panics
    ///
    /// Panics if the broadcast receiver reports lag, which a capacity-one
    /// channel that never carries a message cannot do.
    pub fn try_recv(&mut self) -> bool {
        if self.signal_seen {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(()) | Err(error::TryRecvError::Closed) => {
                self.signal_seen = true;
                true
            }
            Err(error::TryRecvError::Empty) => false,
            Err(error::TryRecvError::Lagged(_)) => {
                panic!("stop channel lagged, which it cannot");
            }
        }
    }
}
