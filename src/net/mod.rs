//! # Connectivity Monitor
//!
//! Tracks the runtime's online/offline signal and fans it out to
//! subscribers. The embedding runtime feeds transitions in through
//! `set_online`; components hold explicit subscription handles that are
//! released on drop, so the event wiring is testable without a real
//! browser or OS network stack.

use tokio::sync::watch;

/// Online/offline connectivity signal
#[derive(Debug)]
pub struct ConnectivityMonitor {
    status: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial status
    pub fn new(online: bool) -> Self {
        let (status, _) = watch::channel(online);
        Self { status }
    }

    /// Instantaneous connectivity query
    pub fn is_online(&self) -> bool {
        *self.status.borrow()
    }

    /// Feed a connectivity transition from the runtime. No-op (and no
    /// wake-up) when the status did not actually change.
    pub fn set_online(&self, online: bool) {
        self.status.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
    }

    /// Subscribe to connectivity transitions. The handle yields the
    /// current status and wakes on every change; dropping it releases the
    /// subscription.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        // Assume online until the runtime says otherwise
        Self::new(true)
    }
}
