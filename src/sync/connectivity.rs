//! Online/offline tracking.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared online/offline flag.
///
/// An explicit, injectable handle rather than a global: the embedding
/// application maps its platform connectivity signal onto this via
/// [`set_online`](Connectivity::set_online), and tests flip it
/// directly. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    inner: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self {
            inner: Arc::new(tx),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.inner.borrow()
    }

    pub fn set_online(&self, online: bool) {
        let was = self.inner.send_replace(online);
        if was != online {
            tracing::info!(online, "connectivity changed");
        }
    }

    /// A receiver that wakes on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert!(Connectivity::new(true).is_online());
        assert!(!Connectivity::new(false).is_online());
    }

    #[test]
    fn test_clones_share_state() {
        let connectivity = Connectivity::new(false);
        let clone = connectivity.clone();

        connectivity.set_online(true);
        assert!(clone.is_online());
    }

    #[tokio::test]
    async fn test_subscribe_sees_transition() {
        let connectivity = Connectivity::new(false);
        let mut rx = connectivity.subscribe();

        connectivity.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }
}
