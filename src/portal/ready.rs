//! One-shot readiness signal for the portal settings fetch

use crate::models::PortalConfig;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of the settings handshake
#[derive(Debug, Clone, PartialEq)]
pub struct Readiness {
    pub config: PortalConfig,
    pub voucher_enabled: bool,
    /// Voucher access is unavailable; the auth flow must not be offered
    pub block_access: bool,
    /// Transport failure tag when the settings could not be fetched
    pub error: Option<String>,
}

/// Single-assignment cell that any number of tasks can wait on.
///
/// The first `resolve` wins; later calls are ignored.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<Option<Arc<Readiness>>>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Settle the signal. Returns `false` if it was already settled.
    pub fn resolve(&self, readiness: Readiness) -> bool {
        let mut value = Some(Arc::new(readiness));
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = value.take();
            true
        })
    }

    pub fn get(&self) -> Option<Arc<Readiness>> {
        self.tx.borrow().clone()
    }

    pub async fn wait(&self) -> Arc<Readiness> {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(ready) = rx.borrow_and_update().as_ref() {
                return Arc::clone(ready);
            }
            // `self` keeps the sender alive, so the channel cannot close here
            let _ = rx.changed().await;
        }
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn readiness(enabled: bool) -> Readiness {
        Readiness {
            config: PortalConfig::default(),
            voucher_enabled: enabled,
            block_access: !enabled,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_waiters_see_resolution() {
        let signal = ReadySignal::new();
        let first = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });
        let second = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(signal.get().is_none());
        assert!(signal.resolve(readiness(true)));

        assert!(first.await.unwrap().voucher_enabled);
        assert!(second.await.unwrap().voucher_enabled);
    }

    #[tokio::test]
    async fn test_resolves_once() {
        let signal = ReadySignal::new();
        assert!(signal.resolve(readiness(false)));
        assert!(!signal.resolve(readiness(true)));

        let ready = signal.wait().await;
        assert!(ready.block_access);
        assert!(!ready.voucher_enabled);
    }
}
