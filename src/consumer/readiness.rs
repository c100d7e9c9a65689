use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

// ============================================================================
// Readiness Gate
// ============================================================================
//
// A one-shot signal per assignment epoch. The gate is armed at construction,
// opened exactly once when the consumer's partitions are assigned, and
// rearmed with a freshly allocated one-shot pair when they are revoked. It
// is a single-fire gate per epoch, not a level that stays true forever.
//
// One waiter per epoch: the receiver is handed out once.
//
// ============================================================================

pub struct ReadinessGate {
    inner: Mutex<Epoch>,
    open: AtomicBool,
}

struct Epoch {
    tx: Option<oneshot::Sender<()>>,
    rx: Option<oneshot::Receiver<()>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            inner: Mutex::new(Epoch {
                tx: Some(tx),
                rx: Some(rx),
            }),
            open: AtomicBool::new(false),
        }
    }

    /// Partition assignment completed: open the gate for the current epoch.
    /// Subsequent calls within the same epoch are no-ops.
    pub fn open(&self) {
        let tx = self
            .inner
            .lock()
            .expect("readiness gate lock poisoned")
            .tx
            .take();
        self.open.store(true, Ordering::SeqCst);
        if let Some(tx) = tx {
            // the waiter may already be gone; the epoch still counts as open
            let _ = tx.send(());
        }
    }

    /// Partitions revoked: arm a new one-shot pair for the next assignment
    /// epoch.
    pub fn rearm(&self) {
        let (tx, rx) = oneshot::channel();
        let mut epoch = self.inner.lock().expect("readiness gate lock poisoned");
        epoch.tx = Some(tx);
        epoch.rx = Some(rx);
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Wait until an assignment epoch opens. A waiter parked on an epoch
    /// that gets revoked before opening carries over to the next epoch.
    pub async fn opened(&self) {
        loop {
            if self.is_open() {
                return;
            }

            let rx = self
                .inner
                .lock()
                .expect("readiness gate lock poisoned")
                .rx
                .take();

            match rx {
                Some(rx) => {
                    if rx.await.is_ok() {
                        return;
                    }
                    // the epoch was replaced before it opened; pick up the
                    // fresh receiver on the next pass
                }
                // receiver already claimed this epoch; the atomic flag is
                // what remains to observe
                None => return,
            }
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_waiter_unblocks_on_open() {
        let gate = Arc::new(ReadinessGate::new());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.opened().await })
        };

        gate.open();

        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter timed out")
            .unwrap();
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn test_late_waiter_sees_open_epoch() {
        let gate = ReadinessGate::new();
        gate.open();

        timeout(Duration::from_secs(1), gate.opened())
            .await
            .expect("waiter timed out");
    }

    #[tokio::test]
    async fn test_rearm_starts_a_closed_epoch() {
        let gate = Arc::new(ReadinessGate::new());
        gate.open();
        gate.rearm();

        assert!(!gate.is_open());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.opened().await })
        };

        gate.open();

        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter timed out")
            .unwrap();
    }

    #[tokio::test]
    async fn test_waiter_survives_revocation_before_open() {
        let gate = Arc::new(ReadinessGate::new());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.opened().await })
        };

        // let the waiter park on the first epoch's receiver
        tokio::time::sleep(Duration::from_millis(20)).await;

        gate.rearm();
        gate.open();

        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter timed out")
            .unwrap();
    }
}
