//! Snapshot persistence seam.
//!
//! The coordinator saves after every mutation and treats every failure as
//! non-fatal. [`BackgroundGateway`] moves the actual write off the caller's
//! path so a slow disk never delays tick delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::snapshot::Snapshot;
use crate::error::PersistenceError;

pub trait PersistenceGateway: Send {
    /// Load the last saved snapshot, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;

    /// A failure that happened after `save` already returned. Only
    /// asynchronous gateways have these.
    fn take_deferred_error(&self) -> Option<PersistenceError> {
        None
    }
}

impl<G: PersistenceGateway + Sync + ?Sized> PersistenceGateway for Arc<G> {
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        (**self).save(snapshot)
    }

    fn take_deferred_error(&self) -> Option<PersistenceError> {
        (**self).take_deferred_error()
    }
}

/// Keeps the encoded snapshot in memory. Clones share storage.
///
/// Stores the JSON text rather than the struct so the versioned decode path
/// is exercised the same way as with a real store.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    stored: Arc<Mutex<Option<String>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with raw JSON, e.g. an older snapshot layout.
    pub fn with_json(json: impl Into<String>) -> Self {
        let gw = Self::default();
        *gw.lock() = Some(json.into());
        gw
    }

    /// Make every following load and save fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self) -> Option<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.stored.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError::Query("storage unavailable".into()));
        }
        Ok(())
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        self.check()?;
        self.lock().as_deref().map(Snapshot::from_json).transpose()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        self.check()?;
        *self.lock() = Some(snapshot.to_json()?);
        Ok(())
    }
}

/// Fire-and-forget wrapper around a blocking gateway.
///
/// `save` only queues the snapshot; a blocking worker writes the newest
/// queued snapshot and drops the ones it superseded. Must be created inside
/// a tokio runtime.
pub struct BackgroundGateway<G> {
    inner: Arc<Mutex<G>>,
    tx: Option<mpsc::UnboundedSender<Snapshot>>,
    deferred: Arc<Mutex<Option<PersistenceError>>>,
    worker: Option<JoinHandle<()>>,
}

impl<G: PersistenceGateway + 'static> BackgroundGateway<G> {
    pub fn spawn(inner: G) -> Self {
        let inner = Arc::new(Mutex::new(inner));
        let deferred = Arc::new(Mutex::new(None));
        let (tx, mut rx) = mpsc::unbounded_channel::<Snapshot>();

        let worker = {
            let inner = Arc::clone(&inner);
            let deferred = Arc::clone(&deferred);
            tokio::task::spawn_blocking(move || {
                while let Some(mut snapshot) = rx.blocking_recv() {
                    while let Ok(newer) = rx.try_recv() {
                        snapshot = newer;
                    }
                    let result = inner
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .save(&snapshot);
                    if let Err(e) = result {
                        tracing::warn!("background snapshot save failed: {e}");
                        *deferred.lock().unwrap_or_else(|e| e.into_inner()) = Some(e);
                    }
                }
            })
        };

        Self {
            inner,
            tx: Some(tx),
            deferred,
            worker: Some(worker),
        }
    }

    /// Stop accepting snapshots and wait until the queued one is written.
    pub async fn flush(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!("snapshot writer panicked: {e}");
            }
        }
    }
}

impl<G: PersistenceGateway + 'static> PersistenceGateway for BackgroundGateway<G> {
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).load()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let tx = self.tx.as_ref().ok_or(PersistenceError::WriterClosed)?;
        tx.send(snapshot.clone())
            .map_err(|_| PersistenceError::WriterClosed)
    }

    fn take_deferred_error(&self) -> Option<PersistenceError> {
        self.deferred.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Stats;
    use crate::timer::{Settings, TimerEngine};
    use crate::storage::SNAPSHOT_VERSION;

    fn snapshot(total_sessions: u64) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: chrono::Utc::now(),
            session: TimerEngine::default().state(),
            settings: Settings::default(),
            tasks: Vec::new(),
            current_task_id: None,
            stats: Stats {
                total_sessions,
                ..Default::default()
            },
            blocked_sites: Vec::new(),
        }
    }

    #[test]
    fn memory_gateway_roundtrip() {
        let gw = MemoryGateway::new();
        assert!(gw.load().unwrap().is_none());
        gw.save(&snapshot(2)).unwrap();
        assert_eq!(gw.load().unwrap().unwrap().stats.total_sessions, 2);
    }

    #[test]
    fn memory_gateway_can_fail() {
        let gw = MemoryGateway::new();
        gw.set_failing(true);
        assert!(gw.save(&snapshot(1)).is_err());
        assert!(gw.load().is_err());
    }

    #[tokio::test]
    async fn background_gateway_writes_latest() {
        let mem = MemoryGateway::new();
        let bg = BackgroundGateway::spawn(mem.clone());
        for n in 1..=5 {
            bg.save(&snapshot(n)).unwrap();
        }
        bg.flush().await;
        assert_eq!(mem.load().unwrap().unwrap().stats.total_sessions, 5);
    }

    #[tokio::test]
    async fn background_gateway_reports_deferred_failure() {
        let mem = MemoryGateway::new();
        mem.set_failing(true);
        let bg = BackgroundGateway::spawn(mem.clone());
        assert!(bg.save(&snapshot(1)).is_ok());
        // Wait for the worker to drain the queue.
        for _ in 0..100 {
            if let Some(err) = bg.take_deferred_error() {
                assert!(matches!(err, PersistenceError::Query(_)));
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("deferred error never reported");
    }
}
