//! Background tick scheduling.
//!
//! The ticker wakes once per period and asks the session to catch up with
//! the wall clock, so a late or missed wake-up still counts every elapsed
//! second. Only one ticker may drive a session at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::ValidationError;
use crate::session::FocusSession;

pub struct Ticker;

impl Ticker {
    /// Spawn a ticker for `session`.
    ///
    /// # Errors
    /// [`ValidationError::TickerAlreadyAttached`] if another ticker is still
    /// running for this session.
    pub async fn attach(
        session: Arc<Mutex<FocusSession>>,
        period: Duration,
    ) -> Result<TickerHandle, ValidationError> {
        {
            let mut guard = session.lock().await;
            if guard.ticker_attached {
                return Err(ValidationError::TickerAlreadyAttached);
            }
            guard.ticker_attached = true;
        }

        let (shutdown, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        session.lock().await.catch_up();
                    }
                    _ = stopped.changed() => break,
                }
            }
            session.lock().await.ticker_attached = false;
            tracing::debug!("ticker detached");
        });

        tracing::debug!(?period, "ticker attached");
        Ok(TickerHandle { shutdown, task })
    }
}

/// Stops the ticker it belongs to.
pub struct TickerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Stop ticking and wait until the session is released.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("ticker task failed: {e}");
        }
    }
}
