/// Periodic session re-validation
///
/// Extension: the session is otherwise established once and never checked
/// again. When enabled, the monitor re-probes the credential on a fixed
/// interval and reports `Expired` once the remote API stops accepting it.
/// It does not re-authenticate.
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::validator::SessionValidator;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Expired,
}

pub struct SessionMonitor {
    status: watch::Receiver<SessionStatus>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionMonitor {
    pub fn spawn(session: Session, validator: SessionValidator, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(SessionStatus::Active);
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; the session was just validated
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if validator.is_valid(session.credential()).await {
                    debug!("session still valid");
                    continue;
                }

                warn!(
                    age_secs = session.age().num_seconds(),
                    "Session credential no longer accepted by the remote API"
                );
                let _ = tx.send(SessionStatus::Expired);
                break;
            }
        });

        Self {
            status: rx,
            shutdown,
            task,
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Receiver that observes status changes
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}
