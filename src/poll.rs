//! Near-real-time notification by polling. A background task re-queries
//! the service for items created after a cursor timestamp and surfaces the
//! newest one on a channel. Push delivery could replace the timer later as
//! long as the `created_at > cursor` filtering contract stays the same.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::Item;
use crate::services::ItemService;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops the polling loop. Safe to call more than once.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawns the polling loop. The cursor starts at spawn time, so only items
/// reported afterwards are surfaced. Every period the loop asks for items
/// newer than the cursor; a non-empty result sends the newest item on the
/// returned channel and moves the cursor to now. Query failures are logged
/// and leave the cursor alone, so the next tick retries the same window.
pub fn spawn_poller(
    service: Arc<ItemService>,
    period: Duration,
) -> (PollerHandle, mpsc::UnboundedReceiver<Item>) {
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let (stop_tx, mut stop_rx) = watch::channel(false);

    // The cursor must be fixed before the task is handed to the scheduler:
    // anything reported after this call is inside the polling window.
    let mut last_checked = Utc::now();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so polling
        // starts one full period after spawn.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match service.items_since(last_checked).await {
                        Ok(items) if !items.is_empty() => {
                            tracing::debug!("poll found {} new item(s)", items.len());
                            // Newest first; surface the head.
                            let _ = notify_tx.send(items[0].clone());
                            last_checked = Utc::now();
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("poll failed, retrying next tick: {}", e);
                        }
                    }
                }
                changed = stop_rx.changed() => {
                    match changed {
                        Ok(()) if *stop_rx.borrow() => break,
                        Ok(()) => {}
                        // Handle dropped: nobody can stop us anymore, shut down.
                        Err(_) => break,
                    }
                }
            }
        }
    });

    (PollerHandle { stop_tx, task }, notify_rx)
}
