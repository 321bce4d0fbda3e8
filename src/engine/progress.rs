//! Progress reporter (§4.8): a dedicated task, independent of worker
//! output, that emits a [`ProgressEvent`] every 100 ms and one final
//! snapshot once every worker has exited.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::event::{Event, ProgressEvent};

const REPORT_INTERVAL: Duration = Duration::from_millis(100);

/// Ticks every 100 ms emitting `ProgressEvent { total, completed, rate }`
/// until `done` is signalled, then emits one final snapshot. The final
/// snapshot forces `completed = total` unless the scan was cancelled, per
/// §4.8: "emits one final ProgressEvent with Completed = Total (unless
/// cancelled)".
pub async fn run(
    total: u64,
    completed: Arc<AtomicU64>,
    mut done: watch::Receiver<bool>,
    cancellation: CancellationToken,
    tx: mpsc::Sender<Event>,
) {
    let mut ticker = tokio::time::interval(REPORT_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_completed = 0u64;
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let current = completed.load(Ordering::Relaxed);
                let elapsed = now.duration_since(last_tick).as_secs_f64().max(f64::EPSILON);
                let rate = (current.saturating_sub(last_completed)) as f64 / elapsed;
                last_completed = current;
                last_tick = now;
                if tx.send(Event::Progress(ProgressEvent { total, completed: current, rate })).await.is_err() {
                    return;
                }
            }
            changed = done.changed() => {
                if changed.is_err() || *done.borrow() {
                    break;
                }
            }
        }
    }

    let final_completed =
        if cancellation.is_cancelled() { completed.load(Ordering::Relaxed) } else { total };
    let _ = tx
        .send(Event::Progress(ProgressEvent { total, completed: final_completed, rate: 0.0 }))
        .await;
}
