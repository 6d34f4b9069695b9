use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::ReportSchedule;
use crate::reports::{self, Delivery};
use crate::state::SharedState;

/// Run the overdue report every `schedule.interval` until `shutdown` flips to
/// true. The first report goes out one interval after start.
pub fn spawn(
    state: SharedState,
    schedule: ReportSchedule,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run(state, schedule, shutdown))
}

async fn run(state: SharedState, schedule: ReportSchedule, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(
        interval_secs = schedule.interval.as_secs(),
        recipient = %schedule.recipient,
        "Overdue report schedule started"
    );

    let mut ticker = interval_at(Instant::now() + schedule.interval, schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => run_once(&state, &schedule.recipient).await,
            _ = shutdown.changed() => {}
        }
    }

    tracing::info!("Overdue report schedule stopped");
}

async fn run_once(state: &SharedState, recipient: &str) {
    let today = Utc::now().date_naive();
    match reports::send_overdue_report(&state.pool, state.notifier.as_ref(), recipient, today).await {
        Ok(outcome) => {
            if let Delivery::Failed(reason) = outcome.delivery {
                tracing::warn!(
                    count = outcome.overdue.len(),
                    "Scheduled overdue report not delivered: {reason}"
                );
            }
        }
        Err(e) => tracing::error!("Scheduled overdue report query failed: {e}"),
    }
}
