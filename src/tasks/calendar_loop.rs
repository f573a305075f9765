use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info};

use crate::service::dispatch_service::CallDispatcher;
use crate::tasks::ticker::Ticker;

/// Runs one cycle after `startup_delay`, then one per tick until the ticker stops.
/// Returns the number of cycles run.
pub async fn run_calendar_loop<T: Ticker + ?Sized>(
    dispatcher: Arc<CallDispatcher>,
    ticker: &mut T,
    startup_delay: Duration,
) -> usize {
    let mut cycles = 0;
    if !startup_delay.is_zero() {
        sleep(startup_delay).await;
    }
    loop {
        calendar_tick(&dispatcher).await;
        cycles += 1;
        if !ticker.tick().await {
            info!(cycles, "calendar loop stopped");
            return cycles;
        }
        info!(at = %Utc::now(), "scheduled calendar check triggered");
    }
}

async fn calendar_tick(dispatcher: &CallDispatcher) {
    if let Err(err) = dispatcher.run_cycle(Utc::now()).await {
        error!(error = %err, "error processing calendar events");
    }
}
