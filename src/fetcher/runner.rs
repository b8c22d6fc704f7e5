/**
* filename : runner
* description: Interval loop shared by every poller.
**/

use crate::fetcher::fetcher::Poller;
use crate::shutdown::{cancelled, ShutdownReceiver};
use crate::types::AppError;

use log::{debug, error, info, warn};
use tokio::time::{interval, Duration, MissedTickBehavior};

pub async fn run_poller<P: Poller>(
  mut poller: P,
  interval_duration: Duration,
  mut shutdown: ShutdownReceiver,
) {
  let mut tick = interval(interval_duration);
  tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
  info!("[{}] Starting with interval {:?}", poller.name(), interval_duration);

  loop {
    tokio::select! {
      _ = cancelled(&mut shutdown) => break,
      _ = tick.tick() => {}
    }

    match poller.poll_once().await {
      Ok(0) => {}
      Ok(emitted) => debug!("[{}] emitted {} items", poller.name(), emitted),
      Err(AppError::SendError(e)) => {
        error!("[{}] Downstream closed: {}", poller.name(), e);
        break;
      }
      Err(e) => {
        warn!(
          "[{}] ⏳ poll failed: {} | retrying in {:?}",
          poller.name(),
          e,
          interval_duration
        );
      }
    }
  }

  warn!("[{}] Loop exited.", poller.name());
}
