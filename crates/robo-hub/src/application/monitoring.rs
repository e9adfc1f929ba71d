//! Periodic location polling for a connected Sphero.
//!
//! While started, a background task asks the hub to execute `GetLocation`
//! once per interval.  The task never touches the device itself: it only
//! posts a [`HubRequest`] so all device access stays on the hub task.

use std::time::Duration;

use robo_core::{Address, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::application::hub::HubRequest;

/// Restartable location poller.  `start` and `stop` are idempotent.
#[derive(Debug)]
pub struct Monitoring {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl Monitoring {
    pub fn new(interval: Duration) -> Self {
        Self { interval, task: None }
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Starts polling `address`.  The first poll happens one interval from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self, address: Address, requests: UnboundedSender<HubRequest>) {
        if self.task.is_some() {
            return;
        }
        debug!(%address, "starting location monitoring");
        let period = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let request = HubRequest::Exec {
                    address: address.clone(),
                    command: Command::GetLocation,
                };
                if requests.send(request).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("stopping location monitoring");
            task.abort();
        }
    }

    /// Releases the background task.
    pub fn clean_up(&mut self) {
        self.stop();
    }
}

impl Drop for Monitoring {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const PERIOD: Duration = Duration::from_millis(1000);

    fn is_get_location(request: &HubRequest) -> bool {
        matches!(
            request,
            HubRequest::Exec {
                command: Command::GetLocation,
                ..
            }
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_once_per_interval() {
        // Arrange
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut monitoring = Monitoring::new(PERIOD);

        // Act
        monitoring.start(Address::from("AA:BB"), tx);
        tokio::time::sleep(Duration::from_millis(3500)).await;

        // Assert
        let mut polls = 0;
        while let Ok(request) = rx.try_recv() {
            assert!(is_get_location(&request));
            polls += 1;
        }
        assert_eq!(polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_spawns_one_poller() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut monitoring = Monitoring::new(PERIOD);

        monitoring.start(Address::from("AA:BB"), tx.clone());
        monitoring.start(Address::from("AA:BB"), tx);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_polling_and_allows_restart() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut monitoring = Monitoring::new(PERIOD);
        monitoring.start(Address::from("AA:BB"), tx.clone());

        monitoring.stop();
        monitoring.stop();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(rx.try_recv().is_err());
        assert!(!monitoring.is_started());

        monitoring.start(Address::from("AA:BB"), tx);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(rx.try_recv().is_ok());
    }
}
