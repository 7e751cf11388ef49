// Progress simulator: a tick loop plus an independent completion timer
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::progress::{ProgressState, ProgressTracker};
use super::GenerationRequest;

/// What to do when the completion wait is cancelled before it elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Start the completion wait over.
    Retry,
    /// Stop without completing.
    #[default]
    Abort,
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub tick_interval: Duration,
    pub step_percent: f64,
    pub total_wait: Duration,
    pub cancel_policy: CancelPolicy,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(30),
            step_percent: 0.5,
            total_wait: Duration::from_secs(5),
            cancel_policy: CancelPolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationEvent {
    Tick,
    WaitElapsed,
    WaitCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The wait finished; move on to the player.
    Completed,
    /// The wait was cancelled under [`CancelPolicy::Abort`].
    Aborted,
}

pub struct ProgressSimulator {
    request: GenerationRequest,
    config: SimulatorConfig,
    tracker: ProgressTracker,
    state_tx: watch::Sender<ProgressState>,
    events_tx: mpsc::UnboundedSender<GenerationEvent>,
    events_rx: mpsc::UnboundedReceiver<GenerationEvent>,
    ticker: Option<JoinHandle<()>>,
    waiter: Option<JoinHandle<()>>,
    cancel: Arc<Notify>,
}

impl ProgressSimulator {
    pub fn new(request: GenerationRequest, config: SimulatorConfig) -> Self {
        let tracker = ProgressTracker::new(config.step_percent);
        let (state_tx, _) = watch::channel(tracker.snapshot());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            request,
            config,
            tracker,
            state_tx,
            events_tx,
            events_rx,
            ticker: None,
            waiter: None,
            cancel: Arc::new(Notify::new()),
        }
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ProgressState {
        self.tracker.snapshot()
    }

    pub fn fraction(&self) -> f64 {
        self.tracker.fraction()
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some() || self.waiter.is_some()
    }

    /// Start the tick loop and the completion timer. Calling it again while
    /// running, or after completion, does nothing. Must be called inside a
    /// tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() || self.tracker.is_complete() {
            return;
        }

        info!(
            "Generating {} track for prompt {:?}",
            self.request.genre, self.request.prompt
        );

        let events = self.events_tx.clone();
        let period = self.config.tick_interval;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                interval.tick().await;
                if events.send(GenerationEvent::Tick).is_err() {
                    break;
                }
            }
        }));

        self.spawn_waiter();
    }

    /// Cancel the completion wait. What happens next depends on the
    /// configured [`CancelPolicy`].
    pub fn cancel_wait(&self) {
        self.cancel.notify_one();
    }

    /// Stop both timers. Progress stays where it is.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(waiter) = self.waiter.take() {
            waiter.abort();
        }
    }

    pub async fn next_event(&mut self) -> Option<GenerationEvent> {
        self.events_rx.recv().await
    }

    /// Apply one timer event. Returns the outcome once the run has ended.
    pub fn handle_event(&mut self, event: GenerationEvent) -> Option<GenerationOutcome> {
        match event {
            GenerationEvent::Tick => {
                // A tick can still be queued behind the completion
                if self.tracker.is_complete() || self.ticker.is_none() {
                    return None;
                }
                self.tracker.tick();
                self.publish();
                None
            }
            GenerationEvent::WaitElapsed => {
                // Queued before a stop
                if self.waiter.is_none() || !self.tracker.complete() {
                    return None;
                }
                self.stop();
                self.publish();
                info!("Generation finished");
                Some(GenerationOutcome::Completed)
            }
            GenerationEvent::WaitCancelled => {
                if self.waiter.is_none() || self.tracker.is_complete() {
                    return None;
                }
                match self.config.cancel_policy {
                    CancelPolicy::Retry => {
                        warn!("Generation wait cancelled, retrying");
                        self.waiter = None;
                        self.spawn_waiter();
                        None
                    }
                    CancelPolicy::Abort => {
                        warn!("Generation wait cancelled, aborting");
                        self.stop();
                        Some(GenerationOutcome::Aborted)
                    }
                }
            }
        }
    }

    /// Start (if needed) and drive events until the run ends.
    pub async fn run(&mut self) -> GenerationOutcome {
        self.start();
        if self.tracker.is_complete() {
            return GenerationOutcome::Completed;
        }

        while let Some(event) = self.events_rx.recv().await {
            if let Some(outcome) = self.handle_event(event) {
                return outcome;
            }
        }
        // We hold a sender, so the channel never closes while running
        GenerationOutcome::Aborted
    }

    fn spawn_waiter(&mut self) {
        let events = self.events_tx.clone();
        let cancel = self.cancel.clone();
        let wait = self.config.total_wait;
        self.waiter = Some(tokio::spawn(async move {
            let event = tokio::select! {
                _ = tokio::time::sleep(wait) => GenerationEvent::WaitElapsed,
                _ = cancel.notified() => GenerationEvent::WaitCancelled,
            };
            debug!("Completion timer fired: {:?}", event);
            let _ = events.send(event);
        }));
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.tracker.snapshot());
    }
}

impl Drop for ProgressSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}
