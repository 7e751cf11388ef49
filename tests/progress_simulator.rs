mod support;

use std::time::Duration;

use tokio::time::{timeout, Instant};

use crate::support::tracing_init;
use musicai_lib::generation::{
    CancelPolicy, GenerationEvent, GenerationOutcome, GenerationRequest, ProgressSimulator,
    SimulatorConfig,
};

fn simulator(config: SimulatorConfig) -> ProgressSimulator {
    tracing_init();
    ProgressSimulator::new(GenerationRequest::new("lofi beats to study to"), config)
}

/// Handle whatever the timers have queued so far without advancing time.
async fn drain(sim: &mut ProgressSimulator) -> Vec<GenerationOutcome> {
    let mut outcomes = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::ZERO, sim.next_event()).await {
        if let Some(outcome) = sim.handle_event(event) {
            outcomes.push(outcome);
        }
    }
    outcomes
}

#[tokio::test(start_paused = true)]
async fn completes_after_the_total_wait_with_a_full_bar() {
    let mut sim = simulator(SimulatorConfig::default());
    let mut rx = sim.subscribe();
    let started = Instant::now();

    let outcome = sim.run().await;

    assert_eq!(outcome, GenerationOutcome::Completed);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(5000), "finished after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(5030), "finished after {:?}", elapsed);

    let state = *rx.borrow_and_update();
    assert_eq!(state.percent_complete, 100);
    assert!(state.is_complete);
    assert!(!sim.is_running());
}

#[tokio::test(start_paused = true)]
async fn ticks_after_completion_change_nothing() {
    let mut sim = simulator(SimulatorConfig::default());
    sim.run().await;

    assert_eq!(sim.handle_event(GenerationEvent::Tick), None);
    assert_eq!(sim.state().percent_complete, 100);

    // The completion signal fires only once
    assert_eq!(sim.handle_event(GenerationEvent::WaitElapsed), None);
    assert_eq!(sim.handle_event(GenerationEvent::WaitCancelled), None);
    assert!(sim.state().is_complete);

    // Nothing left running to send more events
    assert!(timeout(Duration::from_secs(1), sim.next_event()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn advances_half_a_percent_per_tick() {
    let mut sim = simulator(SimulatorConfig::default());
    sim.start();
    // Starting again must not double the tick rate
    sim.start();

    tokio::time::sleep(Duration::from_millis(305)).await;
    assert!(drain(&mut sim).await.is_empty());

    // Ten 30ms ticks at 0.5% each
    assert_eq!(sim.state().percent_complete, 5);
    assert!(!sim.state().is_complete);
    assert!((sim.fraction() - 0.05).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn completion_does_not_depend_on_tick_cadence() {
    let config = SimulatorConfig {
        tick_interval: Duration::from_millis(700),
        ..SimulatorConfig::default()
    };
    let mut sim = simulator(config);
    let started = Instant::now();

    assert_eq!(sim.run().await, GenerationOutcome::Completed);
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_millis(5100));
    assert_eq!(sim.state().percent_complete, 100);
}

#[tokio::test(start_paused = true)]
async fn cancelled_wait_aborts_under_abort_policy() {
    let mut sim = simulator(SimulatorConfig {
        cancel_policy: CancelPolicy::Abort,
        ..SimulatorConfig::default()
    });
    sim.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    sim.cancel_wait();

    assert_eq!(sim.run().await, GenerationOutcome::Aborted);
    assert!(!sim.state().is_complete);
    assert!(sim.state().percent_complete < 100);
    assert!(!sim.is_running());
}

#[tokio::test(start_paused = true)]
async fn cancelled_wait_restarts_under_retry_policy() {
    let mut sim = simulator(SimulatorConfig {
        total_wait: Duration::from_secs(1),
        cancel_policy: CancelPolicy::Retry,
        ..SimulatorConfig::default()
    });
    let started = Instant::now();
    sim.start();
    tokio::time::sleep(Duration::from_millis(400)).await;
    sim.cancel_wait();

    assert_eq!(sim.run().await, GenerationOutcome::Completed);
    assert!(
        started.elapsed() >= Duration::from_millis(1400),
        "completed after {:?}",
        started.elapsed()
    );
    assert_eq!(sim.state().percent_complete, 100);
}

#[tokio::test(start_paused = true)]
async fn stop_tears_down_both_timers() {
    let mut sim = simulator(SimulatorConfig::default());
    sim.start();
    assert!(sim.is_running());

    sim.stop();
    assert!(!sim.is_running());

    tokio::time::sleep(Duration::from_secs(6)).await;
    drain(&mut sim).await;
    assert!(!sim.state().is_complete);
    assert_eq!(sim.state().percent_complete, 0);
}

#[tokio::test(start_paused = true)]
async fn completion_queued_before_stop_is_dropped() {
    let mut sim = simulator(SimulatorConfig::default());
    sim.start();

    // The completion timer has fired but nobody has handled it yet
    tokio::time::sleep(Duration::from_millis(5001)).await;
    sim.stop();

    assert!(drain(&mut sim).await.is_empty());
    assert!(!sim.state().is_complete);
    assert!(sim.state().percent_complete < 100);
}

#[tokio::test(start_paused = true)]
async fn cancellation_queued_before_stop_is_dropped() {
    let mut sim = simulator(SimulatorConfig {
        cancel_policy: CancelPolicy::Retry,
        ..SimulatorConfig::default()
    });
    sim.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    sim.cancel_wait();
    tokio::time::sleep(Duration::from_millis(1)).await;
    sim.stop();

    assert!(drain(&mut sim).await.is_empty());
    // A retry would have restarted the wait
    assert!(!sim.is_running());
}

#[test]
fn request_defaults_to_pop() {
    let request = GenerationRequest::new("sunrise synthwave");
    assert_eq!(request.prompt, "sunrise synthwave");
    assert_eq!(request.genre, "pop");
    assert_eq!(request.with_genre("ambient").genre, "ambient");
}
