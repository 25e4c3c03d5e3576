use super::*;

fn config(gesture_probability: f64) -> SimulationConfig {
    SimulationConfig {
        poll_interval: Duration::from_millis(100),
        fps: 26.0..32.0,
        confidence: 0.90..1.0,
        gesture_probability,
        seed: Some(7),
    }
}

#[test]
fn telemetry_stays_within_configured_ranges() {
    let (mut source, _rx) = SimulationSource::new(config(0.06), EventMapper::standard());
    for _ in 0..500 {
        let events = source.tick();
        let NormalizedEvent::Telemetry(telemetry) = &events[0] else {
            panic!("first event of a tick must be telemetry");
        };
        assert!((26.0..32.0).contains(&telemetry.fps));
        assert!((0.90..1.0).contains(&telemetry.confidence));
        assert_eq!(telemetry.gesture_total, source.gesture_total());
    }
}

#[test]
fn displayed_values_never_reach_the_exclusive_range_end() {
    let (mut source, _rx) = SimulationSource::new(config(0.0), EventMapper::standard());
    let mut max_fps = 0;
    let mut max_percent = 0;
    for _ in 0..2000 {
        let events = source.tick();
        let NormalizedEvent::Telemetry(telemetry) = &events[0] else {
            panic!("first event of a tick must be telemetry");
        };
        assert_eq!(telemetry.fps.fract(), 0.0);
        assert!((26..=31).contains(&telemetry.rounded_fps()));
        assert!((90..=99).contains(&telemetry.confidence_percent()));
        max_fps = max_fps.max(telemetry.rounded_fps());
        max_percent = max_percent.max(telemetry.confidence_percent());
    }
    assert_eq!(max_fps, 31);
    assert_eq!(max_percent, 99);
}

#[test]
fn simulated_gestures_always_map_to_a_slot() {
    let mapper = EventMapper::standard();
    let (mut source, _rx) = SimulationSource::new(config(1.0), mapper.clone());
    let mut seen = std::collections::HashSet::new();
    for _ in 0..400 {
        let events = source.tick();
        assert_eq!(events.len(), 2);
        let NormalizedEvent::GestureCommand { command, .. } = &events[1] else {
            panic!("second event must be a gesture command");
        };
        seen.insert(mapper.map(command).expect("simulated command maps"));
    }
    assert_eq!(seen.len(), mapper.slot_count());
    assert_eq!(source.gesture_total(), 400);
}

#[test]
fn zero_probability_never_emits_gestures() {
    let (mut source, _rx) = SimulationSource::new(config(0.0), EventMapper::standard());
    for _ in 0..200 {
        assert_eq!(source.tick().len(), 1);
    }
    assert_eq!(source.gesture_total(), 0);
}

#[test]
fn same_seed_replays_the_same_sequence() {
    let (mut a, _rx_a) = SimulationSource::new(config(0.3), EventMapper::standard());
    let (mut b, _rx_b) = SimulationSource::new(config(0.3), EventMapper::standard());
    for _ in 0..50 {
        let left: Vec<_> = a.tick().into_iter().map(strip_timestamp).collect();
        let right: Vec<_> = b.tick().into_iter().map(strip_timestamp).collect();
        assert_eq!(left, right);
    }
}

fn strip_timestamp(event: NormalizedEvent) -> String {
    match event {
        NormalizedEvent::Telemetry(t) => format!("{t:?}"),
        NormalizedEvent::GestureCommand { command, .. } => command,
    }
}

#[tokio::test(start_paused = true)]
async fn ticks_on_the_poll_interval_until_stopped() {
    let (mut source, mut rx) = SimulationSource::new(config(0.0), EventMapper::standard());
    let started = tokio::time::Instant::now();
    source.start();
    source.start();

    let mut emitted = 0;
    for _ in 0..5 {
        let input = rx.recv().await.expect("tick");
        emitted += source.handle(input).len();
    }
    assert_eq!(emitted, 5);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(600));

    source.stop();
    assert!(!source.is_running());
    let next = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    assert!(next.is_err(), "no tick may fire after stop");
}

#[tokio::test(start_paused = true)]
async fn ticks_queued_before_stop_are_discarded() {
    let (mut source, mut rx) = SimulationSource::new(config(0.0), EventMapper::standard());
    source.start();
    let queued = rx.recv().await.expect("tick");

    source.stop();
    assert!(source.handle(queued).is_empty());

    source.start();
    assert!(source.handle(queued).is_empty(), "old generation after restart");
    let fresh = rx.recv().await.expect("tick");
    assert_eq!(source.handle(fresh).len(), 1);
}

#[test]
fn reset_clears_counters() {
    let (mut source, _rx) = SimulationSource::new(config(1.0), EventMapper::standard());
    source.tick();
    source.tick();
    assert_eq!(source.gesture_total(), 2);
    source.reset();
    assert_eq!(source.gesture_total(), 0);
    assert!(!source.is_running());
}
