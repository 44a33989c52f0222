use findspot::agent::{run_control_loop, ControlChannel, Profiler, TargetControl};
use findspot::domain::{CollectionMode, FreezeState};
use findspot::host::{SimulatedTarget, SimulationConfig};
use findspot::store::RoutineRecord;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn target(threads: usize) -> (Arc<SimulatedTarget>, Arc<Profiler>) {
    let target = Arc::new(SimulatedTarget::new(SimulationConfig {
        threads,
        tick: Duration::from_millis(1),
        freeze_timeout: Duration::from_secs(5),
    }));
    let profiler = Arc::new(Profiler::new(target.clone()));
    (target, profiler)
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

fn hits(records: &[RoutineRecord], name: &str) -> u64 {
    records.iter().find(|r| r.name == name).map_or(0, |r| r.hit_count)
}

#[test]
fn test_counts_stable_while_frozen() {
    let (target, profiler) = target(4);
    profiler.set_mode(CollectionMode::Collect);
    target.start(&profiler).unwrap();
    wait_until("first hits", || !profiler.snapshot().is_empty());

    assert!(profiler.freeze().freeze_all());
    let frozen = profiler.snapshot();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(profiler.snapshot(), frozen);

    profiler.freeze().resume_all();
    wait_until("progress after resume", || profiler.snapshot() != frozen);
    target.shutdown();
}

#[test]
fn test_starts_frozen_when_frozen_before_start() {
    let (target, profiler) = target(2);
    profiler.set_mode(CollectionMode::Collect);
    assert!(profiler.freeze().freeze_all());
    target.start(&profiler).unwrap();

    thread::sleep(Duration::from_millis(50));
    assert!(profiler.snapshot().is_empty());
    assert_eq!(target.iterations(), 0);

    profiler.freeze().resume_all();
    wait_until("hits after unfreeze", || !profiler.snapshot().is_empty());
    target.shutdown();
}

#[test]
fn test_trim_then_collect_counts_only_new_hits() {
    let (target, profiler) = target(2);
    profiler.set_mode(CollectionMode::Collect);
    target.start(&profiler).unwrap();
    wait_until("background hits", || target.iterations() > 100);

    assert!(profiler.freeze().freeze_all());
    let r0_before = hits(&profiler.snapshot(), "r0");
    profiler.set_mode(CollectionMode::Trim);
    let passes = target.iterations();
    profiler.freeze().resume_all();
    wait_until("trim passes", || target.iterations() > passes + 50);

    // Everything that keeps firing gets trimmed to zero
    assert!(profiler.freeze().freeze_all());
    let trimmed = profiler.snapshot();
    assert_eq!(hits(&trimmed, "r0"), 0, "r0 survived trim: {trimmed:?}");
    assert_eq!(hits(&trimmed, "r3"), 0);

    profiler.set_mode(CollectionMode::Collect);
    let window_start = target.iterations();
    profiler.freeze().resume_all();
    wait_until("collect window", || target.iterations() > window_start + 10);

    assert!(profiler.freeze().freeze_all());
    profiler.set_mode(CollectionMode::Off);
    let window = target.iterations() - window_start;
    let collected = profiler.snapshot();
    profiler.freeze().resume_all();
    target.shutdown();

    // Counting restarted at zero: at most one r0 call per finished iteration,
    // plus one per worker parked mid-iteration
    let r0 = hits(&collected, "r0");
    assert!(r0 >= 1, "{collected:?}");
    assert!(r0 <= window + 2, "r0={r0} over a {window}-iteration window");
    assert!(r0 < r0_before, "r0={r0} before trim={r0_before}");
    assert!(hits(&collected, "r3") >= r0);
}

#[test]
fn test_blacklist_before_discovery() {
    let (target, profiler) = target(1);
    profiler.filter_mut().add(findspot::domain::ListKind::Blacklist, "libc.so.6");
    profiler.set_mode(CollectionMode::Collect);
    target.start(&profiler).unwrap();

    wait_until("iterations", || target.iterations() > 20);
    target.shutdown();

    let records = profiler.snapshot();
    assert!(records.iter().all(|r| r.module == "example-1"), "{records:?}");
    assert_eq!(profiler.store().len(), 7);
}

#[test]
fn test_control_loop_against_simulated_target() {
    let (target, profiler) = target(2);
    target.start(&profiler).unwrap();

    // A closed stream: the loop gives up after its retry budget
    let mut channel = ControlChannel::new(std::io::Cursor::new(Vec::new()));
    assert!(profiler.freeze().freeze_all());
    run_control_loop(&mut channel, &profiler);

    assert_eq!(profiler.freeze().state(), FreezeState::Running);
    let before = target.iterations();
    wait_until("workers resumed", || target.iterations() > before);
    target.shutdown();
    assert!(target.freeze_all());
}
