use super::*;

#[test]
fn fresh_gate_admits_immediately() {
    let gate = Admission::default();
    let now = Instant::now();
    assert_eq!(gate.cooldown(), DEFAULT_COOLDOWN);
    assert!(gate.check_at(now).is_ok());
    assert_eq!(gate.remaining_at(now), Duration::ZERO);
}

#[test]
fn second_placement_inside_cooldown_is_refused() {
    let mut gate = Admission::new(Duration::from_secs(3));
    let start = Instant::now();
    gate.start_at(start);

    let err = gate.check_at(start + Duration::from_secs(1)).expect_err("cooling");
    assert_eq!(err.remaining, Duration::from_secs(2));
}

#[test]
fn placement_admitted_once_cooldown_elapses() {
    let mut gate = Admission::new(Duration::from_secs(3));
    let start = Instant::now();
    gate.start_at(start);

    assert!(gate.check_at(start + Duration::from_millis(2999)).is_err());
    assert!(gate.check_at(start + Duration::from_secs(3)).is_ok());
    assert!(gate.check_at(start + Duration::from_secs(60)).is_ok());
}

#[test]
fn restart_extends_from_new_placement() {
    let mut gate = Admission::new(Duration::from_secs(3));
    let start = Instant::now();
    gate.start_at(start);
    gate.start_at(start + Duration::from_secs(3));
    assert_eq!(gate.remaining_at(start + Duration::from_secs(4)), Duration::from_secs(2));
}

#[test]
fn display_seconds_round_up() {
    let mut gate = Admission::new(Duration::from_secs(3));
    let start = Instant::now();
    gate.start_at(start);
    assert_eq!(gate.remaining_secs_at(start), 3);
    assert_eq!(gate.remaining_secs_at(start + Duration::from_millis(100)), 3);
    assert_eq!(gate.remaining_secs_at(start + Duration::from_millis(2100)), 1);
    assert_eq!(gate.remaining_secs_at(start + Duration::from_secs(5)), 0);
}

#[test]
fn zero_cooldown_never_blocks() {
    let mut gate = Admission::new(Duration::ZERO);
    let now = Instant::now();
    gate.start_at(now);
    assert!(gate.check_at(now).is_ok());
}

#[test]
fn resume_counts_down_from_an_earlier_placement() {
    let mut gate = Admission::new(Duration::from_secs(3));
    let now = Instant::now();
    gate.resume_at(Duration::from_secs(1), now);
    assert_eq!(gate.remaining_at(now), Duration::from_secs(2));

    let mut stale = Admission::new(Duration::from_secs(3));
    stale.resume_at(Duration::from_secs(10), now);
    assert!(stale.check_at(now).is_ok());
}
