//! Integration tests for touch manipulation of the placed model.

use approx::assert_relative_eq;
use glam::{Vec2, Vec3};

use ar_placement_lib::gesture::{PointerEvent, PointerPhase};
use ar_placement_lib::harness::TestHarness;
use ar_placement_lib::{ActionOutcome, IgnoreReason};

fn placed() -> TestHarness {
    let mut h = TestHarness::new();
    h.start_session().unwrap();
    h.load_model("house1").unwrap();
    h.place_at(Vec3::new(1.0, 0.0, -2.0));
    h
}

#[test]
fn test_pinch_scenario() {
    let mut h = placed();
    assert_relative_eq!(h.orchestrator.gestures().base_scale().unwrap(), 0.25);

    h.pointer(1, PointerPhase::Down, 100.0, 300.0);
    h.pointer(2, PointerPhase::Down, 200.0, 300.0);
    assert!(h.pointer(2, PointerPhase::Move, 250.0, 300.0).is_applied());

    assert_relative_eq!(h.active_scale().unwrap(), 0.375, epsilon = 1e-6);
    let (min, max) = h.orchestrator.gestures().scale_bounds().unwrap();
    assert_relative_eq!(min, 0.025, epsilon = 1e-6);
    assert_relative_eq!(max, 2.5, epsilon = 1e-6);
}

#[test]
fn test_extreme_pinch_stays_within_bounds() {
    let mut h = placed();
    h.pointer(1, PointerPhase::Down, 0.0, 0.0);
    h.pointer(2, PointerPhase::Down, 10.0, 0.0);

    for step in 1..40 {
        h.pointer(2, PointerPhase::Move, 10.0 * 2f32.powi(step.min(20)), 0.0);
        let s = h.active_scale().unwrap();
        assert!((0.025 - 1e-6..=2.5 + 1e-6).contains(&s), "scale {s} escaped");
    }
    assert_relative_eq!(h.active_scale().unwrap(), 2.5, epsilon = 1e-5);

    for step in 1..40 {
        h.pointer(2, PointerPhase::Move, 10.0 / 2f32.powi(step.min(20)), 0.0);
        let s = h.active_scale().unwrap();
        assert!((0.025 - 1e-6..=2.5 + 1e-6).contains(&s), "scale {s} escaped");
    }
    assert_relative_eq!(h.active_scale().unwrap(), 0.025, epsilon = 1e-5);
}

#[test]
fn test_twist_wraps_across_180() {
    let mut h = placed();
    // fingers at 170 degrees
    let a = Vec2::new(0.0, 0.0);
    let b170 = Vec2::new(170f32.to_radians().cos(), 170f32.to_radians().sin()) * 100.0;
    let b_190 = Vec2::new((-170f32).to_radians().cos(), (-170f32).to_radians().sin()) * 100.0;

    h.pointer(1, PointerPhase::Down, a.x, a.y);
    h.pointer(2, PointerPhase::Down, b170.x, b170.y);
    h.pointer(2, PointerPhase::Move, b_190.x, b_190.y);

    // a 20 degree turn, not 340
    assert_relative_eq!(h.active_rotation().unwrap().y.abs(), 20.0, epsilon = 1e-3);
}

#[test]
fn test_two_to_one_finger_reanchors() {
    let mut h = placed();
    h.pointer(1, PointerPhase::Down, 100.0, 100.0);
    h.pointer(2, PointerPhase::Down, 300.0, 100.0);
    h.pointer(2, PointerPhase::Up, 300.0, 100.0);

    // rotation resumes from pointer 1's own position, not the two-finger midpoint
    h.pointer(1, PointerPhase::Move, 150.0, 100.0);
    assert_relative_eq!(h.active_rotation().unwrap().y, 25.0);
    h.pointer(1, PointerPhase::Move, 170.0, 100.0);
    assert_relative_eq!(h.active_rotation().unwrap().y, 35.0);
}

#[test]
fn test_touches_on_ui_are_ignored() {
    let mut h = placed();
    let down = PointerEvent::new(1, PointerPhase::Down, Vec2::new(10.0, 10.0))
        .on_element(&["icon", "button", "gallery"]);
    h.send_pointer(down);
    assert_eq!(
        h.pointer(1, PointerPhase::Move, 200.0, 10.0),
        ActionOutcome::Ignored(IgnoreReason::NoGesture)
    );
    assert_relative_eq!(h.active_rotation().unwrap().y, 0.0);
}

#[test]
fn test_no_gestures_before_placement() {
    let mut h = TestHarness::new();
    h.start_session().unwrap();
    h.load_model("house1").unwrap();
    h.pointer(1, PointerPhase::Down, 0.0, 0.0);
    assert_eq!(
        h.pointer(1, PointerPhase::Move, 50.0, 0.0),
        ActionOutcome::Ignored(IgnoreReason::NoGesture)
    );
}

#[test]
fn test_gestures_follow_the_switched_model() {
    let mut h = placed();
    let first = h.orchestrator.gestures().target().unwrap();
    h.load_model("house2").unwrap();
    let second = h.orchestrator.gestures().target().unwrap();
    assert_ne!(first, second);
    assert_eq!(Some(second), h.orchestrator.active_entity());
}
