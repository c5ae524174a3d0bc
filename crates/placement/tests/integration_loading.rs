//! Integration tests for loading, caching, cancellation and load failures.

use approx::assert_relative_eq;
use glam::Vec3;

use ar_placement_lib::fixtures::FakeAsset;
use ar_placement_lib::harness::TestHarness;
use ar_placement_lib::loader::LoadStage;
use ar_placement_lib::platform::FetchFailure;
use ar_placement_lib::state::PlacementPhase;
use ar_placement_lib::ui::{NoticeLevel, ProgressDisplay};
use ar_placement_lib::{ActionOutcome, IgnoreReason};

fn session() -> TestHarness {
    let mut h = TestHarness::new();
    h.start_session().unwrap();
    h
}

#[test]
fn test_cached_model_is_not_fetched_again() {
    let mut h = session();
    h.load_model("house1").unwrap();
    h.load_model("house2").unwrap();
    assert_eq!(h.fetch_count(), 2);

    h.select("house1").unwrap();
    assert_eq!(h.fetch_count(), 2);
    assert!(!h.state().is_model_loading);
    assert_eq!(h.phase(), PlacementPhase::AwaitingPlacement);
}

#[test]
fn test_loading_locks_ui_and_ignores_actions() {
    let mut h = session();
    h.load_model("house1").unwrap();
    h.place_at(Vec3::ZERO);

    assert!(h.select("house2").unwrap().is_applied());
    assert_eq!(h.phase(), PlacementPhase::Loading);
    let ui = h.ui_record();
    assert!(!ui.controls_enabled);
    assert_eq!(ui.loading.as_deref(), Some("house2"));

    assert_eq!(
        h.select("cabin").unwrap(),
        ActionOutcome::Ignored(IgnoreReason::Loading)
    );
    assert_eq!(h.reload(), ActionOutcome::Ignored(IgnoreReason::Loading));
    assert_eq!(h.clear(false), ActionOutcome::Ignored(IgnoreReason::Loading));
    assert_eq!(h.tap(), ActionOutcome::Ignored(IgnoreReason::Loading));
    assert_eq!(h.fetch_count(), 2);
    assert_eq!(h.visible_model_count(), 0);
}

#[test]
fn test_pending_switch_in_place_applies_on_ready() {
    let mut h = session();
    h.load_model("house1").unwrap();
    h.place_at(Vec3::new(2.0, 0.1, 0.0));

    h.select("cabin").unwrap();
    let pending = h.state().pending_switch_in_place.clone().unwrap();
    assert_eq!(pending.model_id, "cabin");
    assert_eq!(pending.hit_position, Vec3::new(2.0, 0.1, 0.0));
    assert!(h.state().active_model_id.is_none());

    h.finish_load();
    assert_eq!(h.phase(), PlacementPhase::Placed);
    assert!(h.state().pending_switch_in_place.is_none());
    // cabin sits on its origin: floor offset 0
    let pos = h.active_position().unwrap();
    assert_relative_eq!(pos.y, 0.1, epsilon = 1e-5);
    assert!(h.ui_record().controls_enabled);
    assert!(h.ui_record().loading.is_none());
    assert_eq!(h.ui_record().active_model.as_deref(), Some("cabin"));
}

#[test]
fn test_progress_known_and_unknown_size() {
    let mut h = session();
    h.select("house1").unwrap();
    h.fetch_progress(250, Some(1000));
    h.fetch_progress(3 * 1024 * 1024, None);

    let progress = h.ui_record().progress;
    assert_eq!(progress[0], ProgressDisplay::Stage(LoadStage::Starting));
    assert_eq!(progress[1], ProgressDisplay::Percent(25));
    assert_eq!(progress[2], ProgressDisplay::Stage(LoadStage::DownloadingLarge));
}

#[test]
fn test_cancel_restores_placed_model_exactly() {
    let mut h = session();
    h.load_model("house1").unwrap();
    h.place_at(Vec3::new(1.0, 0.0, -2.0));
    // user edits the placed model
    h.pointer(1, ar_placement_lib::gesture::PointerPhase::Down, 0.0, 0.0);
    h.pointer(1, ar_placement_lib::gesture::PointerPhase::Move, 40.0, 0.0);
    h.pointer(1, ar_placement_lib::gesture::PointerPhase::Up, 40.0, 0.0);

    let position = h.active_position().unwrap();
    let rotation = h.active_rotation().unwrap();
    let scale = h.active_scale().unwrap();

    h.select("house2").unwrap();
    h.complete_fetch();
    assert!(h.cancel().is_applied());

    assert_eq!(h.phase(), PlacementPhase::Placed);
    assert!(h.state().model_is_placed);
    assert_eq!(h.state().active_model_id.as_deref(), Some("house1"));
    assert!(h.active_visible());
    assert_eq!(h.active_position().unwrap(), position);
    assert_eq!(h.active_rotation().unwrap(), rotation);
    assert_relative_eq!(h.active_scale().unwrap(), scale);
    assert_relative_eq!(rotation.y, 20.0);

    // the partial house2 entry and entity are gone
    assert!(!h.orchestrator.loader().cache().contains("house2"));
    assert_eq!(h.scene.entity_count(), 1);
    assert!(h.ui_record().controls_enabled);
    assert!(h.orchestrator.gestures().target().is_some());
}

#[test]
fn test_cancel_without_prior_model_goes_idle() {
    let mut h = session();
    h.select("house1").unwrap();
    assert!(h.cancel().is_applied());
    assert_eq!(h.phase(), PlacementPhase::Idle);
    assert!(h.state().active_model_id.is_none());
    assert!(!h.state().is_model_loading);
    assert!(h.fetcher.last_request().unwrap().cancel.is_cancelled());
    let notice = h.ui.last_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
}

#[test]
fn test_cancel_only_valid_while_loading() {
    let mut h = session();
    assert_eq!(h.cancel(), ActionOutcome::Ignored(IgnoreReason::NotLoading));
}

#[test]
fn test_late_completion_after_cancel_is_discarded() {
    let mut h = session();
    h.select("house1").unwrap();
    h.cancel();

    assert_eq!(
        h.complete_fetch(),
        Some(ActionOutcome::Ignored(IgnoreReason::StaleLoad))
    );
    h.finish_parsing();
    h.frame();
    assert_eq!(h.scene.entity_count(), 0);
    assert_eq!(h.phase(), PlacementPhase::Idle);
    // a cancellation is never reported as a failure
    assert!(h
        .ui_record()
        .notices
        .iter()
        .all(|n| n.level != NoticeLevel::Error));
}

#[test]
fn test_cancel_after_parse_started_removes_entity() {
    let mut h = session();
    h.select("house1").unwrap();
    h.complete_fetch();
    assert_eq!(h.scene.entity_count(), 1);
    h.cancel();
    assert_eq!(h.scene.entity_count(), 0);
    assert!(h.finish_parsing().is_empty());
}

#[test]
fn test_fetch_failure_falls_back_to_previous_model() {
    let mut h = session();
    h.load_model("house1").unwrap();
    h.place_at(Vec3::ZERO);

    h.select("house2").unwrap();
    h.fail_fetch(FetchFailure::Http(404));

    assert!(!h.state().is_model_loading);
    assert_eq!(h.phase(), PlacementPhase::AwaitingPlacement);
    assert_eq!(h.state().active_model_id.as_deref(), Some("house1"));
    assert!(!h.orchestrator.loader().cache().contains("house2"));
    assert!(h.ui_record().controls_enabled);
    let notice = h.ui.last_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("download"));

    // the tap that dismissed the error must not place
    h.set_hit(Some(Vec3::ZERO));
    h.frame();
    assert!(!h.tap().is_applied());
    h.wait_out_suppression();
    assert!(h.tap().is_applied());
}

#[test]
fn test_abort_not_requested_by_user_unlocks_controls() {
    let mut h = session();
    h.load_model("house1").unwrap();
    h.place_at(Vec3::ZERO);

    h.select("house2").unwrap();
    assert_eq!(h.fail_fetch(FetchFailure::Cancelled), Some(ActionOutcome::Applied));

    assert!(!h.state().is_model_loading);
    assert_eq!(h.phase(), PlacementPhase::AwaitingPlacement);
    assert!(h.ui_record().controls_enabled);
    assert_eq!(h.ui.last_notice().unwrap().level, NoticeLevel::Error);
    assert!(h.select("cabin").unwrap().is_applied());
    assert_eq!(h.phase(), PlacementPhase::Loading);
}

#[test]
fn test_parse_failure_without_previous_model_goes_idle() {
    let mut h = session();
    h.register_asset("models/house1.glb", FakeAsset::corrupt("bad glTF header"));
    h.select("house1").unwrap();
    h.complete_fetch();
    h.finish_parsing();

    assert_eq!(h.phase(), PlacementPhase::Idle);
    assert!(!h.orchestrator.loader().cache().contains("house1"));
    assert_eq!(h.scene.entity_count(), 0);
    let notice = h.ui.last_notice().unwrap();
    assert!(notice.message.contains("corrupted"));

    // retry after fixing the asset refetches
    h.register_asset("models/house1.glb", FakeAsset::default());
    h.load_model("house1").unwrap();
    assert_eq!(h.fetch_count(), 2);
    assert_eq!(h.phase(), PlacementPhase::AwaitingPlacement);
}

#[test]
fn test_end_session_cancels_load() {
    let mut h = session();
    h.select("house1").unwrap();
    h.end_session();
    assert!(!h.state().is_model_loading);
    assert!(h.fetcher.last_request().unwrap().cancel.is_cancelled());
    assert!(h.ui_record().loading.is_none());
    assert!(h.ui_record().controls_enabled);
}
