//! End-to-end scenario for `example-button--primary` against a fake Storybook.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{story, FakeStorybook};
use storyprobe::prelude::*;

#[tokio::test]
async fn test_button_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeStorybook::new();
    let client = fake.client(dir.path());
    let story = story();

    client.navigate(&story, ViewMode::Iframe).await.unwrap();

    let visual = VisualDiffEngine::new(client.clone());
    let first = visual.compare_screenshot(&story, "default", None).await.unwrap();
    assert_eq!(first.verdict, Verdict::BaselineCreated);
    let second = visual.compare_screenshot(&story, "default", None).await.unwrap();
    assert_eq!(second.verdict, Verdict::Pass);
    assert_eq!(second.mismatch_ratio, 0.0);

    let controls = ControlSynchronizer::new(client.clone());
    controls
        .set_control(&story, "label", "Updated Button")
        .await
        .unwrap();
    assert_eq!(
        controls.get_control(&story, "label").await.unwrap(),
        ControlValue::from("Updated Button")
    );

    let inspector = PropertyInspector::new(client.clone());
    inspector
        .verify_component_text("button", "Updated Button", true)
        .await
        .unwrap();

    let err = inspector
        .verify_width("button", 999.0, Some(5.0))
        .await
        .unwrap_err();
    match err {
        ProbeError::ToleranceExceeded {
            expected,
            actual,
            tolerance,
            ..
        } => {
            assert_eq!(expected, "999px");
            assert_eq!(actual, "120px");
            assert_eq!(tolerance, Some(5.0));
        }
        other => panic!("expected ToleranceExceeded, got {other:?}"),
    }

    inspector
        .verify_color("button", "#007bff", ColorKind::Background)
        .await
        .unwrap();
    inspector
        .verify_color("button", "rgb(0,123,255)", ColorKind::Background)
        .await
        .unwrap();

    // the label change shows up in the screenshot; the baseline stays
    let changed = visual.compare_screenshot(&story, "default", None).await.unwrap();
    assert_eq!(changed.verdict, Verdict::Fail);
    assert!(changed.assert_passed().is_err());
    let again = visual.compare_screenshot(&story, "default", None).await.unwrap();
    assert_eq!(again.verdict, Verdict::Fail);
}

#[tokio::test]
async fn test_reset_matches_fresh_instance() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeStorybook::new();
    let client = fake.client(dir.path());
    let story = story();
    let controls = ControlSynchronizer::new(client.clone());

    let fresh = controls.get_all_controls(&story).await.unwrap();

    let mut changes = storyprobe::ArgMap::new();
    changes.insert("label".into(), ControlValue::from("Changed"));
    changes.insert("primary".into(), ControlValue::from(false));
    changes.insert(
        "backgroundColor".into(),
        ControlValue::from(serde_json::json!({"light": "#fff", "dark": "#000"})),
    );
    controls.set_controls(&story, &changes).await.unwrap();
    assert_eq!(
        controls.get_control(&story, "backgroundColor").await.unwrap(),
        changes["backgroundColor"]
    );
    assert_ne!(controls.get_all_controls(&story).await.unwrap(), fresh);

    controls.reset_to_defaults(&story).await.unwrap();
    assert_eq!(controls.get_all_controls(&story).await.unwrap(), fresh);
}

#[tokio::test]
async fn test_controls_panel_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeStorybook::new().without_story_store();
    let client = fake.client(dir.path());
    let story = story();
    let controls = ControlSynchronizer::new(client.clone());

    controls.set_control(&story, "label", "Via Panel").await.unwrap();
    assert_eq!(
        controls.get_control(&story, "label").await.unwrap(),
        ControlValue::from("Via Panel")
    );
    controls.set_control(&story, "primary", false).await.unwrap();
    assert_eq!(fake.args()["primary"], false);

    let err = controls.set_control(&story, "ghost", 1).await.unwrap_err();
    assert!(matches!(err, ProbeError::ControlNotFound { ref control, .. } if control == "ghost"));
}

#[tokio::test]
async fn test_unknown_control_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeStorybook::new();
    let controls = ControlSynchronizer::new(fake.client(dir.path()));
    let err = controls
        .get_control(&story(), "doesNotExist")
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::ControlNotFound { .. }));
}

#[tokio::test]
async fn test_structural_snapshot_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeStorybook::new();
    let client = fake.client(dir.path());
    let story = story();
    let snapshots = StructuralSnapshotEngine::new(client.clone());

    let created = snapshots
        .assert_snapshot(&story, "default", true, false, true)
        .await
        .unwrap();
    assert_eq!(created.verdict, Verdict::BaselineCreated);
    let passed = snapshots
        .assert_snapshot(&story, "default", true, false, false)
        .await
        .unwrap();
    assert_eq!(passed.verdict, Verdict::Pass);

    ControlSynchronizer::new(client.clone())
        .set_control(&story, "size", "large")
        .await
        .unwrap();
    let err = snapshots
        .assert_snapshot(&story, "default", true, false, false)
        .await
        .unwrap_err();
    match err {
        ProbeError::StructuralDifference { paths, .. } => {
            assert_eq!(paths, vec!["div/button[0]@class"]);
        }
        other => panic!("expected StructuralDifference, got {other:?}"),
    }

    let baseline = storyprobe::load_snapshot(&created.baseline_path).unwrap();
    assert_eq!(baseline.children[0].text, "Button");
    assert!(!baseline.children[0].attributes.contains_key("id"));
}

#[tokio::test]
async fn test_deleted_baseline_is_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeStorybook::new();
    let visual = VisualDiffEngine::new(fake.client(dir.path()));
    let story = story();

    let created = visual.compare_screenshot(&story, "default", None).await.unwrap();
    std::fs::remove_file(&created.baseline_path).unwrap();
    let recreated = visual.compare_screenshot(&story, "default", None).await.unwrap();
    assert_eq!(recreated.verdict, Verdict::BaselineCreated);
    let passed = visual.compare_screenshot(&story, "default", None).await.unwrap();
    assert_eq!(passed.verdict, Verdict::Pass);
}
