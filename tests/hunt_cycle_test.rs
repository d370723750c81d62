//! End-to-end hunt lifecycle with scripted capture and input

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    init_logging, shiny, sprite, sprite_rect, wait_for_event, wait_until, RecordingActuator,
    ScriptedSource,
};
use shiny_hunter::{
    ActionKind, DiskEvidenceStore, FaultKind, HuntConfig, HuntEvent, HuntSnapshot, Hunter,
    HunterError, KeyBindings, LogicalAction, ReferenceImage, Region, RunStatus, StillFrameSource, StopReason,
    TimelineAction, TimelineConfig,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_timeline() -> TimelineConfig {
    TimelineConfig::new()
        .with_retry(0, 0.5)
        .with_action(TimelineAction::new(ActionKind::QuickLoad, 0.0, "F1"))
        .with_action(TimelineAction::new(ActionKind::Confirm, 0.0, "A"))
        .with_action(TimelineAction::new(ActionKind::Analysis, 0.02, "Look"))
}

fn hunter_with(source: ScriptedSource, actuator: RecordingActuator, timeline: TimelineConfig) -> Hunter {
    init_logging();
    let mut hunter = Hunter::new(source, actuator);
    hunter.set_timeline(timeline).unwrap();
    hunter
        .add_region(Region::new("sprite", sprite_rect()).unwrap())
        .unwrap();
    hunter
        .add_reference(ReferenceImage::new("normal", sprite()).unwrap())
        .unwrap();
    hunter
}

fn is_stopped(event: &HuntEvent) -> bool {
    matches!(event, HuntEvent::Stopped { .. })
}

#[test]
fn test_passing_rounds_accumulate_count() {
    let actuator = RecordingActuator::new();
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        actuator.clone(),
        fast_timeline(),
    );
    let events = hunter.subscribe();

    hunter.start().unwrap();
    assert_eq!(events.recv_timeout(TIMEOUT).unwrap(), HuntEvent::Started);
    assert!(wait_until(TIMEOUT, || hunter.hunt_count() >= 3));

    hunter.stop();
    assert_eq!(hunter.status(), RunStatus::Stopped);

    let actions = actuator.actions();
    assert_eq!(&actions[..2], &[LogicalAction::QuickLoad, LogicalAction::Confirm]);
    let presses = actuator.presses();
    assert_eq!(presses[0].key, "F1");
    assert_eq!(presses[1].key, "X");

    let final_event = wait_for_event(&events, TIMEOUT, is_stopped).unwrap();
    match final_event {
        HuntEvent::Stopped { final_count, reason } => {
            assert_eq!(reason, StopReason::Requested);
            assert_eq!(final_count, hunter.hunt_count());
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_progress_events_carry_delta() {
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        fast_timeline(),
    );
    let events = hunter.subscribe();
    hunter.start().unwrap();

    let progress = wait_for_event(&events, TIMEOUT, |e| matches!(e, HuntEvent::Progress { .. }));
    hunter.stop();

    match progress {
        Some(HuntEvent::Progress { hunt_count, delta, .. }) => {
            assert_eq!(delta, 1);
            assert_eq!(hunt_count, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_detection_halts_for_adjudication() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskEvidenceStore::new(dir.path()).unwrap());
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite(), sprite(), shiny()]),
        RecordingActuator::new(),
        fast_timeline(),
    )
    .with_evidence_store(store);
    let events = hunter.subscribe();

    hunter.start().unwrap();
    let stopped = wait_for_event(&events, TIMEOUT, is_stopped).unwrap();
    assert_eq!(
        stopped,
        HuntEvent::Stopped {
            final_count: 2,
            reason: StopReason::Detection
        }
    );
    assert_eq!(hunter.status(), RunStatus::Idle);

    let outcome = hunter.last_outcome().unwrap();
    assert!(outcome.is_detection());
    assert_eq!(outcome.failed_image_paths.len(), 1);
    assert!(outcome.failed_image_paths[0].1.exists());

    // operator rules it a false positive
    assert!(hunter.record_false_positives(2).is_err());
    assert_eq!(hunter.record_false_positives(1).unwrap(), 3);
    assert_eq!(hunter.hunt_count(), 3);
    assert!(hunter.record_false_positives(1).is_err());

    let adjustments = hunter.adjustments();
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].added, 1);
    assert_eq!(adjustments[0].hunt_count_after, 3);
    assert!(wait_for_event(&events, TIMEOUT, |e| matches!(
        e,
        HuntEvent::CountAdjusted { added: 1, hunt_count: 3 }
    ))
    .is_some());

    // the halt left the hunter idle, so the counter may be reset
    hunter.reset_counter().unwrap();
    assert_eq!(hunter.hunt_count(), 0);
}

#[test]
fn test_bound_keys_reach_the_actuator() {
    let actuator = RecordingActuator::new();
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        actuator.clone(),
        fast_timeline(),
    );
    hunter
        .set_key_bindings(KeyBindings {
            quick_load: "F5".to_string(),
            confirm: "Z".to_string(),
            hold_secs: 0.25,
            ..KeyBindings::default()
        })
        .unwrap();

    hunter.start().unwrap();
    assert!(wait_until(TIMEOUT, || actuator.presses().len() >= 2));
    hunter.stop();

    let presses = actuator.presses();
    assert_eq!(presses[0].action, LogicalAction::QuickLoad);
    assert_eq!(presses[0].key, "F5");
    assert_eq!(presses[1].action, LogicalAction::Confirm);
    assert_eq!(presses[1].key, "Z");
    assert!(presses
        .iter()
        .all(|p| p.hold == Duration::from_millis(250)));
}

#[test]
fn test_profile_keys_reach_the_actuator() {
    let actuator = RecordingActuator::new();
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        actuator.clone(),
        fast_timeline(),
    );
    let mut config = hunter.config();
    config.keys = toml::from_str("confirm = \"C\"\nhold_secs = 0.05").unwrap();
    hunter.apply_config(config).unwrap();

    hunter.start().unwrap();
    assert!(wait_until(TIMEOUT, || actuator.presses().len() >= 2));
    hunter.stop();

    let confirm = actuator
        .presses()
        .into_iter()
        .find(|p| p.action == LogicalAction::Confirm)
        .unwrap();
    assert_eq!(confirm.key, "C");
    assert_eq!(confirm.hold, Duration::from_millis(50));
}

#[test]
fn test_stop_is_prompt_during_long_wait() {
    let timeline = TimelineConfig::new()
        .with_action(TimelineAction::new(ActionKind::CustomDelay, 30.0, "Long wait"))
        .with_action(TimelineAction::new(ActionKind::Analysis, 0.0, ""));
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        timeline,
    );

    hunter.start().unwrap();
    std::thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    hunter.stop();
    assert!(start.elapsed() <= Duration::from_millis(200));
    assert_eq!(hunter.status(), RunStatus::Stopped);
    assert_eq!(hunter.hunt_count(), 0);
}

#[test]
fn test_pause_and_resume_keep_count() {
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        fast_timeline(),
    );
    let events = hunter.subscribe();

    hunter.start().unwrap();
    assert!(wait_until(TIMEOUT, || hunter.hunt_count() >= 2));

    hunter.pause().unwrap();
    assert!(wait_until(TIMEOUT, || hunter.status() == RunStatus::Paused));
    let paused_at = hunter.hunt_count();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(hunter.hunt_count(), paused_at);
    assert!(wait_for_event(&events, TIMEOUT, |e| matches!(e, HuntEvent::Paused { .. })).is_some());

    // configuration may change while paused, but the counter stays put
    assert!(hunter.set_region_enabled("sprite", true).unwrap());
    assert!(matches!(
        hunter.reset_counter(),
        Err(HunterError::InvalidState(RunStatus::Paused))
    ));

    hunter.resume().unwrap();
    assert_eq!(
        wait_for_event(&events, TIMEOUT, |e| matches!(e, HuntEvent::Resumed { .. })),
        Some(HuntEvent::Resumed {
            hunt_count: paused_at
        })
    );
    assert!(wait_until(TIMEOUT, || hunter.hunt_count() > paused_at));
    hunter.stop();
    assert!(hunter.hunt_count() > paused_at);
}

#[test]
fn test_fresh_start_resets_count() {
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        fast_timeline(),
    );
    hunter.start().unwrap();
    assert!(wait_until(TIMEOUT, || hunter.hunt_count() >= 2));
    hunter.stop();

    hunter
        .set_timeline(
            TimelineConfig::new()
                .with_action(TimelineAction::new(ActionKind::InitialDelay, 5.0, ""))
                .with_action(TimelineAction::new(ActionKind::Analysis, 0.0, "")),
        )
        .unwrap();
    hunter.start().unwrap();
    assert_eq!(hunter.hunt_count(), 0);
    assert_eq!(hunter.state().cursor, 0);
    hunter.stop();
}

#[test]
fn test_stop_abandons_paused_hunt() {
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        fast_timeline(),
    );
    let events = hunter.subscribe();
    hunter.start().unwrap();
    hunter.pause().unwrap();
    assert!(wait_until(TIMEOUT, || hunter.status() == RunStatus::Paused));

    hunter.stop();
    assert_eq!(hunter.status(), RunStatus::Idle);
    match wait_for_event(&events, TIMEOUT, is_stopped) {
        Some(HuntEvent::Stopped { reason, .. }) => assert_eq!(reason, StopReason::Requested),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(hunter.resume().is_err());
}

#[test]
fn test_actuation_fault_ends_idle() {
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::failing(),
        fast_timeline(),
    );
    let events = hunter.subscribe();
    hunter.start().unwrap();

    match wait_for_event(&events, TIMEOUT, is_stopped) {
        Some(HuntEvent::Stopped {
            final_count,
            reason: StopReason::Fault { kind, message },
        }) => {
            assert_eq!(kind, FaultKind::Actuation);
            assert_eq!(final_count, 0);
            assert!(message.contains("F1 not delivered"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(wait_until(TIMEOUT, || hunter.status() == RunStatus::Idle));
}

#[test]
fn test_capture_fault_ends_idle() {
    // frame smaller than the region: every capture fails
    init_logging();
    let source = StillFrameSource::new(image::RgbImage::new(4, 4));
    let mut hunter = Hunter::new(source, RecordingActuator::new());
    hunter.set_timeline(fast_timeline()).unwrap();
    hunter
        .add_region(Region::new("sprite", sprite_rect()).unwrap())
        .unwrap();
    hunter
        .add_reference(ReferenceImage::new("normal", sprite()).unwrap())
        .unwrap();
    let events = hunter.subscribe();
    hunter.start().unwrap();

    match wait_for_event(&events, TIMEOUT, is_stopped) {
        Some(HuntEvent::Stopped {
            reason: StopReason::Fault { kind, .. },
            ..
        }) => assert_eq!(kind, FaultKind::Capture),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(wait_until(TIMEOUT, || hunter.status() == RunStatus::Idle));
    assert!(hunter.last_outcome().unwrap().is_capture_failure());
}

#[test]
fn test_start_refused_without_references() {
    let mut hunter = Hunter::new(ScriptedSource::new(vec![sprite()]), RecordingActuator::new());
    hunter
        .add_region(Region::new("sprite", sprite_rect()).unwrap())
        .unwrap();

    let err = hunter.start().unwrap_err();
    assert!(matches!(err, HunterError::Configuration(_)));
    assert_eq!(hunter.status(), RunStatus::Idle);

    hunter
        .add_reference(ReferenceImage::new("normal", sprite()).unwrap())
        .unwrap();
    hunter.set_region_enabled("sprite", false).unwrap();
    assert!(matches!(hunter.start(), Err(HunterError::Configuration(_))));
}

#[test]
fn test_mutation_rejected_while_running() {
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        fast_timeline(),
    );
    hunter.start().unwrap();

    assert!(matches!(hunter.start(), Err(HunterError::AlreadyRunning)));
    assert!(matches!(
        hunter.remove_region("sprite"),
        Err(HunterError::InvalidState(RunStatus::Running))
    ));
    assert!(hunter.clear_references().is_err());
    assert!(hunter.set_timeline(TimelineConfig::default()).is_err());
    assert!(hunter.reset_counter().is_err());
    assert!(hunter.snapshot().is_err());
    // thresholds are the exception
    assert!(hunter
        .set_thresholds(shiny_hunter::ThresholdSet::new(0.5, 0.5, 50.0).unwrap())
        .is_ok());

    hunter.stop();
    assert_eq!(hunter.status(), RunStatus::Stopped);
    // a stopped run keeps its final count until the next start
    assert!(matches!(
        hunter.reset_counter(),
        Err(HunterError::InvalidState(RunStatus::Stopped))
    ));
}

#[test]
fn test_initial_delay_only_on_first_pass() {
    let timeline = TimelineConfig::new()
        .with_action(TimelineAction::new(ActionKind::InitialDelay, 0.3, "Focus"))
        .with_action(TimelineAction::new(ActionKind::Analysis, 0.02, ""));
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        timeline,
    );

    let start = Instant::now();
    hunter.start().unwrap();
    assert!(wait_until(TIMEOUT, || hunter.hunt_count() >= 1));
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(wait_until(TIMEOUT, || hunter.hunt_count() >= 5));
    hunter.stop();
    assert!(start.elapsed() < Duration::from_millis(1200));
}

#[test]
fn test_snapshot_restores_paused_hunt() {
    let dir = tempfile::tempdir().unwrap();
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        fast_timeline(),
    );
    hunter.start().unwrap();
    assert!(wait_until(TIMEOUT, || hunter.hunt_count() >= 2));
    hunter.pause().unwrap();
    assert!(wait_until(TIMEOUT, || hunter.status() == RunStatus::Paused));

    let snapshot = hunter.snapshot().unwrap();
    let saved_count = snapshot.hunt_count;
    let saved_cursor = snapshot.cursor;
    snapshot.save(dir.path()).unwrap();
    hunter.stop();

    let loaded = HuntSnapshot::load(dir.path()).unwrap();
    let mut restored = Hunter::restore(
        loaded,
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
    )
    .unwrap();

    assert_eq!(restored.status(), RunStatus::Paused);
    assert_eq!(restored.hunt_count(), saved_count);
    assert_eq!(restored.state().cursor, saved_cursor);
    assert_eq!(restored.references().names(), vec!["normal"]);
    assert_eq!(restored.config().timeline, fast_timeline());

    restored.resume().unwrap();
    assert!(wait_until(TIMEOUT, || restored.hunt_count() > saved_count));
    restored.stop();
}

#[test]
fn test_config_round_trip_through_hunter() {
    let mut hunter = hunter_with(
        ScriptedSource::new(vec![sprite()]),
        RecordingActuator::new(),
        fast_timeline(),
    );
    let config = hunter.config();
    let text = config.to_toml_string().unwrap();
    let parsed = HuntConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed, config);

    hunter.apply_config(HuntConfig::default()).unwrap();
    assert!(hunter.regions().is_empty());
    assert_eq!(hunter.timeline(), &TimelineConfig::default());
}
