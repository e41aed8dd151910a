use std::sync::Arc;

use chrono::Duration;
use practice_core::model::{QuestionId, Rating, TopicId, TopicState};
use practice_core::time::fixed_now;
use services::{
    Clock, Confirmation, DEFAULT_PROGRESS_PATH, LoadOutcome, PracticeController, PracticeError,
    ProgressSync, SyncError,
};
use storage::{InMemoryRemote, StorageError};

fn controller(remote: &InMemoryRemote, seed: u64) -> PracticeController {
    PracticeController::with_seed(Clock::fixed(fixed_now()), seed)
        .with_sync(ProgressSync::new(Arc::new(remote.clone())))
}

#[tokio::test]
async fn single_question_good_rating_is_scheduled_and_saved() {
    let remote = InMemoryRemote::new();
    let mut controller = controller(&remote, 1);
    controller
        .load_bank_json(r#"{"M1": {"T1": ["2020 Q1"]}}"#)
        .unwrap();
    assert_eq!(
        controller.load_progress().await.unwrap(),
        LoadOutcome::FreshStart
    );

    let items = controller.start_session(1).unwrap();
    assert_eq!(items.len(), 1);
    let id = items[0].session_id();

    controller.rate(id, Rating::Good).unwrap();
    assert!(controller.all_done());

    let progress = controller.progress();
    assert_eq!(
        progress.history,
        vec![QuestionId::from_raw("M1::T1::2020 Q1")]
    );
    let state = progress.topic_state(&TopicId::new("M1", "T1")).unwrap();
    assert_eq!(state.state, TopicState::Review);
    assert!((state.stability - 2.4).abs() < 1e-9);
    assert!((state.difficulty - 4.93).abs() < 1e-9);
    assert_eq!(state.due, fixed_now() + Duration::days(2));

    let report = controller.save_progress().await.unwrap();
    assert!(!report.remote_changed);

    let written = remote.content(DEFAULT_PROGRESS_PATH).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json["version"], 2);
    assert_eq!(json["history"][0], "M1::T1::2020 Q1");
    assert_eq!(json["topics"]["M1::T1"]["state"], 2);
}

#[tokio::test]
async fn progress_survives_a_restart() {
    let remote = InMemoryRemote::new();
    let bank = r#"{"M1": {"T1": ["a", "b"], "T2": ["c"]}}"#;

    let mut first = controller(&remote, 2);
    first.load_bank_json(bank).unwrap();
    first.load_progress().await.unwrap();
    let ids: Vec<_> = first
        .start_session(2)
        .unwrap()
        .iter()
        .map(|item| item.session_id())
        .collect();
    for id in ids {
        first.rate(id, Rating::Hard).unwrap();
    }
    first.finish_session();
    first.save_progress().await.unwrap();

    let mut second = controller(&remote, 3);
    second.load_bank_json(bank).unwrap();
    assert_eq!(
        second.load_progress().await.unwrap(),
        LoadOutcome::Loaded { history_len: 2 }
    );
    assert_eq!(second.progress().history, first.progress().history);
    for (topic, state) in &first.progress().topics {
        let loaded = second.progress().topic_state(topic).unwrap();
        assert_eq!(loaded.due, state.due);
        assert!((loaded.stability - state.stability).abs() < 1e-9);
    }

    // Both topics were just reviewed; only the one unseen question remains.
    let items = second.start_session(2).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].main_topic_id(), &TopicId::new("M1", "T1"));
}

#[tokio::test]
async fn legacy_history_is_honoured_and_upgraded_on_save() {
    let remote = InMemoryRemote::new();
    remote
        .put_raw(DEFAULT_PROGRESS_PATH, r#"["M1_T1_a"]"#)
        .unwrap();

    let mut controller = controller(&remote, 4);
    controller
        .load_bank_json(r#"{"M1": {"T1": ["a", "b"]}}"#)
        .unwrap();
    assert_eq!(
        controller.load_progress().await.unwrap(),
        LoadOutcome::Migrated { entries: 1 }
    );

    let items = controller.start_session(1).unwrap();
    assert_eq!(items[0].question().raw(), "b");

    controller.save_progress().await.unwrap();
    let written = remote.content(DEFAULT_PROGRESS_PATH).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json["version"], 2);
    assert_eq!(json["history"], serde_json::json!(["M1_T1_a"]));
    assert_eq!(json["topics"], serde_json::json!({}));
    assert_eq!(json["custom_associations"], serde_json::json!({}));
}

#[tokio::test]
async fn failed_save_keeps_local_progress() {
    let remote = InMemoryRemote::new();
    let mut controller = controller(&remote, 5);
    controller.load_bank_json(r#"{"M": {"T": ["q"]}}"#).unwrap();
    controller.load_progress().await.unwrap();

    let id = controller.start_session(1).unwrap()[0].session_id();
    controller.rate(id, Rating::Good).unwrap();

    remote.fail_with(Some(StorageError::Unauthorized));
    let err = controller.save_progress().await.unwrap_err();
    assert!(matches!(
        err,
        PracticeError::Sync(SyncError::Storage(StorageError::Unauthorized))
    ));
    assert_eq!(controller.progress().history.len(), 1);

    remote.fail_with(None);
    controller.save_progress().await.unwrap();
    assert!(remote.content(DEFAULT_PROGRESS_PATH).is_some());
}

#[tokio::test]
async fn reset_then_save_clears_the_remote() {
    let remote = InMemoryRemote::new();
    let mut controller = controller(&remote, 6);
    controller.load_bank_json(r#"{"M": {"T": ["q"]}}"#).unwrap();
    controller.load_progress().await.unwrap();
    let id = controller.start_session(1).unwrap()[0].session_id();
    controller.rate(id, Rating::Again).unwrap();
    controller.save_progress().await.unwrap();

    controller
        .reset_progress(Confirmation::Confirmed)
        .unwrap();
    controller.save_progress().await.unwrap();

    let written = remote.content(DEFAULT_PROGRESS_PATH).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json["history"], serde_json::json!([]));
}

#[tokio::test]
async fn undecodable_progress_can_still_be_reset() {
    let remote = InMemoryRemote::new();
    remote.put_raw(DEFAULT_PROGRESS_PATH, "not json").unwrap();
    let mut controller = controller(&remote, 7);

    assert!(matches!(
        controller.load_progress().await,
        Err(PracticeError::Sync(SyncError::Progress(_)))
    ));

    controller
        .reset_progress(Confirmation::Confirmed)
        .unwrap();
    controller.save_progress().await.unwrap();

    let written = remote.content(DEFAULT_PROGRESS_PATH).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "version": 2,
            "history": [],
            "topics": {},
            "custom_associations": {}
        })
    );
}

#[tokio::test]
async fn unknown_version_file_is_saved_back_unchanged() {
    let remote = InMemoryRemote::new();
    let original = serde_json::json!({
        "version": 3,
        "history": [{ "id": "M1::T1::a" }],
        "topics": { "M1::T1": { "ease": 2.5 } },
        "settings": { "theme": "dark" }
    });
    remote
        .put_raw(DEFAULT_PROGRESS_PATH, original.to_string())
        .unwrap();

    let mut controller = controller(&remote, 8);
    assert_eq!(
        controller.load_progress().await.unwrap(),
        LoadOutcome::UnknownVersion { version: Some(3) }
    );
    controller.save_progress().await.unwrap();

    let written = remote.content(DEFAULT_PROGRESS_PATH).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json, original);
}
