//! Hold and recording control over HTTP.

#[path = "support/app.rs"]
mod test_app_support;

use axum::http::StatusCode;
use serde_json::json;
use switchboard_core::{
    AssignmentStatus, Conference, ConferenceStatus, Participant, ParticipantStatus,
};
use switchboard_test_utils::fixtures::{linked_voice_task, live_call, recording, seed_voice_contact};
use test_app_support::TestApp;

#[tokio::test]
async fn hold_without_linkage_or_conference_fails_generically() {
    let app = TestApp::new();
    seed_voice_contact(&app.platform, "WT9", AssignmentStatus::Assigned).await;

    let (status, body) = app
        .post_json(
            "/voice/hold/start",
            json!({"taskSid": "WT9", "who": "customer", "customerCallSid": "CA_CUSTOMER"}),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "RECONCILIATION_FAILED");
    assert_eq!(body["message"], "Cannot hold");
    assert!(app.platform.hold_updates().await.is_empty());
}

#[tokio::test]
async fn hold_uses_linked_conference_and_participant() {
    let app = TestApp::new();
    app.platform.add_call(live_call("CA_CUSTOMER")).await;
    app.platform
        .add_conference(Conference {
            sid: "CF1".to_string(),
            friendly_name: "WT8".to_string(),
            status: ConferenceStatus::InProgress,
            date_created: None,
        })
        .await;
    app.platform
        .add_participant(Participant {
            call_sid: "CA_CUSTOMER".to_string(),
            conference_sid: "CF1".to_string(),
            status: ParticipantStatus::Connected,
            hold: false,
            coaching: false,
            label: Some("customer".to_string()),
        })
        .await;
    app.platform
        .add_task(linked_voice_task(
            "WT8",
            AssignmentStatus::Assigned,
            "CF1",
            "CA_CUSTOMER",
            "CA_AGENT",
        ))
        .await;

    let (status, body) = app
        .post_json("/voice/hold/start", json!({"taskSid": "WT8", "who": "customer"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confSid"], "CF1");
    assert_eq!(body["callSid"], "CA_CUSTOMER");
    let updates = app.platform.hold_updates().await;
    assert_eq!(updates.len(), 1);
    assert!(updates[0].hold);
    assert_eq!(updates[0].conference_sid, "CF1");
}

#[tokio::test]
async fn adhoc_hold_builds_conference_once_and_times_the_hold() {
    let app = TestApp::new();
    app.platform.add_call(live_call("CA_CUSTOMER")).await;
    app.platform.add_call(live_call("CA_AGENT")).await;
    let body = json!({
        "customerCallSid": "CA_CUSTOMER",
        "agentCallSid": "CA_AGENT",
        "who": "customer"
    });

    let (status, started) = app.post_json("/voice/hold/start", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(started["confSid"].as_str().is_some());
    assert!(started.get("durationMs").is_none());
    assert_eq!(app.platform.redirects().await.len(), 2);

    let (status, stopped) = app.post_json("/voice/hold/stop", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stopped["confSid"], started["confSid"]);
    assert!(stopped["durationMs"].as_u64().is_some());

    // The existing xfer conference is reused.
    assert_eq!(app.platform.redirects().await.len(), 2);
    let holds: Vec<bool> = app
        .platform
        .hold_updates()
        .await
        .iter()
        .map(|u| u.hold)
        .collect();
    assert_eq!(holds, vec![true, false]);
}

#[tokio::test]
async fn adhoc_hold_requires_both_legs() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/voice/hold/start",
            json!({"customerCallSid": "CA_CUSTOMER", "who": "agent"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn recording_commands_without_recording_are_404() {
    let app = TestApp::new();
    for action in ["pause", "resume", "stop"] {
        let (status, body) = app
            .post_json(
                &format!("/voice/recordings/{}", action),
                json!({"callSid": "CA_CUSTOMER"}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", action);
        assert_eq!(body["code"], "RECORDING_NOT_FOUND");
    }
}

#[tokio::test]
async fn recording_start_is_not_duplicated() {
    let app = TestApp::new();

    let (_, status) = app.get("/voice/recordings/status?callSid=CA_CUSTOMER").await;
    assert_eq!(status["status"], "inactive");

    let (code, first) = app
        .post_json("/voice/recordings/start", json!({"callSid": "CA_CUSTOMER"}))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(first["created"], true);

    let (_, second) = app
        .post_json("/voice/recordings/start", json!({"callSid": "CA_CUSTOMER"}))
        .await;
    assert_eq!(second["created"], false);
    assert_eq!(second["recordingSid"], first["recordingSid"]);
    assert_eq!(app.platform.recording_starts().await, 1);

    let (_, status) = app.get("/voice/recordings/status?callSid=CA_CUSTOMER").await;
    assert_eq!(status["status"], "in-progress");
}

#[tokio::test]
async fn recording_commands_prefer_in_progress_over_newer_stopped() {
    let app = TestApp::new();
    app.platform
        .add_recording(recording("RE_OLD", "CA1", "in-progress"))
        .await;
    app.platform
        .add_recording(recording("RE_NEW", "CA1", "stopped"))
        .await;

    let (status, body) = app
        .post_json("/voice/recordings/pause", json!({"callSid": "CA1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recordingSid"], "RE_OLD");
    assert_eq!(body["status"], "paused");
}

#[tokio::test]
async fn recording_status_requires_call_sid() {
    let app = TestApp::new();
    let (status, _) = app.get("/voice/recordings/status").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
