//! Cold and warm transfers over HTTP.

#[path = "support/app.rs"]
mod test_app_support;

use axum::http::StatusCode;
use serde_json::json;
use switchboard_core::{Call, CallStatus};
use switchboard_platform::DialTarget;
use switchboard_test_utils::fixtures::live_call;
use test_app_support::{TestApp, CALLER_ID};

#[tokio::test]
async fn cold_transfer_of_ended_call_is_conflict() {
    let app = TestApp::new();
    app.platform
        .add_call(Call::new("CA_DONE", CallStatus::Completed))
        .await;

    let (status, body) = app
        .post_json(
            "/transfer/cold",
            json!({"customerCallSid": "CA_DONE", "targetIdentity": "55"}),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_REDIRECTABLE");
    assert_eq!(body["details"]["twilioStatus"], "completed");
    assert!(app.platform.redirects().await.is_empty());
}

#[tokio::test]
async fn cold_transfer_of_ringing_call_is_not_in_progress() {
    let app = TestApp::new();
    app.platform
        .add_call(Call::new("CA_RING", CallStatus::Ringing))
        .await;

    let (status, body) = app
        .post_json(
            "/transfer/cold",
            json!({"customerCallSid": "CA_RING", "targetIdentity": "55"}),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_IN_PROGRESS");
    assert_eq!(body["details"]["twilioStatus"], "ringing");
    assert!(app.platform.redirects().await.is_empty());
}

#[tokio::test]
async fn cold_transfer_redirects_customer_and_drops_agent() {
    let app = TestApp::new();
    app.platform.add_call(live_call("CA_CUSTOMER")).await;
    app.platform.add_call(live_call("CA_AGENT")).await;

    let (status, body) = app
        .post_json(
            "/transfer/cold",
            json!({
                "customerCallSid": "CA_CUSTOMER",
                "targetIdentity": "agent:55",
                "agentCallSid": "CA_AGENT"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["mode"], "cold");

    let redirects = app.platform.redirects().await;
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].call_sid, "CA_CUSTOMER");
    let twiml = redirects[0].parsed().unwrap();
    assert_eq!(twiml.target, DialTarget::Client("agent:55".to_string()));
    assert_eq!(app.platform.hangups().await, vec!["CA_AGENT".to_string()]);
}

#[tokio::test]
async fn blank_target_fails_before_any_redirect() {
    let app = TestApp::new();
    app.platform.add_call(live_call("CA_CUSTOMER")).await;

    let (status, _) = app
        .post_json(
            "/transfer/cold",
            json!({"customerCallSid": "CA_CUSTOMER", "targetIdentity": "  "}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.platform.redirects().await.is_empty());
}

#[tokio::test]
async fn warm_transfer_builds_three_way_conference() {
    let app = TestApp::new();
    app.platform.add_call(live_call("CA_CUSTOMER")).await;
    app.platform.add_call(live_call("CA_AGENT")).await;

    let (status, body) = app
        .post_json(
            "/transfer/warm",
            json!({
                "taskSid": "WT7",
                "customerCallSid": "CA_CUSTOMER",
                "agentCallSid": "CA_AGENT",
                "targetIdentity": "55"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "warm");
    assert_eq!(body["conference"], "task-WT7");

    let redirects = app.platform.redirects().await;
    assert_eq!(redirects.len(), 2);
    for (redirect, (call_sid, end_on_exit)) in redirects
        .iter()
        .zip([("CA_CUSTOMER", true), ("CA_AGENT", false)])
    {
        assert_eq!(redirect.call_sid, call_sid);
        let DialTarget::Conference(dial) = redirect.parsed().unwrap().target else {
            panic!("expected a conference dial for {}", call_sid);
        };
        assert_eq!(dial.name, "task-WT7");
        assert_eq!(dial.end_conference_on_exit, end_on_exit, "{}", call_sid);
    }

    let created = app.platform.created_calls().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].to, "client:agent:55");
    assert_eq!(created[0].from, CALLER_ID);
    let target = switchboard_platform::VoiceResponse::parse(&created[0].twiml).unwrap();
    let DialTarget::Conference(dial) = target.target else {
        panic!("expected a conference dial for the target leg");
    };
    assert!(dial.beep);
    assert!(!dial.end_conference_on_exit);
}

#[tokio::test]
async fn warm_transfer_without_task_uses_customer_leg_name() {
    let app = TestApp::new();
    app.platform.add_call(live_call("CA_CUSTOMER")).await;
    app.platform.add_call(live_call("CA_AGENT")).await;

    let (status, body) = app
        .post_json(
            "/transfer/warm",
            json!({
                "customerCallSid": "CA_CUSTOMER",
                "agentCallSid": "CA_AGENT",
                "targetIdentity": "+15551234567",
                "targetType": "number"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conference"], "xfer-CA_CUSTOMER");
    assert_eq!(app.platform.created_calls().await[0].to, "+15551234567");
}

#[tokio::test]
async fn complete_transfer_is_idempotent() {
    let app = TestApp::new();
    app.platform.add_call(live_call("CA_AGENT")).await;

    let (status, body) = app
        .post_json("/transfer/complete", json!({"agentCallSid": "CA_AGENT"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alreadyEnded"], false);

    let (status, body) = app
        .post_json("/transfer/complete", json!({"agentCallSid": "CA_AGENT"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alreadyEnded"], true);
}
