//! BDD step definitions for notification channel feature

use std::sync::Arc;

use cucumber::{given, then, when};

use cert_checker::config::{BarkConfig, DingTalkConfig, WeComConfig};
use cert_checker::io::HttpClient;
use cert_checker::notifier::{
    AlertMessage, BarkNotifier, DingTalkNotifier, Notifier, WeComNotifier,
};
use cert_checker::CertCheckerError;

use crate::steps::doubles::RecordingHttpClient;
use crate::world::CheckerWorld;

fn build_channel(
    channel: &str,
    enabled: bool,
    secret: Option<String>,
    http: Arc<dyn HttpClient>,
) -> Box<dyn Notifier> {
    match channel {
        "DingTalk" => Box::new(DingTalkNotifier::new(
            &DingTalkConfig {
                enabled,
                webhook: "https://oapi.dingtalk.com/robot/send?access_token=bdd".to_string(),
                secret,
                ..DingTalkConfig::default()
            },
            http,
        )),
        "WeCom" => Box::new(WeComNotifier::new(
            &WeComConfig {
                enabled,
                webhook: "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=bdd".to_string(),
                ..WeComConfig::default()
            },
            http,
        )),
        "Bark" => Box::new(BarkNotifier::new(
            &BarkConfig {
                enabled,
                device_key: "bdd-device".to_string(),
                ..BarkConfig::default()
            },
            http,
        )),
        other => panic!("unknown channel '{}'", other),
    }
}

fn install(
    world: &mut CheckerWorld,
    channel: &str,
    enabled: bool,
    secret: Option<String>,
    http: RecordingHttpClient,
) {
    let http = Arc::new(http);
    world.notifier = Some(build_channel(
        channel,
        enabled,
        secret,
        Arc::clone(&http) as Arc<dyn HttpClient>,
    ));
    world.http = Some(http);
}

fn recorded_body(world: &CheckerWorld) -> String {
    let http = world.http.as_ref().expect("no recording HTTP client");
    let requests = http.requests();
    assert_eq!(requests.len(), 1, "expected exactly one request");
    requests[0].body.clone()
}

#[given(expr = "a {word} channel that answers {int} with {string}")]
fn channel_answering(world: &mut CheckerWorld, channel: String, status: u16, body: String) {
    install(world, &channel, true, None, RecordingHttpClient::replying(status, &body));
}

#[given(expr = "a {word} channel that is unreachable")]
fn channel_unreachable(world: &mut CheckerWorld, channel: String) {
    install(world, &channel, true, None, RecordingHttpClient::unreachable());
}

#[given(expr = "a disabled {word} channel")]
fn channel_disabled(world: &mut CheckerWorld, channel: String) {
    install(world, &channel, false, None, RecordingHttpClient::replying(200, "{}"));
}

#[given(expr = "a DingTalk channel signed with secret {string}")]
fn dingtalk_signed(world: &mut CheckerWorld, secret: String) {
    install(
        world,
        "DingTalk",
        true,
        Some(secret),
        RecordingHttpClient::replying(200, r#"{"errcode":0,"errmsg":"ok"}"#),
    );
}

#[when(expr = "an alert is sent for {string} with {int} days left")]
async fn alert_sent(world: &mut CheckerWorld, domain: String, days_left: i64) {
    let notifier = world.notifier.as_ref().expect("notifier not set");
    let message = AlertMessage {
        domain,
        expiry_date: "2025-01-10 00:00:00".to_string(),
        days_left,
    };
    world.notification_result = Some(notifier.send(&message).await);
}

#[then("the notification should succeed")]
fn notification_succeeds(world: &mut CheckerWorld) {
    let result = world.notification_result.as_ref().expect("no result");
    result.as_ref().unwrap();
}

#[then(expr = "the notification should fail with a {word} error from {word}")]
fn notification_fails_with(world: &mut CheckerWorld, kind: String, channel: String) {
    let result = world.notification_result.take().expect("no result");
    let err = result.expect_err("expected the notification to fail");
    let matches = match kind.as_str() {
        "status" => matches!(err, CertCheckerError::Status { .. }),
        "transport" => matches!(err, CertCheckerError::Transport { .. }),
        "rejection" => matches!(err, CertCheckerError::Rejected { .. }),
        other => panic!("unknown error kind '{}'", other),
    };
    assert!(matches, "expected a {} error, got {:?}", kind, err);
    assert_eq!(err.channel(), Some(channel.as_str()));
}

#[then(expr = "the request body should contain {string}")]
fn body_contains(world: &mut CheckerWorld, expected: String) {
    let body = recorded_body(world);
    assert!(
        body.contains(&expected),
        "expected body to contain '{}', got {}",
        expected,
        body
    );
}

#[then(expr = "the request field {string} should be {string}")]
fn body_field(world: &mut CheckerWorld, pointer: String, expected: String) {
    let body: serde_json::Value = serde_json::from_str(&recorded_body(world)).unwrap();
    let actual = body
        .pointer(&pointer)
        .unwrap_or_else(|| panic!("no field at {} in {}", pointer, body));
    assert_eq!(actual.as_str(), Some(expected.as_str()), "field {}", pointer);
}

#[then(expr = "the request URL should contain {string}")]
fn url_contains(world: &mut CheckerWorld, expected: String) {
    let http = world.http.as_ref().expect("no recording HTTP client");
    let requests = http.requests();
    assert!(
        requests.iter().any(|r| r.url.contains(&expected)),
        "expected a request URL containing '{}', got {:?}",
        expected,
        requests
    );
}

#[then("no request should have been made")]
fn no_request(world: &mut CheckerWorld) {
    let http = world.http.as_ref().expect("no recording HTTP client");
    assert!(http.requests().is_empty());
}
