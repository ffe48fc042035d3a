//! BDD step definitions for check cycle and lifecycle features

use std::sync::Arc;

use cucumber::{given, then, when};
use tokio_util::sync::CancellationToken;

use cert_checker::engine::DomainOutcome;
use cert_checker::io::HttpClient;
use cert_checker::notifier::Notifier;
use cert_checker::{CertChecker, CheckerBuilder};

use crate::steps::doubles::{RecordingHttpClient, RecordingNotifier, StubProbe};
use crate::world::CheckerWorld;

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

fn checker_builder(world: &mut CheckerWorld) -> CheckerBuilder {
    let http = world
        .http
        .get_or_insert_with(|| Arc::new(RecordingHttpClient::replying(200, "{}")))
        .clone();
    let recorder = world
        .cycle_recorder
        .get_or_insert_with(|| Arc::new(RecordingNotifier::new("Recorder", true, false)))
        .clone();
    let probe = StubProbe {
        days_left: world.days_left.clone(),
    };

    let mut builder = CheckerBuilder::new(world.config.clone())
        .with_http_client(http as Arc<dyn HttpClient>)
        .with_probe(Arc::new(probe))
        .with_notifiers(vec![recorder as Arc<dyn Notifier>]);
    if let Some(cancel) = world.cancel.take() {
        builder = builder.with_cancellation_token(cancel);
    }
    builder
}

async fn build_checker(world: &mut CheckerWorld) -> CertChecker {
    checker_builder(world)
        .build()
        .await
        .expect("checker should build")
}

// --- Given steps ---

#[given(expr = "the domains {string}")]
fn the_domains(world: &mut CheckerWorld, list: String) {
    world.config.domains.list = split_list(&list);
}

#[given(expr = "alerts start {int} days before expiry")]
fn alert_threshold(world: &mut CheckerWorld, days: u32) {
    world.config.alert.threshold_days = days;
}

#[given(expr = "alerts repeat at most every {int} hours")]
fn repeat_interval(world: &mut CheckerWorld, hours: u64) {
    world.config.alert.repeat_interval_hours = hours;
}

#[given(expr = "{string} has {int} days left")]
fn domain_days_left(world: &mut CheckerWorld, domain: String, days: i64) {
    world.days_left.insert(domain, days);
}

#[given(expr = "a remote domain list answering {string}")]
fn remote_domain_list(world: &mut CheckerWorld, body: String) {
    world.config.domains.use_remote_list = true;
    world.config.domains.remote_url = Some("https://inventory.test/domains".to_string());
    world.http = Some(Arc::new(RecordingHttpClient::replying(200, &body)));
}

#[given(expr = "an unreachable remote domain list")]
fn unreachable_domain_list(world: &mut CheckerWorld) {
    world.config.domains.use_remote_list = true;
    world.config.domains.remote_url = Some("https://inventory.test/domains".to_string());
    world.http = Some(Arc::new(RecordingHttpClient::unreachable()));
}

#[given("the alert channel is failing")]
fn alert_channel_failing(world: &mut CheckerWorld) {
    world.cycle_recorder = Some(Arc::new(RecordingNotifier::new("Recorder", true, true)));
}

#[given("a pre-cancelled cancellation token")]
fn pre_cancelled_token(world: &mut CheckerWorld) {
    let token = CancellationToken::new();
    token.cancel();
    world.cancel = Some(token);
}

#[given(expr = "the daily check time {string}")]
fn daily_check_time(world: &mut CheckerWorld, time: String) {
    world.config.schedule.daily_at = time;
}

// --- When steps ---

#[when("a check cycle runs")]
async fn check_cycle_runs(world: &mut CheckerWorld) {
    let checker = build_checker(world).await;
    world.cycle_report = Some(checker.run_once().await);
}

#[when(expr = "{int} check cycles run")]
async fn check_cycles_run(world: &mut CheckerWorld, cycles: usize) {
    let checker = build_checker(world).await;
    for _ in 0..cycles {
        world.cycle_report = Some(checker.run_once().await);
    }
}

#[when("the checker is built")]
async fn checker_is_built(world: &mut CheckerWorld) {
    let builder = checker_builder(world);
    world.build_succeeded = Some(builder.build().await.is_ok());
}

#[when("the checker is built and started")]
async fn checker_is_built_and_started(world: &mut CheckerWorld) {
    let builder = checker_builder(world);
    match builder.build().await {
        Ok(checker) => {
            world.build_succeeded = Some(true);
            world.start_succeeded = Some(checker.start().await.is_ok());
        }
        Err(_) => {
            world.build_succeeded = Some(false);
            world.start_succeeded = Some(false);
        }
    }
}

// --- Then steps ---

#[then(expr = "{int} alert(s) should have been sent")]
fn alerts_sent(world: &mut CheckerWorld, expected: usize) {
    let recorder = world.cycle_recorder.as_ref().expect("no recorder");
    assert_eq!(recorder.sent().len(), expected, "sent: {:?}", recorder.sent());
}

#[then(expr = "an alert should have been sent for {string} with {int} days left")]
fn alert_sent_for(world: &mut CheckerWorld, domain: String, days_left: i64) {
    let recorder = world.cycle_recorder.as_ref().expect("no recorder");
    assert!(
        recorder
            .sent()
            .iter()
            .any(|m| m.domain == domain && m.days_left == days_left),
        "no alert for {} with {} days left in {:?}",
        domain,
        days_left,
        recorder.sent()
    );
}

#[then(expr = "{string} should be reported as {word}")]
fn reported_as(world: &mut CheckerWorld, domain: String, expected: String) {
    let report = world.cycle_report.as_ref().expect("no cycle report");
    let outcome = report
        .get(&domain)
        .unwrap_or_else(|| panic!("{} missing from report", domain));
    let matches = match expected.as_str() {
        "healthy" => matches!(outcome, DomainOutcome::Healthy(_)),
        "alerted" => matches!(outcome, DomainOutcome::Alerted(_)),
        "suppressed" => matches!(outcome, DomainOutcome::Suppressed(_)),
        "undelivered" => matches!(outcome, DomainOutcome::AlertFailed { .. }),
        "unreachable" => matches!(outcome, DomainOutcome::CheckFailed(_)),
        other => panic!("unknown outcome '{}'", other),
    };
    assert!(matches, "{} was {:?}", domain, outcome);
}

#[then(expr = "the report should list {string}")]
fn report_lists(world: &mut CheckerWorld, expected: String) {
    let report = world.cycle_report.as_ref().expect("no cycle report");
    let domains: Vec<&str> = report.domains.iter().map(|d| d.domain.as_str()).collect();
    assert_eq!(domains, split_list(&expected));
}

#[then("the build should succeed")]
fn build_should_succeed(world: &mut CheckerWorld) {
    assert_eq!(world.build_succeeded, Some(true), "Expected build to succeed");
}

#[then("the build should fail")]
fn build_should_fail(world: &mut CheckerWorld) {
    assert_eq!(world.build_succeeded, Some(false), "Expected build to fail");
}

#[then("the lifecycle should complete successfully")]
fn lifecycle_should_complete(world: &mut CheckerWorld) {
    assert_eq!(world.build_succeeded, Some(true), "Expected build to succeed");
    assert_eq!(world.start_succeeded, Some(true), "Expected start to succeed");
}
