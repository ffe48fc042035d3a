//! BDD step definitions for alert dispatch feature

use std::sync::Arc;

use cucumber::{given, then, when};

use cert_checker::notifier::{AlertMessage, Notifier};
use cert_checker::{CertCheckerError, Dispatcher};

use crate::steps::doubles::RecordingNotifier;
use crate::world::CheckerWorld;

fn register(world: &mut CheckerWorld, channel: String, enabled: bool, fail: bool) {
    let recorder = RecordingNotifier {
        order: Some(Arc::clone(&world.dispatch_order)),
        ..RecordingNotifier::new(&channel, enabled, fail)
    };
    world.channels.push(Arc::new(recorder));
}

#[given(expr = "a working channel {string}")]
fn working_channel(world: &mut CheckerWorld, name: String) {
    register(world, name, true, false);
}

#[given(expr = "a failing channel {string}")]
fn failing_channel(world: &mut CheckerWorld, name: String) {
    register(world, name, true, true);
}

#[given(expr = "a switched-off channel {string}")]
fn switched_off_channel(world: &mut CheckerWorld, name: String) {
    register(world, name, false, false);
}

#[when(expr = "the dispatcher sends an alert for {string}")]
async fn dispatcher_sends(world: &mut CheckerWorld, domain: String) {
    let mut dispatcher = Dispatcher::new();
    for channel in &world.channels {
        dispatcher.register(Arc::clone(channel) as Arc<dyn Notifier>);
    }

    let message = AlertMessage {
        domain,
        expiry_date: "2025-01-10 00:00:00".to_string(),
        days_left: 2,
    };
    world.dispatch_result = Some(dispatcher.send(&message).await);
}

#[then(expr = "channel {string} should have been called {int} time(s)")]
fn channel_called(world: &mut CheckerWorld, name: String, times: usize) {
    let channel = world
        .channels
        .iter()
        .find(|c| c.channel == name)
        .unwrap_or_else(|| panic!("no channel named '{}'", name));
    assert_eq!(channel.sent().len(), times, "channel {}", name);
}

#[then(expr = "the channels should have been called in the order {string}")]
fn called_in_order(world: &mut CheckerWorld, expected: String) {
    let expected: Vec<&str> = expected.split(", ").collect();
    assert_eq!(*world.dispatch_order.lock().unwrap(), expected);
}

#[then("the dispatch should succeed")]
fn dispatch_succeeds(world: &mut CheckerWorld) {
    let result = world.dispatch_result.as_ref().expect("no dispatch result");
    result.as_ref().unwrap();
}

#[then(expr = "the dispatch should fail naming {string}")]
fn dispatch_fails_naming(world: &mut CheckerWorld, expected: String) {
    let result = world.dispatch_result.take().expect("no dispatch result");
    match result {
        Err(CertCheckerError::Dispatch(failure)) => {
            let expected: Vec<&str> = expected.split(", ").collect();
            assert_eq!(failure.channels(), expected);
        }
        other => panic!("expected a dispatch failure, got {:?}", other),
    }
}
