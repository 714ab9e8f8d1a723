//! Integration tests for link and broker recovery through the controller.

use bellnode::adapters::ini_store::IniStore;
use bellnode::app::events::AppEvent;

use crate::mock_hw::{CONFIG_INI, DEVICE_ID, RecordingSink, TestController, ports, started};

#[test]
fn broker_is_retried_every_two_seconds_until_accepted() {
    let mut p = ports();
    p.broker.refuse_next = 3;
    let mut sink = RecordingSink::new();
    let store = IniStore::parse(CONFIG_INI);
    let c = match TestController::startup(&store, p, &mut sink) {
        Ok(c) => c,
        Err(e) => panic!("startup failed: {e}"),
    };

    assert_eq!(c.network().broker().connects, 4);
    assert_eq!(c.delay().total_ms(), 6_000);
    assert!(sink.events.contains(&AppEvent::BrokerConnected {
        attempts: 4,
        subscriptions: 6
    }));
}

#[test]
fn link_join_polls_every_half_second() {
    let mut p = ports();
    p.link.polls_to_join = 5;
    let mut sink = RecordingSink::new();
    let store = IniStore::parse(CONFIG_INI);
    let c = match TestController::startup(&store, p, &mut sink) {
        Ok(c) => c,
        Err(e) => panic!("startup failed: {e}"),
    };

    assert_eq!(c.delay().total_ms(), 2_500);
    assert_eq!(
        c.network().link().joins,
        vec![("Siet_rozhlas".to_owned(), "rozhlas123".to_owned())]
    );
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::LinkUp { ip: Some(_), polls: 6 })));
}

#[test]
fn broker_reconnect_restores_each_subscription_once() {
    let (mut c, mut sink) = started();
    let first: Vec<String> = c.network().broker().subscribed.clone();

    c.network_mut().broker_mut().connected = false;
    sink.clear();
    c.iterate(&mut sink);

    let broker = c.network().broker();
    assert_eq!(broker.subscribed.len(), first.len() * 2);
    assert_eq!(broker.subscribed[first.len()..], first[..]);
    assert_eq!(broker.published_to("units").len(), 2);
    assert_eq!(c.network().broker_sessions(), 2);
    assert_eq!(sink.count(|e| *e == AppEvent::BrokerLost), 1);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::BrokerConnected { .. })),
        1
    );
}

#[test]
fn healthy_session_is_left_alone() {
    let (mut c, mut sink) = started();
    sink.clear();
    for _ in 0..50 {
        c.iterate(&mut sink);
    }
    assert_eq!(c.network().broker().connects, 1);
    assert_eq!(c.network().link().joins.len(), 1);
    assert!(sink.events.is_empty());
}

#[test]
fn link_loss_rejoins_before_anything_else() {
    let (mut c, mut sink) = started();
    c.network_mut().link_mut().drop_link();
    c.network_mut().broker_mut().connected = false;
    c.network_mut().broker_mut().inject("zvonenie", b"A");
    sink.clear();
    c.iterate(&mut sink);

    assert_eq!(c.network().link().joins.len(), 2);
    assert_eq!(c.network().broker().connects, 2);
    let lost = sink.events.iter().position(|e| *e == AppEvent::LinkLost);
    let up = sink
        .events
        .iter()
        .position(|e| matches!(e, AppEvent::BrokerConnected { .. }));
    let played = sink
        .events
        .iter()
        .position(|e| matches!(e, AppEvent::PlaybackStarted { .. }));
    assert!(lost.is_some() && up.is_some() && played.is_some());
    assert!(lost < up && up < played);
}

#[test]
fn client_id_is_derived_from_hardware_address() {
    let (c, _) = started();
    assert_eq!(c.network().device_id(), DEVICE_ID);
    assert_eq!(c.network().client_id(), format!("esp32-client-{DEVICE_ID}"));
}

const ROUTES: [&str; 6] = ["control", "sleep", "zvonenie", "call", "live", DEVICE_ID];

#[test]
fn startup_survives_a_failed_subscribe() {
    let mut p = ports();
    p.broker.fail_subscribes = 1;
    let mut sink = RecordingSink::new();
    let store = IniStore::parse(CONFIG_INI);
    let c = match TestController::startup(&store, p, &mut sink) {
        Ok(c) => c,
        Err(e) => panic!("startup failed: {e}"),
    };

    let broker = c.network().broker();
    assert_eq!(broker.connects, 2);
    assert_eq!(broker.subscribed, ROUTES);
    assert_eq!(c.delay().total_ms(), 2_000);
    assert!(c.network().broker_connected());
    assert!(sink.events.contains(&AppEvent::BrokerConnected {
        attempts: 2,
        subscriptions: 6
    }));
}

#[test]
fn startup_survives_a_failed_identity_publish() {
    let mut p = ports();
    p.broker.fail_publishes = 1;
    let mut sink = RecordingSink::new();
    let store = IniStore::parse(CONFIG_INI);
    let c = match TestController::startup(&store, p, &mut sink) {
        Ok(c) => c,
        Err(e) => panic!("startup failed: {e}"),
    };

    let broker = c.network().broker();
    assert_eq!(broker.connects, 2);
    assert_eq!(broker.published_to("units"), vec![DEVICE_ID.as_bytes()]);
    assert_eq!(broker.subscribed, ROUTES);
}

#[test]
fn reconnect_with_failing_subscribe_still_restores_every_route() {
    let (mut c, mut sink) = started();
    let broker = c.network_mut().broker_mut();
    broker.connected = false;
    broker.fail_subscribes = 2;
    broker.subscribed.clear();
    c.iterate(&mut sink);

    assert!(c.network().broker_connected());
    assert_eq!(c.network().broker().connects, 4);
    assert_eq!(c.network().broker().subscribed, ROUTES);

    // Commands flow again on the repaired session.
    c.network_mut().broker_mut().inject("zvonenie", b"A");
    c.iterate(&mut sink);
    assert_eq!(c.audio().opens.len(), 1);
}
