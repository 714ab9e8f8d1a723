//! Route-table tests against the configuration file the device ships with.

use bellnode::app::commands::{Action, SessionKind};
use bellnode::dispatch::{Dispatcher, PayloadError, Route};
use bellnode::power::SuspendError;

use crate::mock_hw::{DEVICE_ID, MEDIA_BASE, config};

fn dispatcher() -> Dispatcher {
    Dispatcher::from_config(&config(), DEVICE_ID)
}

#[test]
fn topics_follow_route_table_order() {
    let dispatcher = dispatcher();
    let topics: Vec<&str> = dispatcher.topics().collect();
    assert_eq!(topics, ["control", "sleep", "zvonenie", "call", "live", DEVICE_ID]);
}

#[test]
fn advertise_topic_is_publish_only() {
    assert_eq!(dispatcher().lookup("units"), None);
}

#[test]
fn routes_map_to_actions() {
    let d = dispatcher();
    assert_eq!(d.route("control", b"here"), Ok(Some(Action::AdvertiseIdentity)));
    assert_eq!(d.route("sleep", b"15"), Ok(Some(Action::Suspend { minutes: 15 })));
    assert_eq!(
        d.route("zvonenie", b"A"),
        Ok(Some(Action::Play {
            kind: SessionKind::Ringing,
            url: format!("{MEDIA_BASE}A"),
        }))
    );
    assert_eq!(
        d.route("call", b"B"),
        Ok(Some(Action::Play {
            kind: SessionKind::Call,
            url: format!("{MEDIA_BASE}B"),
        }))
    );
    assert_eq!(d.route(DEVICE_ID, b"diagnose"), Ok(Some(Action::Diagnose)));
}

#[test]
fn payload_is_taken_at_reported_length() {
    let d = dispatcher();
    let buffer = b"herexyz";
    assert_eq!(d.route("control", &buffer[..4]), Ok(Some(Action::AdvertiseIdentity)));
    assert_eq!(d.route("control", &buffer[..5]), Ok(None));
}

#[test]
fn bad_payloads_are_typed_errors() {
    let d = dispatcher();
    assert_eq!(d.route("sleep", b"soon"), Err(PayloadError::Sleep(SuspendError::NotANumber)));
    assert_eq!(d.route("sleep", b"-1"), Err(PayloadError::Sleep(SuspendError::NotPositive(-1))));
    assert_eq!(d.route("call", b""), Err(PayloadError::EmptyMedia(Route::Call)));
    assert_eq!(d.route(DEVICE_ID, b"reset"), Err(PayloadError::UnknownCommand));
    assert_eq!(d.route("zvonenie", &[0xFF, 0xFE]), Err(PayloadError::NotText));
}

#[test]
fn slovak_media_ids_reach_the_url_unchanged() {
    let d = dispatcher();
    let id = "zvonenie_\u{10d}.wav";
    assert_eq!(
        d.route("zvonenie", id.as_bytes()),
        Ok(Some(Action::Play {
            kind: SessionKind::Ringing,
            url: format!("{MEDIA_BASE}{id}"),
        }))
    );
    assert_eq!(
        d.route("live", "http://radio/\u{161}kola".as_bytes()),
        Ok(Some(Action::Play {
            kind: SessionKind::Live,
            url: "http://radio/\u{161}kola".to_owned(),
        }))
    );
}

#[test]
fn shared_topic_is_routed_by_first_row() {
    let mut cfg = config();
    cfg.topics.call = "zvonenie".to_owned();
    let d = Dispatcher::from_config(&cfg, DEVICE_ID);
    assert_eq!(d.lookup("zvonenie"), Some(Route::Ringing));
    assert_eq!(d.topics().filter(|t| *t == "zvonenie").count(), 1);
}
