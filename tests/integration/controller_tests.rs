//! Integration tests for the Controller → Dispatcher → Playback / Power
//! pipeline, driven end to end through mock ports.

use bellnode::adapters::ini_store::IniStore;
use bellnode::app::commands::SessionKind;
use bellnode::app::events::{AppEvent, StopReason};
use bellnode::app::ports::ConfigStoreError;
use bellnode::config::ConfigError;
use bellnode::error::Error;
use bellnode::fsm::StateId;

use crate::mock_hw::{
    CONFIG_INI, DEVICE_ID, MEDIA_BASE, RecordingSink, TestController, ports, started,
};

fn play(controller: &mut TestController, sink: &mut RecordingSink, topic: &str, payload: &[u8]) {
    controller.network_mut().broker_mut().inject(topic, payload);
    controller.iterate(sink);
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn startup_subscribes_every_route_once_and_advertises() {
    let (controller, sink) = started();
    let broker = controller.network().broker();

    assert_eq!(
        broker.subscribed,
        vec!["control", "sleep", "zvonenie", "call", "live", DEVICE_ID]
    );
    assert_eq!(broker.published_to("units"), vec![DEVICE_ID.as_bytes()]);
    assert_eq!(controller.state(), StateId::Idle);
    assert!(sink.events.contains(&AppEvent::Started {
        device_id: DEVICE_ID.to_owned()
    }));
}

#[test]
fn startup_applies_pins_and_target_volume() {
    let (controller, _) = started();
    let audio = controller.audio();
    assert_eq!(audio.pins, Some(controller.config().pins));
    assert_eq!(audio.volumes, vec![25]);
}

#[test]
fn startup_fails_when_store_lacks_url_section() {
    let store = IniStore::parse("[WiFi]\nssid=x\n[MQTT]\nbroker=y\n");
    let mut sink = RecordingSink::new();
    let err = TestController::startup(&store, ports(), &mut sink).err();
    assert_eq!(err, Some(Error::Store(ConfigStoreError::MissingSection("URL"))));
    assert!(sink.events.is_empty());
}

#[test]
fn startup_fails_without_ssid() {
    let store = IniStore::parse("[WiFi]\nssid=\n[MQTT]\nbroker=y\n[URL]\nsong=\n");
    let mut sink = RecordingSink::new();
    let err = TestController::startup(&store, ports(), &mut sink).err();
    assert_eq!(err, Some(Error::Config(ConfigError::MissingValue("WiFi.ssid"))));
}

#[test]
fn startup_fails_on_input_only_audio_pin() {
    let ini = format!("{CONFIG_INI}pinBclk=35\n");
    let store = IniStore::parse(&ini);
    let mut sink = RecordingSink::new();
    let err = TestController::startup(&store, ports(), &mut sink).err();
    assert_eq!(err, Some(Error::Config(ConfigError::OutOfRange("Audio.pinBclk"))));
}

// ── Playback routes ───────────────────────────────────────────

#[test]
fn ringing_opens_base_url_plus_identifier() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "zvonenie", b"A");

    assert_eq!(c.audio().opens, vec![format!("{MEDIA_BASE}A")]);
    assert_eq!(c.state(), StateId::Playing);
    assert_eq!(c.playback().session().map(|s| s.kind), Some(SessionKind::Ringing));
    assert!(sink.events.contains(&AppEvent::PlaybackStarted {
        kind: SessionKind::Ringing,
        attempts: 1
    }));
}

#[test]
fn call_holds_volume_until_end_of_stream() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "call", b"B");

    for t in 1..=120 {
        c.audio_mut().elapsed = t;
        c.iterate(&mut sink);
    }
    assert_eq!(c.state(), StateId::Playing);
    assert_eq!(c.audio().volumes, vec![25, 25]);

    c.audio_mut().running = false;
    c.iterate(&mut sink);
    assert_eq!(c.state(), StateId::Idle);
    assert!(sink.events.contains(&AppEvent::PlaybackStopped(StopReason::EndOfStream)));
}

#[test]
fn live_plays_payload_url_verbatim() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "live", b"http://radio.example/stream");
    assert_eq!(c.audio().opens, vec!["http://radio.example/stream"]);
    assert_eq!(c.playback().session().map(|s| s.kind), Some(SessionKind::Live));
}

#[test]
fn empty_media_identifier_starts_nothing() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "zvonenie", b"");
    assert!(c.audio().opens.is_empty());
    assert_eq!(c.state(), StateId::Idle);
}

#[test]
fn stream_open_gives_up_after_ten_attempts() {
    let (mut c, mut sink) = started();
    c.audio_mut().fail_opens = u32::MAX;
    play(&mut c, &mut sink, "zvonenie", b"A");

    assert_eq!(c.audio().opens.len(), 10);
    assert_eq!(c.state(), StateId::Idle);
    assert!(c.playback().session().is_none());
    assert!(sink.events.contains(&AppEvent::PlaybackAborted { attempts: 10 }));
    assert!(c.delay().total_ms() >= 100);

    // The loop keeps running afterwards.
    let before = c.iterations();
    c.iterate(&mut sink);
    assert_eq!(c.iterations(), before + 1);
}

#[test]
fn stream_that_opens_late_still_plays() {
    let (mut c, mut sink) = started();
    c.audio_mut().fail_opens = 3;
    play(&mut c, &mut sink, "call", b"B");
    assert_eq!(c.audio().opens.len(), 4);
    assert_eq!(c.state(), StateId::Playing);
    assert_eq!(c.playback().session().map(|s| s.retry_count), Some(4));
}

#[test]
fn new_request_replaces_active_session() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "zvonenie", b"A");
    play(&mut c, &mut sink, "call", b"B");

    assert_eq!(c.audio().stops, 1);
    assert_eq!(c.audio().opens.len(), 2);
    assert_eq!(
        c.playback().session().map(|s| s.url.clone()),
        Some(format!("{MEDIA_BASE}B"))
    );
    assert!(sink.events.contains(&AppEvent::PlaybackStopped(StopReason::Replaced)));
}

// ── Identity ──────────────────────────────────────────────────

#[test]
fn here_on_control_publishes_identity_exactly_once() {
    let (mut c, mut sink) = started();
    sink.clear();
    play(&mut c, &mut sink, "control", b"here");

    assert_eq!(c.network().broker().published_to("units").len(), 2);
    assert_eq!(sink.count(|e| *e == AppEvent::IdentityPublished), 1);
}

#[test]
fn here_on_other_topics_never_advertises() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "sleep", b"here");
    play(&mut c, &mut sink, DEVICE_ID, b"here");
    play(&mut c, &mut sink, "control", b"HERE");
    play(&mut c, &mut sink, "units", b"here");

    assert_eq!(c.network().broker().published_to("units").len(), 1);
    assert_eq!(c.power().sleeps, 0);
    assert!(!c.is_suspended());
}

// ── Sleep ─────────────────────────────────────────────────────

#[test]
fn sleep_arms_timer_for_whole_minutes() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "sleep", b"5");

    assert_eq!(c.power().armed_us, vec![300_000_000]);
    assert_eq!(c.power().sleeps, 1);
    assert!(c.is_suspended());
    assert!(sink.events.contains(&AppEvent::SuspendScheduled { minutes: 5 }));

    let iterations = c.iterations();
    c.iterate(&mut sink);
    assert_eq!(c.iterations(), iterations, "nothing runs after suspend");
}

#[test]
fn sleep_stops_playback_before_suspending() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "zvonenie", b"A");
    play(&mut c, &mut sink, "sleep", b"1");

    assert_eq!(c.audio().stops, 1);
    let stopped = sink
        .events
        .iter()
        .position(|e| *e == AppEvent::PlaybackStopped(StopReason::Suspend));
    let scheduled = sink
        .events
        .iter()
        .position(|e| *e == AppEvent::SuspendScheduled { minutes: 1 });
    assert!(stopped.is_some() && scheduled.is_some());
    assert!(stopped < scheduled);
}

#[test]
fn malformed_sleep_payloads_are_rejected() {
    let (mut c, mut sink) = started();
    for payload in [&b"0"[..], &b"-3"[..], &b"abc"[..], &b""[..], &b" "[..]] {
        play(&mut c, &mut sink, "sleep", payload);
    }
    assert!(c.power().armed_us.is_empty());
    assert_eq!(c.power().sleeps, 0);
    assert!(!c.is_suspended());
    assert_eq!(sink.count(|e| *e == AppEvent::SuspendRejected), 5);
}

#[test]
fn rejected_wake_timer_keeps_device_awake() {
    let (mut c, mut sink) = started();
    c.power_mut().reject = true;
    play(&mut c, &mut sink, "sleep", b"5");
    assert_eq!(c.power().sleeps, 0);
    assert!(!c.is_suspended());
}

// ── Diagnose / ignored ────────────────────────────────────────

#[test]
fn diagnose_publishes_json_report() {
    let (mut c, mut sink) = started();
    play(&mut c, &mut sink, "zvonenie", b"A");
    play(&mut c, &mut sink, DEVICE_ID, b"diagnose");

    let topic = format!("diagnose/{DEVICE_ID}");
    let reports = c.network().broker().published_to(&topic);
    assert_eq!(reports.len(), 1);

    let v: serde_json::Value = serde_json::from_slice(reports[0]).unwrap();
    assert_eq!(v["device_id"], DEVICE_ID);
    assert_eq!(v["ip"], "192.168.88.40");
    assert_eq!(v["broker_connected"], true);
    assert_eq!(v["last_reconnect_ms"], 0);
    assert_eq!(v["playback"]["state"], "playing");
    assert_eq!(v["playback"]["kind"], "ringing");
    assert_eq!(v["playback"]["volume"], 25);
    assert!(sink.events.contains(&AppEvent::DiagnosticsPublished));
}

#[test]
fn unknown_device_command_is_ignored() {
    let (mut c, mut sink) = started();
    sink.clear();
    play(&mut c, &mut sink, DEVICE_ID, b"reboot");
    assert_eq!(sink.count(|e| *e == AppEvent::MessageIgnored), 1);
    assert!(c.network().broker().published_to(&format!("diagnose/{DEVICE_ID}")).is_empty());
}

#[test]
fn messages_are_handled_in_arrival_order() {
    let (mut c, mut sink) = started();
    let broker = c.network_mut().broker_mut();
    broker.inject("zvonenie", b"A");
    broker.inject("call", b"B");
    broker.inject("live", b"http://radio/x");
    c.iterate(&mut sink);

    assert_eq!(
        c.audio().opens,
        vec![format!("{MEDIA_BASE}A"), format!("{MEDIA_BASE}B"), "http://radio/x".to_owned()]
    );
    assert_eq!(c.playback().session().map(|s| s.kind), Some(SessionKind::Live));
}

#[test]
fn config_file_round_trips_into_controller() {
    let (c, _) = started();
    let store = IniStore::parse(CONFIG_INI);
    assert_eq!(c.config().media_base_url, MEDIA_BASE);
    assert_eq!(c.config().broker.port, 1884);
    assert!(store.unknown_keys().is_empty());
}
