//! End-to-end volume traces: elapsed seconds reported by the audio engine
//! in, volume commands and stop out.

use bellnode::adapters::ini_store::IniStore;
use bellnode::app::events::{AppEvent, StopReason};
use bellnode::fsm::StateId;

use crate::mock_hw::{CONFIG_INI, RecordingSink, TestController, ports, started};

/// Play `id` on the ringing topic and step the engine clock one second per
/// iteration until the stream stops or `limit` is reached.  Returns the
/// volume after each second and the second at which output stopped.
fn run_ringing(c: &mut TestController, sink: &mut RecordingSink, limit: u32) -> (Vec<u8>, Option<u32>) {
    c.network_mut().broker_mut().inject("zvonenie", b"A");
    c.iterate(sink);

    let mut trace = Vec::new();
    for t in 1..=limit {
        c.audio_mut().elapsed = t;
        c.iterate(sink);
        if !c.audio().running {
            return (trace, Some(t));
        }
        trace.push(c.audio().last_volume().unwrap_or(0));
    }
    (trace, None)
}

#[test]
fn ringing_holds_target_then_fades_one_unit_per_second() {
    let (mut c, mut sink) = started();
    let (trace, stopped_at) = run_ringing(&mut c, &mut sink, 120);

    // 25 through t=20, then 24 at t=21 down to 2 at t=43.
    let mut expected = vec![25u8; 20];
    expected.extend((2..=24).rev());
    assert_eq!(trace, expected);
    assert_eq!(stopped_at, Some(44));

    assert_eq!(c.audio().stops, 1);
    assert_eq!(c.state(), StateId::Idle);
    assert!(sink.events.contains(&AppEvent::PlaybackStopped(StopReason::FadeComplete)));
}

#[test]
fn ringing_enters_fading_state_at_threshold() {
    let (mut c, mut sink) = started();
    c.network_mut().broker_mut().inject("zvonenie", b"A");
    c.iterate(&mut sink);

    c.audio_mut().elapsed = 19;
    c.iterate(&mut sink);
    assert_eq!(c.state(), StateId::Playing);

    c.audio_mut().elapsed = 20;
    c.iterate(&mut sink);
    assert_eq!(c.state(), StateId::FadingOut);
}

#[test]
fn skipped_seconds_jump_straight_to_envelope_value() {
    let (mut c, mut sink) = started();
    c.network_mut().broker_mut().inject("zvonenie", b"A");
    c.iterate(&mut sink);

    c.audio_mut().elapsed = 30;
    c.iterate(&mut sink);
    assert_eq!(c.audio().last_volume(), Some(15));

    c.audio_mut().elapsed = 60;
    c.iterate(&mut sink);
    assert!(!c.audio().running);
}

#[test]
fn fade_in_ramps_two_units_per_second_to_target() {
    let text = CONFIG_INI.replace("fadeStart=20", "fadeStart=20\nfadeIn=true\nfadeInStep=2");
    let store = IniStore::parse(&text);
    let mut sink = RecordingSink::new();
    let mut c = match TestController::startup(&store, ports(), &mut sink) {
        Ok(c) => c,
        Err(e) => panic!("startup failed: {e}"),
    };

    c.network_mut().broker_mut().inject("zvonenie", b"A");
    c.iterate(&mut sink);
    assert_eq!(c.audio().last_volume(), Some(0));

    let (trace, stopped_at) = {
        let mut trace = Vec::new();
        let mut stopped_at = None;
        for t in 1..=60 {
            c.audio_mut().elapsed = t;
            c.iterate(&mut sink);
            if !c.audio().running {
                stopped_at = Some(t);
                break;
            }
            trace.push(c.audio().last_volume().unwrap_or(0));
        }
        (trace, stopped_at)
    };

    let ramp: Vec<u8> = (1..=12).map(|t| 2 * t).collect();
    assert_eq!(trace[..12], ramp[..]);
    assert!(trace[12..20].iter().all(|&v| v == 25));
    assert_eq!(trace[20], 24);
    assert_eq!(stopped_at, Some(44));
}

#[test]
fn call_and_live_sessions_never_fade() {
    for topic in ["call", "live"] {
        let (mut c, mut sink) = started();
        let payload: &[u8] = if topic == "live" { b"http://radio/x" } else { b"B" };
        c.network_mut().broker_mut().inject(topic, payload);
        c.iterate(&mut sink);

        for t in [20, 44, 300, 3_600] {
            c.audio_mut().elapsed = t;
            c.iterate(&mut sink);
        }
        assert_eq!(c.audio().last_volume(), Some(25), "{topic}");
        assert_eq!(c.state(), StateId::Playing, "{topic}");
    }
}
