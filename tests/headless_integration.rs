use std::sync::mpsc;
use std::time::Duration;

use breathwork::clock::ManualClock;
use breathwork::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use breathwork::{BreathingSessionEngine, Cue, Phase, SessionConfig, SessionEvent};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const TICK_MS: u64 = 100;

fn space() -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE))
}

fn short_config(rounds: u32) -> SessionConfig {
    SessionConfig {
        total_rounds: rounds,
        breaths_per_round: 3,
        breath_cycle: Duration::from_millis(200),
        inter_round_delay: Duration::from_millis(300),
    }
}

// Headless run of the engine through Runner/TestEventSource without a TTY.
// Every Tick moves the manual clock by 100 ms; the "user" presses space once
// the hold or recovery has lasted long enough. A tick or two may slip in
// before the key is read, which stays inside the same whole second.
#[test]
fn headless_session_completes() {
    let clock = ManualClock::new();
    let mut engine = BreathingSessionEngine::new(clock.clone());

    let (tx, rx) = mpsc::channel();
    let mut runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    engine.start(short_config(2)).unwrap();
    let mut pressed_in: Option<(u32, Phase)> = None;
    let mut cues = Vec::new();

    for _ in 0..1000u32 {
        match runner.step() {
            AppEvent::Tick => {
                clock.advance_ms(TICK_MS);
                engine.on_tick();
            }
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                if key.code == KeyCode::Char(' ') {
                    match engine.phase() {
                        Phase::Holding => engine.confirm_hold_end(),
                        Phase::Recovery => engine.confirm_recovery_end(),
                        _ => {}
                    }
                }
            }
        }

        for event in engine.drain_events() {
            if let SessionEvent::Cue(cue) = event {
                cues.push(cue);
            }
        }

        let snapshot = engine.snapshot();
        let ready = match snapshot.phase {
            Phase::Holding => snapshot.elapsed_hold_seconds >= 3,
            Phase::Recovery => snapshot.elapsed_recovery_seconds >= 2,
            Phase::Complete => break,
            _ => false,
        };
        let key = (snapshot.current_round, snapshot.phase);
        if ready && pressed_in != Some(key) {
            pressed_in = Some(key);
            tx.send(space()).unwrap();
        }
    }

    assert_eq!(engine.phase(), Phase::Complete);
    let results = engine.round_results();
    assert_eq!(results.len(), 2);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.round_number, i as u32 + 1);
        assert_eq!(result.hold_seconds, 3);
        assert_eq!(result.recovery_seconds, 2);
    }

    let inhales = cues.iter().filter(|c| **c == Cue::Inhale).count();
    let exhales = cues.iter().filter(|c| **c == Cue::Exhale).count();
    assert_eq!(inhales, 6);
    assert_eq!(exhales, 6);
    assert_eq!(cues.iter().filter(|c| **c == Cue::RoundAdvance).count(), 1);
    assert_eq!(cues.last(), Some(&Cue::Complete));
}

#[test]
fn headless_keys_outside_holds_are_ignored() {
    let clock = ManualClock::new();
    let mut engine = BreathingSessionEngine::new(clock.clone());

    let (tx, es) = TestEventSource::channel();
    let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(50)));

    engine.start(short_config(1)).unwrap();
    for _ in 0..5 {
        tx.send(space()).unwrap();
    }

    for _ in 0..5u32 {
        if let AppEvent::Key(_) = runner.step() {
            engine.confirm_hold_end();
            engine.confirm_recovery_end();
        }
    }

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, Phase::Breathing);
    assert_eq!(snapshot.current_breath, 1);
    assert!(snapshot.round_results.is_empty());
}

#[test]
fn headless_pause_freezes_the_hold_timer() {
    let clock = ManualClock::new();
    let mut engine = BreathingSessionEngine::new(clock.clone());

    let (_tx, es) = TestEventSource::channel();
    let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(1)));

    engine.start(short_config(1)).unwrap();
    let mut tick = |engine: &mut BreathingSessionEngine<ManualClock>, n: u32| {
        for _ in 0..n {
            if let AppEvent::Tick = runner.step() {
                clock.advance_ms(TICK_MS);
                engine.on_tick();
            }
        }
    };

    // three 200 ms breaths, then 2 s into the hold
    tick(&mut engine, 6 + 20);
    assert_eq!(engine.phase(), Phase::Holding);
    assert_eq!(engine.snapshot().elapsed_hold_seconds, 2);

    engine.pause();
    tick(&mut engine, 50);
    assert_eq!(engine.snapshot().elapsed_hold_seconds, 2);

    engine.resume();
    tick(&mut engine, 10);
    engine.confirm_hold_end();
    assert_eq!(engine.round_results()[0].hold_seconds, 3);
}
