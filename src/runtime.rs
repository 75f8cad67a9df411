//! Terminal event plumbing for the app loop.
//!
//! [`Runner::step`] interleaves terminal input with ticks on a fixed cadence:
//! a steady stream of key presses never postpones the next tick, and the
//! session engine relies on those ticks to fire its timers.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

pub const TICK_RATE_MS: u64 = 100;

/// Unified event type consumed by the app loop
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Map a raw terminal event to the app's vocabulary. Key releases and
/// repeats (reported on Windows) are dropped so one press is one action.
pub fn translate(event: CtEvent) -> Option<AppEvent> {
    match event {
        CtEvent::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        CtEvent::Resize(_, _) => Some(AppEvent::Resize),
        _ => None,
    }
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source: a reader thread forwarding crossterm events
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || read_terminal(tx));
        Self { rx }
    }
}

fn read_terminal(tx: Sender<AppEvent>) {
    loop {
        let event = match event::read() {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "terminal event reader stopped");
                return;
            }
        };
        if let Some(event) = translate(event) {
            if tx.send(event).is_err() {
                return;
            }
        }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable tick cadence
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_RATE_MS))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed event source for headless runs
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }

    pub fn channel() -> (Sender<AppEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Yields terminal events in arrival order and a `Tick` every interval
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Instant,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Instant::now() + ticker.interval();
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    fn tick(&mut self, now: Instant) -> AppEvent {
        self.next_tick = now + self.ticker.interval();
        AppEvent::Tick
    }

    /// Next event, or `Tick` once the tick deadline has passed
    pub fn step(&mut self) -> AppEvent {
        let now = Instant::now();
        if now >= self.next_tick {
            return self.tick(now);
        }

        let wait = self.next_tick - now;
        match self.event_source.recv_timeout(wait) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => self.tick(Instant::now()),
            Err(RecvTimeoutError::Disconnected) => {
                // no more input: keep ticking at the regular pace
                std::thread::sleep(wait);
                self.tick(Instant::now())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, es) = TestEventSource::channel();
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(1)));

        match runner.step() {
            AppEvent::Tick => {}
            other => panic!("expected Tick on timeout, got {other:?}"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, es) = TestEventSource::channel();
        tx.send(AppEvent::Resize).unwrap();
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(50)));

        match runner.step() {
            AppEvent::Resize => {}
            other => panic!("expected Resize event, got {other:?}"),
        }
    }

    #[test]
    fn queued_events_do_not_postpone_the_tick() {
        let (tx, es) = TestEventSource::channel();
        for _ in 0..10 {
            tx.send(AppEvent::Resize).unwrap();
        }
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(20));

        assert!(matches!(runner.step(), AppEvent::Tick));
        assert!(matches!(runner.step(), AppEvent::Resize));
    }

    #[test]
    fn disconnected_source_still_ticks() {
        let (tx, es) = TestEventSource::channel();
        drop(tx);
        let mut runner = Runner::new(es, FixedTicker::new(Duration::from_millis(5)));

        let started = Instant::now();
        assert!(matches!(runner.step(), AppEvent::Tick));
        assert!(matches!(runner.step(), AppEvent::Tick));
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn translate_keeps_presses_and_resizes() {
        let press = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        assert!(matches!(
            translate(CtEvent::Key(press)),
            Some(AppEvent::Key(k)) if k.code == KeyCode::Char(' ')
        ));

        let release = KeyEvent::new_with_kind_and_state(
            KeyCode::Char(' '),
            KeyModifiers::NONE,
            KeyEventKind::Release,
            KeyEventState::NONE,
        );
        assert!(translate(CtEvent::Key(release)).is_none());
        assert!(matches!(
            translate(CtEvent::Resize(80, 24)),
            Some(AppEvent::Resize)
        ));
        assert!(translate(CtEvent::FocusGained).is_none());
    }

    #[test]
    fn default_ticker_uses_tick_rate() {
        assert_eq!(
            FixedTicker::default().interval(),
            Duration::from_millis(TICK_RATE_MS)
        );
    }
}
