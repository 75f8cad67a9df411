//! The breathing-session phase machine.
//!
//! A session walks through `total_rounds` rounds of paced breathing, a
//! freeform breath hold and a recovery hold. The engine owns a single
//! phase-tagged [`Timer`]; every transition replaces it, so a timer armed for
//! one phase can never fire into the next. Time only moves when the owner
//! calls [`BreathingSessionEngine::on_tick`], and all elapsed values are
//! derived from [`Clock`] deltas rather than from counting ticks.

use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::report::{Report, ReportDispatcher};
use crate::session::{
    Phase, RoundResult, SessionConfig, SessionError, SessionSnapshot, SessionState,
    SessionSummary,
};

const TICK: Duration = Duration::from_secs(1);

/// Discrete animation cues for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Inhale,
    Exhale,
    HoldTick,
    RecoveryTick,
    RoundAdvance,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Snapshot(SessionSnapshot),
    Cue(Cue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    /// One inhale/exhale cycle; `exhaled` flips at the midpoint
    BreathCycle { started: Instant, exhaled: bool },
    HoldTick { next: Instant },
    RecoveryTick { next: Instant },
    /// Rest between a recovery and the next round's first breath
    InterRound { due: Instant },
}

impl Timer {
    fn deadline(&self, cycle: Duration) -> Instant {
        match *self {
            Timer::BreathCycle {
                started,
                exhaled: false,
            } => started + cycle / 2,
            Timer::BreathCycle {
                started,
                exhaled: true,
            } => started + cycle,
            Timer::HoldTick { next } | Timer::RecoveryTick { next } => next,
            Timer::InterRound { due } => due,
        }
    }

    fn phase(&self) -> Phase {
        match self {
            Timer::BreathCycle { .. } | Timer::InterRound { .. } => Phase::Breathing,
            Timer::HoldTick { .. } => Phase::Holding,
            Timer::RecoveryTick { .. } => Phase::Recovery,
        }
    }
}

#[derive(Debug)]
struct ActiveSession {
    config: SessionConfig,
    state: SessionState,
    /// Start of the current hold or recovery, shifted forward on resume
    phase_started: Instant,
}

fn whole_seconds(now: Instant, since: Instant) -> u64 {
    now.saturating_duration_since(since).as_secs()
}

/// Phase start that makes `whole_seconds(now, start) == elapsed`
fn rewind(now: Instant, elapsed: u64) -> Instant {
    now.checked_sub(Duration::from_secs(elapsed)).unwrap_or(now)
}

pub struct BreathingSessionEngine<C: Clock = SystemClock> {
    clock: C,
    reporter: Option<ReportDispatcher>,
    selected_rounds: Option<u32>,
    session: Option<ActiveSession>,
    /// Phase reported while no session exists: Idle or Stopped
    resting_phase: Phase,
    timer: Option<Timer>,
    events: Vec<SessionEvent>,
}

impl<C: Clock> BreathingSessionEngine<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            reporter: None,
            selected_rounds: None,
            session: None,
            resting_phase: Phase::Idle,
            timer: None,
            events: Vec::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: ReportDispatcher) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn phase(&self) -> Phase {
        self.session
            .as_ref()
            .map_or(self.resting_phase, |s| s.state.phase)
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.state.paused)
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    pub fn round_results(&self) -> &[RoundResult] {
        self.session
            .as_ref()
            .map_or(&[], |s| s.state.round_results.as_slice())
    }

    pub fn selected_rounds(&self) -> Option<u32> {
        self.selected_rounds
    }

    /// Remember the round count chosen before a session starts
    pub fn select_rounds(&mut self, rounds: u32) -> Result<(), SessionError> {
        if rounds < 1 {
            return Err(SessionError::NoRounds(rounds));
        }
        self.selected_rounds = Some(rounds);
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.session {
            Some(s) => SessionSnapshot {
                phase: s.state.phase,
                current_round: s.state.current_round,
                total_rounds: s.config.total_rounds,
                current_breath: s.state.current_breath,
                breaths_per_round: s.config.breaths_per_round,
                elapsed_hold_seconds: s.state.elapsed_hold_seconds,
                elapsed_recovery_seconds: s.state.elapsed_recovery_seconds,
                round_results: s.state.round_results.clone(),
                paused: s.state.paused,
            },
            None => SessionSnapshot::idle(self.resting_phase),
        }
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        self.session
            .as_ref()
            .map(|s| SessionSummary::from_results(&s.config, &s.state.round_results))
    }

    /// Fraction of the current breath cycle elapsed, while a breath is running
    pub fn breath_progress(&self) -> Option<f64> {
        let (Some(Timer::BreathCycle { started, .. }), Some(session)) =
            (self.timer, self.session.as_ref())
        else {
            return None;
        };
        let elapsed = self.clock.now().saturating_duration_since(started);
        Some((elapsed.as_secs_f64() / session.config.breath_cycle.as_secs_f64()).min(1.0))
    }

    /// Take every event queued since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn start(&mut self, config: SessionConfig) -> Result<(), SessionError> {
        if self.phase().is_active() {
            debug!(phase = %self.phase(), "start ignored, a session is already running");
            return Ok(());
        }
        config.validate()?;

        let now = self.clock.now();
        self.timer = None;
        self.session = Some(ActiveSession {
            config,
            state: SessionState::default(),
            phase_started: now,
        });
        info!(
            rounds = config.total_rounds,
            breaths_per_round = config.breaths_per_round,
            cycle_ms = config.breath_cycle.as_millis() as u64,
            "session started"
        );
        self.report(Report::SessionStarted(config));
        self.emit_snapshot();
        self.begin_breath(now);
        Ok(())
    }

    /// Fire every timer that is due by now
    pub fn on_tick(&mut self) {
        let now = self.clock.now();
        while let Some(timer) = self.timer {
            let Some(session) = &self.session else {
                self.timer = None;
                break;
            };
            if session.state.paused {
                self.timer = None;
                break;
            }
            if timer.phase() != session.state.phase {
                debug!(?timer, phase = %session.state.phase, "stale timer dropped");
                self.timer = None;
                break;
            }
            let deadline = timer.deadline(session.config.breath_cycle);
            if deadline > now {
                break;
            }
            self.fire(timer, deadline, now);
        }
    }

    fn fire(&mut self, timer: Timer, deadline: Instant, now: Instant) {
        match timer {
            Timer::BreathCycle {
                started,
                exhaled: false,
            } => {
                self.timer = Some(Timer::BreathCycle {
                    started,
                    exhaled: true,
                });
                self.cue(Cue::Exhale);
            }
            Timer::BreathCycle { exhaled: true, .. } => self.finish_breath(deadline),
            Timer::HoldTick { .. } => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let elapsed = whole_seconds(now, session.phase_started);
                session.state.elapsed_hold_seconds = elapsed;
                self.timer = Some(Timer::HoldTick {
                    next: session.phase_started + TICK * (elapsed as u32 + 1),
                });
                self.cue(Cue::HoldTick);
                self.emit_snapshot();
            }
            Timer::RecoveryTick { .. } => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let elapsed = whole_seconds(now, session.phase_started);
                session.state.elapsed_recovery_seconds = elapsed;
                self.timer = Some(Timer::RecoveryTick {
                    next: session.phase_started + TICK * (elapsed as u32 + 1),
                });
                self.cue(Cue::RecoveryTick);
                self.emit_snapshot();
            }
            Timer::InterRound { due } => self.begin_breath(due),
        }
    }

    fn begin_breath(&mut self, at: Instant) {
        if let Some(session) = &self.session {
            debug!(
                round = session.state.current_round,
                breath = session.state.current_breath,
                "breath"
            );
        }
        self.timer = Some(Timer::BreathCycle {
            started: at,
            exhaled: false,
        });
        self.cue(Cue::Inhale);
    }

    fn finish_breath(&mut self, at: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state.current_breath < session.config.breaths_per_round {
            session.state.current_breath += 1;
            self.emit_snapshot();
            self.begin_breath(at);
        } else {
            self.enter_holding(at);
        }
    }

    fn enter_holding(&mut self, at: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.state.phase = Phase::Holding;
        session.state.elapsed_hold_seconds = 0;
        session.phase_started = at;
        let round = session.state.current_round;
        self.timer = Some(Timer::HoldTick { next: at + TICK });
        info!(round, "hold started");
        self.report(Report::HoldStarted { round });
        self.emit_snapshot();
    }

    /// End the breath hold; ignored unless holding
    pub fn confirm_hold_end(&mut self) {
        if self.phase() != Phase::Holding {
            debug!(phase = %self.phase(), "hold end ignored");
            return;
        }
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.state.paused {
            session.state.elapsed_hold_seconds = whole_seconds(now, session.phase_started);
        }
        self.timer = None;

        let round = session.state.current_round;
        let hold_seconds = session.state.elapsed_hold_seconds;
        session.state.round_results.push(RoundResult {
            round_number: round,
            hold_seconds,
            recovery_seconds: 0,
        });
        session.state.phase = Phase::Recovery;
        session.state.paused = false;
        session.state.elapsed_recovery_seconds = 0;
        session.phase_started = now;
        self.timer = Some(Timer::RecoveryTick { next: now + TICK });

        info!(round, hold_seconds, "hold ended");
        self.report(Report::HoldEnded {
            round,
            hold_seconds,
        });
        self.emit_snapshot();
    }

    /// End the recovery hold; ignored unless recovering
    pub fn confirm_recovery_end(&mut self) {
        if self.phase() != Phase::Recovery {
            debug!(phase = %self.phase(), "recovery end ignored");
            return;
        }
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.state.paused {
            session.state.elapsed_recovery_seconds = whole_seconds(now, session.phase_started);
        }
        self.timer = None;

        let round = session.state.current_round;
        let recovery_seconds = session.state.elapsed_recovery_seconds;
        if let Some(last) = session.state.round_results.last_mut() {
            last.recovery_seconds = recovery_seconds;
        }

        let finished = round >= session.config.total_rounds;
        if !finished {
            session.state.current_round += 1;
            session.state.current_breath = 1;
            session.state.phase = Phase::Breathing;
            session.state.paused = false;
            self.timer = Some(Timer::InterRound {
                due: now + session.config.inter_round_delay,
            });
        }

        info!(round, recovery_seconds, "recovery ended");
        self.report(Report::RecoveryEnded {
            round,
            recovery_seconds,
        });

        if finished {
            self.complete();
        } else {
            self.cue(Cue::RoundAdvance);
            self.emit_snapshot();
        }
    }

    fn complete(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.state.phase = Phase::Complete;
        session.state.paused = false;
        self.timer = None;

        if let Some(summary) = self.summary() {
            info!(
                rounds = summary.rounds,
                total_hold_seconds = summary.total_hold_seconds,
                average_hold_seconds = summary.average_hold_seconds,
                "session complete"
            );
        }
        self.report(Report::Completed);
        self.cue(Cue::Complete);
        self.emit_snapshot();
    }

    pub fn pause(&mut self) {
        if !self.phase().is_active() || self.is_paused() {
            return;
        }
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.state.phase {
            Phase::Holding => {
                session.state.elapsed_hold_seconds = whole_seconds(now, session.phase_started)
            }
            Phase::Recovery => {
                session.state.elapsed_recovery_seconds = whole_seconds(now, session.phase_started)
            }
            _ => {}
        }
        session.state.paused = true;
        self.timer = None;
        debug!(phase = %session.state.phase, "paused");
        self.emit_snapshot();
    }

    pub fn resume(&mut self) {
        if !self.phase().is_active() || !self.is_paused() {
            return;
        }
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.state.paused = false;
        debug!(phase = %session.state.phase, "resumed");

        match session.state.phase {
            Phase::Breathing => {
                self.emit_snapshot();
                // The current breath restarts from its inhale; the count is kept.
                self.begin_breath(now);
            }
            Phase::Holding => {
                let elapsed = session.state.elapsed_hold_seconds;
                session.phase_started = rewind(now, elapsed);
                self.timer = Some(Timer::HoldTick {
                    next: session.phase_started + TICK * (elapsed as u32 + 1),
                });
                self.emit_snapshot();
            }
            Phase::Recovery => {
                let elapsed = session.state.elapsed_recovery_seconds;
                session.phase_started = rewind(now, elapsed);
                self.timer = Some(Timer::RecoveryTick {
                    next: session.phase_started + TICK * (elapsed as u32 + 1),
                });
                self.emit_snapshot();
            }
            _ => {}
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Abandon the session; the in-progress round is not recorded
    pub fn stop(&mut self) {
        let phase = self.phase();
        if matches!(phase, Phase::Idle | Phase::Stopped) {
            return;
        }
        self.timer = None;
        self.session = None;
        self.resting_phase = Phase::Stopped;
        if phase.is_active() {
            info!(%phase, "session stopped");
            self.report(Report::Cancelled);
        }
        self.emit_snapshot();
    }

    /// Back to the selection state, stopping any running session first
    pub fn reset(&mut self) {
        self.stop();
        self.session = None;
        self.resting_phase = Phase::Idle;
        self.selected_rounds = None;
        self.events.clear();
        self.emit_snapshot();
    }

    /// Flush pending reports and drop the engine
    pub fn shutdown(mut self) {
        if let Some(reporter) = self.reporter.take() {
            reporter.shutdown();
        }
    }

    fn report(&self, report: Report) {
        if let Some(reporter) = &self.reporter {
            reporter.send(report);
        }
    }

    fn cue(&mut self, cue: Cue) {
        self.events.push(SessionEvent::Cue(cue));
    }

    fn emit_snapshot(&mut self) {
        let snapshot = self.snapshot();
        self.events.push(SessionEvent::Snapshot(snapshot));
    }
}
