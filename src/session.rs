use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BREATHS_PER_ROUND: u32 = 30;
pub const DEFAULT_BREATH_CYCLE_MS: u64 = 3550;
pub const DEFAULT_INTER_ROUND_DELAY_MS: u64 = 2000;

/// Rejected session parameters. Nothing is created when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a session needs at least one round (got {0})")]
    NoRounds(u32),
    #[error("a round needs at least one breath (got {0})")]
    NoBreaths(u32),
    #[error("breath cycle duration must be greater than zero")]
    ZeroBreathCycle,
}

/// Parameters of one breathing session, fixed once the session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub total_rounds: u32,
    pub breaths_per_round: u32,
    pub breath_cycle: Duration,
    pub inter_round_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_rounds: 1,
            breaths_per_round: DEFAULT_BREATHS_PER_ROUND,
            breath_cycle: Duration::from_millis(DEFAULT_BREATH_CYCLE_MS),
            inter_round_delay: Duration::from_millis(DEFAULT_INTER_ROUND_DELAY_MS),
        }
    }
}

impl SessionConfig {
    pub fn with_rounds(total_rounds: u32) -> Self {
        Self {
            total_rounds,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.total_rounds < 1 {
            return Err(SessionError::NoRounds(self.total_rounds));
        }
        if self.breaths_per_round < 1 {
            return Err(SessionError::NoBreaths(self.breaths_per_round));
        }
        if self.breath_cycle.is_zero() {
            return Err(SessionError::ZeroBreathCycle);
        }
        Ok(())
    }

    /// Time spent in paced breathing alone, holds and recovery excluded
    pub fn planned_breathing_duration(&self) -> Duration {
        self.breath_cycle * self.total_rounds * self.breaths_per_round
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_number: u32,
    pub hold_seconds: u64,
    pub recovery_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Phase {
    Idle,
    Breathing,
    Holding,
    Recovery,
    Complete,
    Stopped,
}

impl Phase {
    /// Breathing, Holding and Recovery: the phases a session can be paused or stopped in
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Breathing | Phase::Holding | Phase::Recovery)
    }
}

/// Mutable state of the live session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub current_round: u32,
    pub current_breath: u32,
    pub elapsed_hold_seconds: u64,
    pub elapsed_recovery_seconds: u64,
    pub round_results: Vec<RoundResult>,
    pub paused: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Breathing,
            current_round: 1,
            current_breath: 1,
            elapsed_hold_seconds: 0,
            elapsed_recovery_seconds: 0,
            round_results: Vec::new(),
            paused: false,
        }
    }
}

/// Point-in-time copy of the engine state handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub current_round: u32,
    pub total_rounds: u32,
    pub current_breath: u32,
    pub breaths_per_round: u32,
    pub elapsed_hold_seconds: u64,
    pub elapsed_recovery_seconds: u64,
    pub round_results: Vec<RoundResult>,
    pub paused: bool,
}

impl SessionSnapshot {
    pub fn idle(phase: Phase) -> Self {
        Self {
            phase,
            current_round: 0,
            total_rounds: 0,
            current_breath: 0,
            breaths_per_round: 0,
            elapsed_hold_seconds: 0,
            elapsed_recovery_seconds: 0,
            round_results: Vec::new(),
            paused: false,
        }
    }
}

/// Aggregates shown once a session is complete
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub rounds: u32,
    pub total_breaths: u32,
    pub total_hold_seconds: u64,
    pub average_hold_seconds: f64,
    pub longest_hold_seconds: u64,
}

impl SessionSummary {
    pub fn from_results(config: &SessionConfig, results: &[RoundResult]) -> Self {
        let holds = results
            .iter()
            .map(|r| r.hold_seconds as f64)
            .collect::<Vec<f64>>();
        let total_hold_seconds = results.iter().map(|r| r.hold_seconds).sum();

        Self {
            rounds: results.len() as u32,
            total_breaths: config.breaths_per_round * results.len() as u32,
            total_hold_seconds,
            average_hold_seconds: crate::util::mean(&holds).unwrap_or(0.0),
            longest_hold_seconds: results.iter().map(|r| r.hold_seconds).max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_config_matches_the_classic_protocol() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.breaths_per_round, 30);
        assert_eq!(cfg.breath_cycle, Duration::from_millis(3550));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_rounds() {
        let cfg = SessionConfig::with_rounds(0);
        assert_matches!(cfg.validate(), Err(SessionError::NoRounds(0)));
    }

    #[test]
    fn validate_rejects_zero_breaths_and_zero_cycle() {
        let cfg = SessionConfig {
            breaths_per_round: 0,
            ..SessionConfig::default()
        };
        assert_matches!(cfg.validate(), Err(SessionError::NoBreaths(0)));

        let cfg = SessionConfig {
            breath_cycle: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert_matches!(cfg.validate(), Err(SessionError::ZeroBreathCycle));
    }

    #[test]
    fn planned_duration_multiplies_rounds_breaths_and_cycle() {
        let cfg = SessionConfig::with_rounds(3);
        assert_eq!(cfg.planned_breathing_duration(), Duration::from_millis(3 * 30 * 3550));
    }

    #[test]
    fn summary_of_empty_results_is_zero() {
        let summary = SessionSummary::from_results(&SessionConfig::default(), &[]);
        assert_eq!(summary.total_hold_seconds, 0);
        assert_eq!(summary.average_hold_seconds, 0.0);
        assert_eq!(summary.longest_hold_seconds, 0);
    }

    #[test]
    fn summary_sums_and_averages_holds() {
        let results = [
            RoundResult {
                round_number: 1,
                hold_seconds: 60,
                recovery_seconds: 15,
            },
            RoundResult {
                round_number: 2,
                hold_seconds: 90,
                recovery_seconds: 15,
            },
        ];
        let summary = SessionSummary::from_results(&SessionConfig::with_rounds(2), &results);
        assert_eq!(summary.total_hold_seconds, 150);
        assert_eq!(summary.average_hold_seconds, 75.0);
        assert_eq!(summary.longest_hold_seconds, 90);
        assert_eq!(summary.total_breaths, 60);
    }

    #[test]
    fn phase_display_and_activity() {
        assert_eq!(Phase::Holding.to_string(), "Holding");
        assert!(Phase::Recovery.is_active());
        assert!(!Phase::Complete.is_active());
        assert!(!Phase::Idle.is_active());
    }
}
