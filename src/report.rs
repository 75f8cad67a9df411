//! Best-effort reporting of session progress to an external collaborator.
//!
//! The engine never talks to a [`Reporter`] directly. It hands [`Report`]s to a
//! [`ReportDispatcher`], which forwards them in order to a single worker
//! thread. Reporter latency or failure therefore never holds up a phase
//! transition, and a failed `create_session` leaves the rest of that session
//! in offline mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::SessionConfig;

/// Identifier handed out by a reporter for a created session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("reporter unavailable: {0}")]
    Unavailable(String),
    #[error("reporter rejected {what}: {reason}")]
    Rejected { what: &'static str, reason: String },
    #[error("history storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("history file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session logging collaborator (a REST backend, a local database, ...)
pub trait Reporter: Send + 'static {
    fn create_session(&mut self, config: &SessionConfig) -> Result<SessionId, ReportError>;

    fn report_hold_start(&mut self, _session: &SessionId, _round: u32) -> Result<(), ReportError> {
        Ok(())
    }

    fn report_hold_end(
        &mut self,
        session: &SessionId,
        round: u32,
        hold_seconds: u64,
    ) -> Result<(), ReportError>;

    fn report_recovery_end(
        &mut self,
        session: &SessionId,
        round: u32,
        recovery_seconds: u64,
    ) -> Result<(), ReportError>;

    fn report_complete(&mut self, session: &SessionId) -> Result<(), ReportError>;

    fn report_cancelled(&mut self, _session: &SessionId) -> Result<(), ReportError> {
        Ok(())
    }
}

/// One engine event destined for the reporter
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    SessionStarted(SessionConfig),
    HoldStarted { round: u32 },
    HoldEnded { round: u32, hold_seconds: u64 },
    RecoveryEnded { round: u32, recovery_seconds: u64 },
    Completed,
    Cancelled,
}

struct ReportWorker<R: Reporter> {
    reporter: R,
    session: Option<SessionId>,
}

impl<R: Reporter> ReportWorker<R> {
    fn run(mut self, rx: Receiver<Report>) {
        while let Ok(report) = rx.recv() {
            self.handle(report);
        }
        debug!("report channel closed, worker exiting");
    }

    fn handle(&mut self, report: Report) {
        if let Report::SessionStarted(config) = &report {
            self.session = match self.reporter.create_session(config) {
                Ok(id) => {
                    info!(session = %id, "session registered");
                    Some(id)
                }
                Err(err) => {
                    warn!(error = %err, "could not register session, continuing offline");
                    None
                }
            };
            return;
        }

        let Some(id) = &self.session else {
            debug!(?report, "offline, report skipped");
            return;
        };

        let result = match &report {
            Report::SessionStarted(_) => Ok(()),
            Report::HoldStarted { round } => self.reporter.report_hold_start(id, *round),
            Report::HoldEnded {
                round,
                hold_seconds,
            } => self.reporter.report_hold_end(id, *round, *hold_seconds),
            Report::RecoveryEnded {
                round,
                recovery_seconds,
            } => self.reporter.report_recovery_end(id, *round, *recovery_seconds),
            Report::Completed => self.reporter.report_complete(id),
            Report::Cancelled => self.reporter.report_cancelled(id),
        };

        if let Err(err) = result {
            warn!(session = %id, ?report, error = %err, "report failed");
        }

        if matches!(report, Report::Completed | Report::Cancelled) {
            self.session = None;
        }
    }
}

/// Non-blocking, order-preserving front for a [`Reporter`]
pub struct ReportDispatcher {
    tx: Option<Sender<Report>>,
    worker: Option<JoinHandle<()>>,
}

impl ReportDispatcher {
    pub fn spawn<R: Reporter>(reporter: R) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = ReportWorker {
            reporter,
            session: None,
        };

        let handle = thread::Builder::new()
            .name("breathwork-reporter".into())
            .spawn(move || worker.run(rx));

        let worker = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "could not start reporter thread, reports disabled");
                None
            }
        };

        Self {
            tx: Some(tx),
            worker,
        }
    }

    /// Queue a report; never blocks on the reporter itself
    pub fn send(&self, report: Report) {
        if let Some(tx) = &self.tx {
            if tx.send(report).is_err() {
                debug!("reporter worker gone, report dropped");
            }
        }
    }

    /// Close the queue and wait for every queued report to be handled
    pub fn shutdown(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("reporter worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail_create: bool,
        fail_hold_end: bool,
    }

    impl Recorder {
        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Reporter for Recorder {
        fn create_session(&mut self, config: &SessionConfig) -> Result<SessionId, ReportError> {
            if self.fail_create {
                return Err(ReportError::Unavailable("connection refused".into()));
            }
            self.log(format!("create:{}", config.total_rounds));
            Ok(SessionId("42".into()))
        }

        fn report_hold_end(
            &mut self,
            session: &SessionId,
            round: u32,
            hold_seconds: u64,
        ) -> Result<(), ReportError> {
            if self.fail_hold_end {
                return Err(ReportError::Rejected {
                    what: "hold end",
                    reason: "bad status".into(),
                });
            }
            self.log(format!("hold:{session}:{round}:{hold_seconds}"));
            Ok(())
        }

        fn report_recovery_end(
            &mut self,
            session: &SessionId,
            round: u32,
            recovery_seconds: u64,
        ) -> Result<(), ReportError> {
            self.log(format!("recovery:{session}:{round}:{recovery_seconds}"));
            Ok(())
        }

        fn report_complete(&mut self, session: &SessionId) -> Result<(), ReportError> {
            self.log(format!("complete:{session}"));
            Ok(())
        }
    }

    #[test]
    fn reports_are_delivered_in_order() {
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        let dispatcher = ReportDispatcher::spawn(recorder);

        dispatcher.send(Report::SessionStarted(SessionConfig::with_rounds(2)));
        dispatcher.send(Report::HoldStarted { round: 1 });
        dispatcher.send(Report::HoldEnded {
            round: 1,
            hold_seconds: 8,
        });
        dispatcher.send(Report::RecoveryEnded {
            round: 1,
            recovery_seconds: 15,
        });
        dispatcher.send(Report::Completed);
        dispatcher.shutdown();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "create:2".to_string(),
                "hold:42:1:8".to_string(),
                "recovery:42:1:15".to_string(),
                "complete:42".to_string(),
            ]
        );
    }

    #[test]
    fn failed_create_skips_the_rest_of_the_session() {
        let recorder = Recorder {
            fail_create: true,
            ..Recorder::default()
        };
        let calls = recorder.calls.clone();
        let dispatcher = ReportDispatcher::spawn(recorder);

        dispatcher.send(Report::SessionStarted(SessionConfig::with_rounds(1)));
        dispatcher.send(Report::HoldEnded {
            round: 1,
            hold_seconds: 30,
        });
        dispatcher.send(Report::Completed);
        dispatcher.shutdown();

        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_report_does_not_stop_later_reports() {
        let recorder = Recorder {
            fail_hold_end: true,
            ..Recorder::default()
        };
        let calls = recorder.calls.clone();
        let dispatcher = ReportDispatcher::spawn(recorder);

        dispatcher.send(Report::SessionStarted(SessionConfig::with_rounds(1)));
        dispatcher.send(Report::HoldEnded {
            round: 1,
            hold_seconds: 30,
        });
        dispatcher.send(Report::RecoveryEnded {
            round: 1,
            recovery_seconds: 10,
        });
        dispatcher.shutdown();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["create:1".to_string(), "recovery:42:1:10".to_string()]
        );
    }

    #[test]
    fn reports_after_completion_need_a_new_session() {
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        let dispatcher = ReportDispatcher::spawn(recorder);

        dispatcher.send(Report::SessionStarted(SessionConfig::with_rounds(1)));
        dispatcher.send(Report::Completed);
        dispatcher.send(Report::HoldEnded {
            round: 1,
            hold_seconds: 5,
        });
        dispatcher.shutdown();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["create:1".to_string(), "complete:42".to_string()]
        );
    }
}
