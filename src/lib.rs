// Library surface for the binary, headless/integration tests and reuse.
// Terminal rendering stays in the bin (main.rs + ui/).
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod engine;
pub mod history;
pub mod logging;
pub mod report;
pub mod runtime;
pub mod session;
pub mod util;

pub use engine::{BreathingSessionEngine, Cue, SessionEvent};
pub use session::{Phase, RoundResult, SessionConfig, SessionSnapshot, SessionSummary};
