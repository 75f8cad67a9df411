mod ui;

use breathwork::{
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    history::{HistoryDb, SessionRecord},
    logging,
    report::ReportDispatcher,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    util, BreathingSessionEngine, Cue, Phase, SessionEvent, SessionSnapshot,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
};
use tracing::{debug, info, warn};

use crate::ui::screen::current_screen;

/// guided breathing sessions in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Paced breathing rounds followed by a breath hold and a recovery breath, with hold times recorded locally."
)]
pub struct Cli {
    /// number of rounds to preselect
    #[clap(short = 'r', long)]
    rounds: Option<u32>,

    /// breaths per round
    #[clap(short = 'b', long)]
    breaths: Option<u32>,

    /// length of one inhale + exhale in milliseconds
    #[clap(long)]
    cycle_ms: Option<u64>,

    /// rest between a recovery breath and the next round in milliseconds
    #[clap(long)]
    inter_round_ms: Option<u64>,

    /// do not record this run in the session history
    #[clap(long)]
    offline: bool,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,

    /// print recent sessions and exit
    #[clap(long)]
    history: bool,

    /// number of sessions shown by --history
    #[clap(long, default_value_t = 10)]
    limit: usize,
}

impl Cli {
    /// Overlay command line settings on the saved ones
    fn apply(&self, mut config: Config) -> Config {
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(breaths) = self.breaths {
            config.breaths_per_round = breaths;
        }
        if let Some(ms) = self.cycle_ms {
            config.breath_cycle_ms = ms;
        }
        if let Some(ms) = self.inter_round_ms {
            config.inter_round_delay_ms = ms;
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Selecting,
    Session,
    Complete,
}

impl AppState {
    fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::Idle => AppState::Selecting,
            Phase::Breathing | Phase::Holding | Phase::Recovery => AppState::Session,
            Phase::Complete | Phase::Stopped => AppState::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

pub struct App<C: Clock = SystemClock> {
    pub engine: BreathingSessionEngine<C>,
    pub settings: Config,
    pub state: AppState,
    /// Latest snapshot published by the engine
    pub snapshot: SessionSnapshot,
    pub last_cue: Option<Cue>,
}

impl<C: Clock> App<C> {
    pub fn new(engine: BreathingSessionEngine<C>, settings: Config) -> Self {
        let mut app = Self {
            snapshot: engine.snapshot(),
            state: AppState::from_phase(engine.phase()),
            engine,
            settings,
            last_cue: None,
        };
        app.preselect();
        app
    }

    fn preselect(&mut self) {
        if let Err(err) = self.engine.select_rounds(self.settings.rounds) {
            debug!(error = %err, "no default round count");
        }
    }

    fn start_session(&mut self) {
        let settings = Config {
            rounds: self
                .engine
                .selected_rounds()
                .unwrap_or(self.settings.rounds),
            ..self.settings.clone()
        };
        match settings.to_session_config() {
            Ok(config) => {
                if let Err(err) = self.engine.start(config) {
                    warn!(error = %err, "session not started");
                }
            }
            Err(err) => warn!(error = %err, "invalid session settings"),
        }
    }

    /// Pull queued engine events into the view; true if anything changed
    pub fn pump(&mut self) -> bool {
        let events = self.engine.drain_events();
        let changed = !events.is_empty();
        for event in events {
            match event {
                SessionEvent::Snapshot(snapshot) => self.snapshot = snapshot,
                SessionEvent::Cue(cue) => self.last_cue = Some(cue),
            }
        }
        self.state = AppState::from_phase(self.engine.phase());
        changed
    }

    /// Advance engine timers; true if the screen needs a redraw
    pub fn on_tick(&mut self) -> bool {
        self.engine.on_tick();
        let changed = self.pump();
        // the breath gauge moves between cues
        changed || (self.snapshot.phase == Phase::Breathing && !self.snapshot.paused)
    }

    pub fn on_key(&mut self, key: KeyEvent) -> KeyOutcome {
        let ctrl_c =
            key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
        if key.code == KeyCode::Esc || ctrl_c {
            if self.engine.phase().is_active() {
                self.engine.stop();
                self.pump();
            }
            return KeyOutcome::Quit;
        }

        // fire due timers first so the key acts on the current phase
        self.engine.on_tick();

        match self.state {
            AppState::Selecting => match key.code {
                KeyCode::Char(c @ '1'..='9') => {
                    if let Some(rounds) = c.to_digit(10) {
                        if let Err(err) = self.engine.select_rounds(rounds) {
                            warn!(error = %err, "round selection rejected");
                        }
                    }
                }
                KeyCode::Enter => self.start_session(),
                _ => {}
            },
            AppState::Session => match key.code {
                KeyCode::Char(' ') | KeyCode::Enter => match self.engine.phase() {
                    Phase::Holding => self.engine.confirm_hold_end(),
                    Phase::Recovery => self.engine.confirm_recovery_end(),
                    _ => {}
                },
                KeyCode::Char('p') => self.engine.toggle_pause(),
                KeyCode::Char('s') => self.engine.stop(),
                _ => {}
            },
            AppState::Complete => {
                if key.code == KeyCode::Char('n') {
                    self.engine.reset();
                    self.last_cue = None;
                    self.preselect();
                }
            }
        }

        self.pump();
        KeyOutcome::Continue
    }

    pub fn into_engine(self) -> BreathingSessionEngine<C> {
        self.engine
    }
}

fn history_lines(records: &[SessionRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["no sessions recorded yet".to_string()];
    }
    records
        .iter()
        .map(|record| {
            let holds = record
                .rounds
                .iter()
                .map(|r| util::format_clock(r.hold_seconds))
                .collect::<Vec<String>>()
                .join(" ");
            format!(
                "{}  {:<11}  {}/{} rounds  {} breaths  holds: {}",
                record.started_at.format("%Y-%m-%d %H:%M"),
                record.status.to_string(),
                record.rounds.len(),
                record.total_rounds,
                record.breaths_per_round,
                if holds.is_empty() { "-" } else { holds.as_str() }
            )
        })
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(path) = AppDirs::log_path() {
        logging::init_file_logging(&path);
    }

    let store = FileConfigStore::new();
    let settings = cli.apply(store.load());
    if let Err(err) = settings.to_session_config() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, err).exit();
    }

    if cli.save_config {
        store.save(&settings)?;
        info!(path = %store.path().display(), "settings saved");
    }

    if cli.history {
        let db = HistoryDb::open_default()?;
        for line in history_lines(&db.recent_sessions(cli.limit)?) {
            println!("{line}");
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut engine = BreathingSessionEngine::new(SystemClock);
    if !cli.offline && settings.record_history {
        match HistoryDb::open_default() {
            Ok(db) => engine = engine.with_reporter(ReportDispatcher::spawn(db)),
            Err(err) => warn!(error = %err, "session history unavailable, running offline"),
        }
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(engine, settings);
    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.into_engine().shutdown();
    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<SystemClock>,
) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    terminal.draw(|f| ui(app, f))?;

    loop {
        let redraw = match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => true,
            AppEvent::Key(key) => match app.on_key(key) {
                KeyOutcome::Quit => break,
                KeyOutcome::Continue => true,
            },
        };

        if redraw {
            terminal.draw(|f| ui(app, f))?;
        }
    }

    Ok(())
}

fn ui<C: Clock + 'static>(app: &App<C>, f: &mut Frame) {
    current_screen::<C>(&app.state).render(app, f);
}
