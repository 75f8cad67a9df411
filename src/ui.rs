pub mod charting;
pub mod screen;

use breathwork::{clock::Clock, util, Cue, Phase, SessionSnapshot};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl<C: Clock> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Selecting => render_selection(self, area, buf),
            AppState::Session => render_session(self, area, buf),
            AppState::Complete => render_complete(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

pub fn render_selection<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1), // title
            Constraint::Length(1),
            Constraint::Length(1), // prompt
            Constraint::Length(1), // round picker
            Constraint::Length(1),
            Constraint::Length(1), // settings
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled("breathwork", bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Span::styled("How many rounds?", bold()))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

    let selected = app.engine.selected_rounds();
    let mut picker = Vec::new();
    for n in 1..=9u32 {
        let style = if selected == Some(n) {
            bold().fg(Color::Black).bg(Color::Green)
        } else {
            dim_bold()
        };
        picker.push(Span::styled(format!(" {n} "), style));
        picker.push(Span::raw(" "));
    }
    Paragraph::new(Line::from(picker))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    let settings = &app.settings;
    Paragraph::new(Span::styled(
        format!(
            "{} breaths per round  ·  {:.2}s per breath",
            settings.breaths_per_round,
            settings.breath_cycle_ms as f64 / 1000.0
        ),
        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[6], buf);

    Paragraph::new(Span::styled("(1-9) rounds / (enter) start / (esc)ape", italic()))
        .render(chunks[8], buf);
}

/// One line per round: finished rounds plus the one in progress, if any
pub fn round_rows(snapshot: &SessionSnapshot) -> Vec<String> {
    let mut rows = snapshot
        .round_results
        .iter()
        .map(|r| {
            let live = snapshot.phase == Phase::Recovery && r.round_number == snapshot.current_round;
            let recovery = if live {
                snapshot.elapsed_recovery_seconds
            } else {
                r.recovery_seconds
            };
            format!(
                "Round {}   hold {}   recovery {}{}",
                r.round_number,
                util::format_clock(r.hold_seconds),
                util::format_clock(recovery),
                if live { "  ..." } else { "" }
            )
        })
        .collect::<Vec<String>>();

    if snapshot.phase == Phase::Holding {
        rows.push(format!(
            "Round {}   hold {}  ...",
            snapshot.current_round,
            util::format_clock(snapshot.elapsed_hold_seconds)
        ));
    }
    rows
}

/// Gauge ratio and label for the breathing phase
fn breath_gauge(progress: Option<f64>, paused: bool, cue: Option<Cue>) -> (f64, &'static str) {
    match progress {
        _ if paused => (0.0, "Paused"),
        Some(p) if p < 0.5 => (p * 2.0, "Inhale"),
        Some(p) => ((1.0 - p) * 2.0, "Exhale"),
        None if cue == Some(Cue::RoundAdvance) => (0.0, "Next round"),
        None => (0.0, "Get ready"),
    }
}

pub fn render_session<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let snapshot = &app.snapshot;
    let rows = round_rows(snapshot);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Length(1),
            Constraint::Length(1), // counter
            Constraint::Length(3), // gauge or timer
            Constraint::Length(1), // instruction
            Constraint::Length(1),
            Constraint::Min(1), // rounds
            Constraint::Length(1), // legend
        ])
        .split(area);

    let mut header = format!(
        "Round {}/{}  ·  {}",
        snapshot.current_round, snapshot.total_rounds, snapshot.phase
    );
    if snapshot.paused {
        header.push_str("  (paused)");
    }
    Paragraph::new(Span::styled(header, bold()))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let (counter, instruction) = match snapshot.phase {
        Phase::Breathing => (
            format!(
                "Breath {}/{}",
                snapshot.current_breath, snapshot.breaths_per_round
            ),
            "Breathe in fully, let go without forcing",
        ),
        Phase::Holding => (
            "Hold".to_string(),
            "Breathe out and hold. (space) when you need to breathe in",
        ),
        Phase::Recovery => (
            "Recovery".to_string(),
            "Breathe in deeply and hold. (space) to let go",
        ),
        _ => (String::new(), ""),
    };

    Paragraph::new(Span::styled(counter, dim_bold()))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    match snapshot.phase {
        Phase::Breathing => {
            let (ratio, label) = breath_gauge(
                app.engine.breath_progress(),
                snapshot.paused,
                app.last_cue,
            );
            Gauge::default()
                .block(Block::default().borders(Borders::ALL))
                .gauge_style(Style::default().fg(Color::Cyan))
                .ratio(ratio.clamp(0.0, 1.0))
                .label(Span::styled(label, bold()))
                .render(chunks[3], buf);
        }
        Phase::Holding | Phase::Recovery => {
            let seconds = if snapshot.phase == Phase::Holding {
                snapshot.elapsed_hold_seconds
            } else {
                snapshot.elapsed_recovery_seconds
            };
            let color = if snapshot.phase == Phase::Holding {
                Color::Magenta
            } else {
                Color::Green
            };
            Paragraph::new(Span::styled(util::format_clock(seconds), bold().fg(color)))
                .block(Block::default().borders(Borders::ALL))
                .alignment(Alignment::Center)
                .render(chunks[3], buf);
        }
        _ => {}
    }

    let instruction = if snapshot.paused {
        "Paused. (p) to resume"
    } else {
        instruction
    };
    Paragraph::new(Span::styled(
        instruction,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(chunks[4], buf);

    let lines = rows.into_iter().map(Line::from).collect::<Vec<Line>>();
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(chunks[6], buf);

    Paragraph::new(Span::styled(
        "(space) confirm / (p)ause / (s)top / (esc)ape",
        italic(),
    ))
    .render(chunks[7], buf);
}

pub fn render_complete<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let Some(summary) = app.engine.summary().filter(|_| app.engine.phase() == Phase::Complete)
    else {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(Span::styled("Session stopped", bold().fg(Color::Yellow)))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
        Paragraph::new(Span::styled(
            "Rounds that were not finished are not recorded",
            italic(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
        Paragraph::new(Span::styled("(n)ew / (esc)ape", italic())).render(chunks[4], buf);
        return;
    };

    let results = app.engine.round_results();
    let rows = round_rows(&app.snapshot);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Length(1), // stats
            Constraint::Length(1), // breaths
            Constraint::Min(6), // chart
            Constraint::Length(rows.len() as u16),
            Constraint::Length(1),
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled("Session complete", bold().fg(Color::Green)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        format!(
            "{} rounds   total hold {}   average hold {}   longest {}",
            summary.rounds,
            util::format_minutes_seconds(summary.total_hold_seconds as f64),
            util::format_minutes_seconds(summary.average_hold_seconds),
            util::format_clock(summary.longest_hold_seconds)
        ),
        bold(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    if let Some(config) = app.engine.config() {
        Paragraph::new(Span::styled(
            format!(
                "{} breaths   {} of paced breathing",
                summary.total_breaths,
                util::format_minutes_seconds(config.planned_breathing_duration().as_secs_f64())
            ),
            italic(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }

    let bars = charting::hold_bars(results);
    let data = bars
        .iter()
        .map(|(label, hold)| (label.as_str(), *hold))
        .collect::<Vec<(&str, u64)>>();
    BarChart::default()
        .block(
            Block::default()
                .title("hold (seconds)")
                .borders(Borders::ALL),
        )
        .data(data.as_slice())
        .bar_width(charting::bar_width(chunks[3].width, data.len()))
        .bar_gap(1)
        .max(charting::bar_ceiling(results))
        .bar_style(Style::default().fg(Color::Magenta))
        .value_style(bold().fg(Color::Black).bg(Color::Magenta))
        .render(chunks[3], buf);

    let lines = rows.into_iter().map(Line::from).collect::<Vec<Line>>();
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(chunks[4], buf);

    Paragraph::new(Span::styled("(n)ew / (esc)ape", italic())).render(chunks[6], buf);
}
