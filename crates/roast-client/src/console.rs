//! Terminal console: live status, tuning values, and a roast chart.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, BorderType, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Terminal,
};
use roast_protocol::ProgramProfile;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::series::{SeriesKind, TelemetrySeries};
use crate::session::{Sent, Session, SessionUpdate, Transport};
use crate::state::{ControllerState, ProgramMode, RunState, RunTransition, StatusReconciler};

const COLOR_TEAL: Color = Color::Rgb(0, 168, 150);
const COLOR_GREEN: Color = Color::Rgb(46, 204, 113);
const COLOR_AMBER: Color = Color::Rgb(243, 156, 18);
const COLOR_RED: Color = Color::Rgb(231, 76, 60);
const COLOR_INFO: Color = Color::Rgb(142, 142, 147);
const COLOR_YELLOW: Color = Color::Rgb(245, 196, 66);
const COLOR_CYAN: Color = Color::Rgb(64, 212, 255);
const COLOR_PROMPT_BG: Color = Color::Rgb(24, 24, 24);

const MAX_ALERTS: usize = 4;

/// Known prompt commands, for telling bad arguments from unknown words.
const COMMANDS: [&str; 9] = [
    "start",
    "stop",
    "restart",
    "save",
    "saveconfig",
    "save-config",
    "mode",
    "set",
    "upload",
];

#[derive(Debug, Clone, PartialEq)]
struct PromptLine {
    segments: Vec<(String, Style)>,
}

impl PromptLine {
    fn plain(text: impl Into<String>, style: Style) -> Self {
        Self {
            segments: vec![(text.into(), style)],
        }
    }

    #[cfg(test)]
    fn text(&self) -> String {
        self.segments
            .iter()
            .map(|(text, _)| text.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct PromptState {
    active: bool,
    input: String,
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
    output: Vec<PromptLine>,
}

impl PromptState {
    fn activate(&mut self) {
        self.active = true;
        self.input.clear();
        self.cursor = 0;
        self.history_index = None;
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.input.clear();
        self.cursor = 0;
        self.history_index = None;
    }

    fn set_output(&mut self, lines: Vec<PromptLine>) {
        self.output = lines;
    }

    fn insert(&mut self, ch: char) {
        self.input.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        if let Some(ch) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
            self.input.remove(self.cursor);
        }
    }

    fn move_left(&mut self) {
        if let Some(ch) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
        }
    }

    fn move_right(&mut self) {
        if let Some(ch) = self.input[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    fn push_history(&mut self, entry: String) {
        if !entry.trim().is_empty() {
            self.history.push(entry);
        }
        self.history_index = None;
    }

    fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let idx = match self.history_index {
            None => self.history.len() - 1,
            Some(idx) => idx.saturating_sub(1),
        };
        self.history_index = Some(idx);
        self.input = self.history[idx].clone();
        self.cursor = self.input.len();
    }

    fn history_next(&mut self) {
        match self.history_index {
            Some(idx) if idx + 1 < self.history.len() => {
                self.history_index = Some(idx + 1);
                self.input = self.history[idx + 1].clone();
            }
            _ => {
                self.history_index = None;
                self.input.clear();
            }
        }
        self.cursor = self.input.len();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfirmAction {
    Restart,
    SwitchMode(ProgramMode),
}

impl ConfirmAction {
    fn question(self) -> String {
        match self {
            Self::Restart => "Restart the run and clear the chart? (y/n)".to_string(),
            Self::SwitchMode(mode) => format!("Switch to {mode} mode and clear the chart? (y/n)"),
        }
    }
}

struct ConsoleState {
    url: String,
    chart_buckets: usize,
    prompt: PromptState,
    pending_confirm: Option<ConfirmAction>,
    alerts: VecDeque<PromptLine>,
    connected: bool,
    samples: u64,
    rejected: u64,
    ignored: u64,
}

impl ConsoleState {
    fn new(url: &str, chart_buckets: usize) -> Self {
        Self {
            url: url.to_string(),
            chart_buckets,
            prompt: PromptState::default(),
            pending_confirm: None,
            alerts: VecDeque::with_capacity(MAX_ALERTS + 1),
            connected: false,
            samples: 0,
            rejected: 0,
            ignored: 0,
        }
    }
}

/// Runs the interactive console until the user quits. A closed connection
/// keeps the last state on screen.
pub fn run_console(config: &ClientConfig) -> anyhow::Result<()> {
    let mut session = Session::connect(&config.connection)?;
    let mut state = ConsoleState::new(&config.connection.url, config.console.chart_buckets);
    state.connected = true;
    push_alert(
        &mut state,
        &format!("CONNECTED {}", config.connection.url),
        Style::default().fg(COLOR_GREEN),
    );
    let refresh = config.console.refresh;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = (|| {
        loop {
            let frame_start = Instant::now();
            while frame_start.elapsed() < refresh && !session.is_closed() {
                if let Some(update) = session.poll() {
                    apply_update(&mut state, update);
                }
            }

            terminal.draw(|frame| {
                render_ui(
                    frame.area(),
                    frame,
                    &state,
                    session.reconciler(),
                    session.series(),
                );
            })?;

            let wait = if session.is_closed() {
                refresh
            } else {
                StdDuration::from_millis(5)
            };
            if event::poll(wait)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press
                        && handle_key(key, &mut session, &mut state)
                    {
                        break;
                    }
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    })();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    if !session.is_closed() {
        let _ = session.close();
    }
    result
}

fn apply_update(state: &mut ConsoleState, update: SessionUpdate) {
    match update {
        SessionUpdate::Opened => {
            state.connected = true;
        }
        SessionUpdate::Status(outcome) => {
            for err in &outcome.errors {
                push_alert(
                    state,
                    &format!("STATUS {err}"),
                    Style::default().fg(COLOR_AMBER),
                );
            }
            match outcome.transition {
                Some(RunTransition::LeftOff) => {
                    push_alert(state, "RUN started", Style::default().fg(COLOR_GREEN));
                }
                Some(RunTransition::EnteredOff) => {
                    push_alert(state, "RUN ended", Style::default().fg(COLOR_INFO));
                }
                None => {}
            }
        }
        SessionUpdate::Sample(_) => state.samples += 1,
        SessionUpdate::SampleRejected(err) => {
            state.rejected += 1;
            push_alert(
                state,
                &format!("SAMPLE {err}"),
                Style::default().fg(COLOR_AMBER),
            );
        }
        SessionUpdate::Ignored(_) => state.ignored += 1,
        SessionUpdate::TransportError(message) => {
            push_alert(
                state,
                &format!("ERROR {message}"),
                Style::default().fg(COLOR_RED),
            );
        }
        SessionUpdate::Closed => {
            state.connected = false;
            push_alert(
                state,
                "DISCONNECTED Connection closed. Restart the console to reconnect.",
                Style::default().fg(COLOR_RED),
            );
        }
    }
}

/// Returns `true` when the console should exit.
fn handle_key<T: Transport>(
    key: KeyEvent,
    session: &mut Session<T>,
    state: &mut ConsoleState,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    if state.prompt.active {
        return handle_prompt_key(key, session, state);
    }
    if let Some(confirm) = state.pending_confirm.take() {
        handle_confirm(confirm, key, session, state);
        return false;
    }
    match key.code {
        KeyCode::Char('q' | 'Q') => return true,
        KeyCode::Char('/' | ':') => {
            state.prompt.activate();
            state.prompt.set_output(help_lines());
        }
        KeyCode::Char('s' | 'S') => {
            let result = session.toggle_run();
            report(state, result);
        }
        KeyCode::Char('r' | 'R') => ask_confirm(state, ConfirmAction::Restart),
        KeyCode::Char('m' | 'M') => {
            let next = match session.state().program_mode {
                Some(ProgramMode::Program) => ProgramMode::Simple,
                _ => ProgramMode::Program,
            };
            ask_confirm(state, ConfirmAction::SwitchMode(next));
        }
        KeyCode::Char('w' | 'W') => {
            let result = session.save_config();
            report(state, result);
        }
        KeyCode::Char('?' | 'h' | 'H') => state.prompt.set_output(help_lines()),
        _ => {}
    }
    false
}

fn ask_confirm(state: &mut ConsoleState, action: ConfirmAction) {
    state.pending_confirm = Some(action);
    let line = PromptLine::plain(action.question(), Style::default().fg(COLOR_YELLOW));
    state.prompt.set_output(vec![line]);
}

fn handle_confirm<T: Transport>(
    action: ConfirmAction,
    key: KeyEvent,
    session: &mut Session<T>,
    state: &mut ConsoleState,
) {
    if !matches!(key.code, KeyCode::Char('y' | 'Y')) {
        let line = PromptLine::plain("Cancelled.", Style::default().fg(COLOR_INFO));
        state.prompt.set_output(vec![line]);
        return;
    }
    let result = match action {
        ConfirmAction::Restart => session.restart(),
        ConfirmAction::SwitchMode(mode) => session.switch_mode(mode),
    };
    report(state, result);
}

fn handle_prompt_key<T: Transport>(
    key: KeyEvent,
    session: &mut Session<T>,
    state: &mut ConsoleState,
) -> bool {
    match key.code {
        KeyCode::Esc => {
            state.prompt.deactivate();
            state.prompt.set_output(Vec::new());
        }
        KeyCode::Enter => {
            let line = std::mem::take(&mut state.prompt.input);
            state.prompt.push_history(line.clone());
            state.prompt.deactivate();
            return execute_command(&line, session, state);
        }
        KeyCode::Backspace => state.prompt.backspace(),
        KeyCode::Left => state.prompt.move_left(),
        KeyCode::Right => state.prompt.move_right(),
        KeyCode::Up => state.prompt.history_prev(),
        KeyCode::Down => state.prompt.history_next(),
        KeyCode::Char(ch) => state.prompt.insert(ch),
        _ => {}
    }
    false
}

/// Runs one prompt command. Returns `true` for `quit`.
fn execute_command<T: Transport>(
    line: &str,
    session: &mut Session<T>,
    state: &mut ConsoleState,
) -> bool {
    let line = line.trim().trim_start_matches(['/', ':']);
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return false;
    };
    let args = parts.collect::<Vec<_>>();
    match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("quit" | "exit" | "q", _) => return true,
        ("help" | "?", _) => state.prompt.set_output(help_lines()),
        ("clear", _) => {
            state.prompt.set_output(Vec::new());
            state.alerts.clear();
        }
        ("start", []) => {
            let result = session.start();
            report(state, result);
        }
        ("stop", []) => {
            let result = session.stop();
            report(state, result);
        }
        ("restart", []) => {
            let result = session.restart();
            report(state, result);
        }
        ("save" | "saveconfig" | "save-config", []) => {
            let result = session.save_config();
            report(state, result);
        }
        ("mode", [mode]) => match ProgramMode::parse(mode) {
            Some(mode) => {
                let result = session.switch_mode(mode);
                report(state, result);
            }
            None => show_error(state, &format!("unknown mode '{mode}' (simple|program)")),
        },
        ("set", [name, value]) => {
            let result = session.set_parameter(name, *value);
            report(state, result);
        }
        ("upload", [path]) => match ProgramProfile::load(Path::new(path)) {
            Ok(profile) => {
                let result = session.upload_program(profile);
                report(state, result);
            }
            Err(err) => show_error(state, &err.to_string()),
        },
        (name, _) if COMMANDS.contains(&name) => {
            show_error(state, &format!("wrong arguments for '{head}' (see help)"));
        }
        _ => show_error(state, &format!("unknown command '{head}' (see help)")),
    }
    false
}

fn report(state: &mut ConsoleState, result: Result<Sent, ClientError>) {
    match result {
        Ok(sent) => {
            let mut text = format!("SENT {}", sent.envelope.encode());
            if sent.run_reset {
                text.push_str("  (chart cleared)");
            }
            let line = PromptLine::plain(text, Style::default().fg(COLOR_GREEN));
            state.prompt.set_output(vec![line]);
        }
        Err(err) => show_error(state, &err.to_string()),
    }
}

fn show_error(state: &mut ConsoleState, message: &str) {
    let text = format!("Error: {message}");
    let line = PromptLine::plain(text, Style::default().fg(COLOR_RED));
    state.prompt.set_output(vec![line]);
}

fn help_lines() -> Vec<PromptLine> {
    let entries = [
        ("start | stop | restart", "lifecycle commands"),
        ("save", "persist controller settings"),
        ("mode simple|program", "switch control mode"),
        ("set <name> <value>", "setpoint, ramp_rate, p, i, d"),
        ("upload <file>", "send a .toml/.json roast program"),
        ("clear | quit", "clear messages, leave console"),
    ];
    let mut lines = vec![PromptLine::plain(
        "Keys: s start/stop  r restart  m mode  w save  / command  q quit",
        Style::default().fg(COLOR_INFO),
    )];
    let rows = entries.into_iter().map(|(command, help)| PromptLine {
        segments: vec![
            (format!("{command:<24}"), label_style()),
            (help.to_string(), Style::default().fg(COLOR_INFO)),
        ],
    });
    lines.extend(rows);
    lines
}

fn render_ui(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    state: &ConsoleState,
    reconciler: &StatusReconciler,
    series: &TelemetrySeries,
) {
    let wanted = state.prompt.output.len() + state.alerts.len().min(3) + 1;
    let mut prompt_height = u16::try_from(wanted).unwrap_or(u16::MAX).clamp(3, 10);
    let min_panel_height = 10;
    if prompt_height + min_panel_height >= area.height {
        prompt_height = area.height.saturating_sub(min_panel_height).max(3);
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(area.height.saturating_sub(prompt_height)),
            Constraint::Length(prompt_height),
        ])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(20)])
        .split(rows[0]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(11), Constraint::Min(5)])
        .split(columns[0]);
    render_status_panel(side[0], frame, state, reconciler.state());
    render_tuning_panel(side[1], frame, reconciler);
    render_chart_panel(columns[1], frame, state, series);
    render_prompt(rows[1], frame, state);
}

fn render_status_panel(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    state: &ConsoleState,
    controller: &ControllerState,
) {
    let chip = status_chip(controller.run_state);
    let mode = controller
        .program_mode
        .map_or("-", ProgramMode::as_str)
        .to_string();
    let link = if state.connected {
        Span::styled("online", Style::default().fg(COLOR_GREEN))
    } else {
        Span::styled("offline", Style::default().fg(COLOR_RED))
    };
    let url = Span::styled(state.url.clone(), Style::default().fg(COLOR_INFO));
    let lines = vec![
        Line::from(vec![
            Span::styled(chip.0, chip.1),
            Span::raw(" "),
            Span::styled(mode, value_style()),
            Span::raw(" "),
            link,
        ]),
        label_value_line("Temp", &format_reading(controller.temperature, "°C"), 10),
        label_value_line("Setpoint", &format_reading(controller.setpoint, "°C"), 10),
        label_value_line("Ramp", &format_reading(controller.ramp_rate, "°C/min"), 10),
        label_value_line("Output", &format_reading(controller.duty_cycle, "%"), 10),
        label_value_line("File", controller.filename.as_deref().unwrap_or("-"), 10),
        label_value_line("Samples", &state.samples.to_string(), 10),
        label_value_line(
            "Dropped",
            &format!("{} bad, {} ignored", state.rejected, state.ignored),
            10,
        ),
        Line::from(url),
    ];
    let panel = Paragraph::new(lines).block(panel_block("Controller"));
    frame.render_widget(panel, area);
}

fn render_tuning_panel(area: Rect, frame: &mut ratatui::Frame<'_>, reconciler: &StatusReconciler) {
    let controller = reconciler.state();
    let mut lines = vec![
        label_value_line("P", &format_reading(controller.p, ""), 10),
        label_value_line("I", &format_reading(controller.i, ""), 10),
        label_value_line("D", &format_reading(controller.d, ""), 10),
    ];
    for (key, value) in reconciler.overflow() {
        lines.push(label_value_line(key, &value.to_string(), 10));
    }
    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(panel_block("Tuning"));
    frame.render_widget(panel, area);
}

#[allow(clippy::cast_precision_loss)]
fn render_chart_panel(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    state: &ConsoleState,
    series: &TelemetrySeries,
) {
    let title = format!("Roast  {} samples", series.len());
    let Some(bounds) = series.bounds() else {
        let text = Span::styled("Waiting for telemetry...", Style::default().fg(COLOR_INFO));
        let waiting = Paragraph::new(Line::from(text)).block(panel_block(&title));
        frame.render_widget(waiting, area);
        return;
    };
    let data = SeriesKind::ALL.map(|kind| {
        series
            .downsample(kind, state.chart_buckets)
            .into_iter()
            .map(|bucket| (bucket.t as f64 / 1000.0, bucket.avg))
            .collect::<Vec<_>>()
    });
    let datasets = SeriesKind::ALL
        .iter()
        .zip(data.iter())
        .map(|(kind, points)| {
            Dataset::default()
                .name(kind.label())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series_color(*kind)))
                .data(points)
        })
        .collect::<Vec<_>>();

    let x_min = bounds.t_min as f64 / 1000.0;
    let x_max = (bounds.t_max as f64 / 1000.0).max(x_min + 1.0);
    let y_min = bounds.value_min.min(0.0);
    let y_max = (bounds.value_max * 1.05).max(y_min + 1.0);
    let chart = Chart::new(datasets)
        .block(panel_block(&title))
        .x_axis(
            Axis::default()
                .title("s")
                .style(label_style())
                .bounds([x_min, x_max])
                .labels([
                    format!("{x_min:.0}"),
                    format!("{:.0}", (x_min + x_max) / 2.0),
                    format!("{x_max:.0}"),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(label_style())
                .bounds([y_min, y_max])
                .labels([
                    format!("{y_min:.0}"),
                    format!("{:.0}", (y_min + y_max) / 2.0),
                    format!("{y_max:.0}"),
                ]),
        );
    frame.render_widget(chart, area);
}

fn render_prompt(area: Rect, frame: &mut ratatui::Frame<'_>, state: &ConsoleState) {
    let mut lines: Vec<Line> = Vec::new();
    for alert in state.alerts.iter().rev().take(3).rev() {
        lines.push(prompt_line_to_line(alert));
    }
    for line in &state.prompt.output {
        lines.push(prompt_line_to_line(line));
    }
    let output_height = area.height.saturating_sub(1);
    let output_area = Rect {
        x: area.x,
        y: area.y,
        width: area.width,
        height: output_height,
    };
    let output = Paragraph::new(lines).wrap(Wrap { trim: true });
    frame.render_widget(output, output_area);

    let prompt_area = Rect {
        x: area.x,
        y: area.y + output_height,
        width: area.width,
        height: 1,
    };
    if state.prompt.active {
        let marker = Style::default().fg(COLOR_TEAL);
        let prompt = Line::from(vec![
            Span::styled("> ", marker.add_modifier(Modifier::BOLD)),
            Span::raw(state.prompt.input.clone()),
        ]);
        frame.render_widget(
            Paragraph::new(prompt).style(Style::default().bg(COLOR_PROMPT_BG)),
            prompt_area,
        );
        let cursor = state.prompt.input[..state.prompt.cursor].chars().count();
        let x = prompt_area.x + 2 + u16::try_from(cursor).unwrap_or(u16::MAX);
        frame.set_cursor_position((x, prompt_area.y));
    } else {
        let style = Style::default()
            .fg(COLOR_INFO)
            .add_modifier(Modifier::DIM)
            .bg(COLOR_PROMPT_BG);
        let hint = Span::styled("Press / to type a command, ? for help", style);
        frame.render_widget(
            Paragraph::new(Line::from(hint)).style(Style::default().bg(COLOR_PROMPT_BG)),
            prompt_area,
        );
    }
}

fn prompt_line_to_line(line: &PromptLine) -> Line<'_> {
    let spans = line
        .segments
        .iter()
        .map(|(text, style)| Span::styled(text.clone(), *style))
        .collect::<Vec<_>>();
    Line::from(spans)
}

fn panel_block(title: &str) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(COLOR_YELLOW)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(COLOR_INFO))
}

fn label_style() -> Style {
    Style::default().fg(COLOR_CYAN)
}

fn value_style() -> Style {
    Style::default().fg(Color::White)
}

fn label_value_line(label: &str, value: &str, width: usize) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<width$}"), label_style()),
        Span::raw(" "),
        Span::styled(value.to_string(), value_style()),
    ])
}

fn series_color(kind: SeriesKind) -> Color {
    match kind {
        SeriesKind::Temperature => COLOR_RED,
        SeriesKind::Setpoint => COLOR_TEAL,
        SeriesKind::Output => COLOR_AMBER,
    }
}

fn status_chip(run_state: Option<RunState>) -> (String, Style) {
    let (bg, fg) = match run_state {
        Some(RunState::Off) | None => (Color::DarkGray, Color::White),
        Some(RunState::Preheating | RunState::Preheat) => (COLOR_AMBER, Color::Black),
        Some(RunState::Ramping | RunState::Hold) => (COLOR_TEAL, Color::White),
        Some(RunState::Cooling) => (COLOR_CYAN, Color::Black),
    };
    let label = run_state.map_or("UNKNOWN", RunState::as_str);
    let style = Style::default().bg(bg).fg(fg);
    (format!("[{label}]"), style.add_modifier(Modifier::BOLD))
}

fn format_reading(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(value) if unit.is_empty() => format!("{value:.2}"),
        Some(value) => format!("{value:.1} {unit}"),
        None => "-".to_string(),
    }
}

fn push_alert(state: &mut ConsoleState, text: &str, style: Style) {
    if state.alerts.len() >= MAX_ALERTS {
        state.alerts.pop_front();
    }
    let line = PromptLine::plain(text.to_string(), style);
    state.alerts.push_back(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TransportEvent;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<String>,
    }

    impl Transport for Recorder {
        fn send(&mut self, text: &str) -> Result<(), ClientError> {
            self.sent.push(text.to_string());
            Ok(())
        }

        fn close(&mut self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn fixture() -> (Session<Recorder>, ConsoleState) {
        let mut session = Session::new(Recorder::default());
        session.handle_event(TransportEvent::Opened);
        (session, ConsoleState::new("ws://127.0.0.1:81/", 64))
    }

    fn output_text(state: &ConsoleState) -> String {
        state
            .prompt
            .output
            .iter()
            .map(PromptLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn prompt_commands_send_envelopes() {
        let (mut session, mut state) = fixture();
        let quit = execute_command("/set setpoint 200", &mut session, &mut state);
        assert!(!quit);
        assert!(!execute_command("mode simple", &mut session, &mut state));
        assert_eq!(
            session.transport().sent,
            [
                r#"{"parameters":{"setpoint":200}}"#,
                r#"{"commands":["simple_mode"]}"#
            ]
        );
        assert!(output_text(&state).contains("chart cleared"));
    }

    #[test]
    fn prompt_reports_bad_input_without_sending() {
        let (mut session, mut state) = fixture();
        execute_command("set p fast", &mut session, &mut state);
        assert!(output_text(&state).starts_with("Error: invalid value for 'p'"));
        execute_command("launch", &mut session, &mut state);
        assert!(output_text(&state).contains("unknown command 'launch'"));
        execute_command("set p", &mut session, &mut state);
        assert!(output_text(&state).contains("wrong arguments"));
        assert!(session.transport().sent.is_empty());
        assert!(execute_command("quit", &mut session, &mut state));
    }

    #[test]
    fn restart_key_requires_confirmation() {
        let (mut session, mut state) = fixture();
        let quit = handle_key(key(KeyCode::Char('r')), &mut session, &mut state);
        assert!(!quit);
        assert_eq!(state.pending_confirm, Some(ConfirmAction::Restart));
        handle_key(key(KeyCode::Char('n')), &mut session, &mut state);
        assert!(session.transport().sent.is_empty());

        handle_key(key(KeyCode::Char('r')), &mut session, &mut state);
        handle_key(key(KeyCode::Char('y')), &mut session, &mut state);
        assert_eq!(session.transport().sent, [r#"{"commands":["restart"]}"#]);
    }

    #[test]
    fn typed_prompt_line_runs_on_enter() {
        let (mut session, mut state) = fixture();
        handle_key(key(KeyCode::Char('/')), &mut session, &mut state);
        for ch in "stpo".chars() {
            handle_key(key(KeyCode::Char(ch)), &mut session, &mut state);
        }
        handle_key(key(KeyCode::Backspace), &mut session, &mut state);
        handle_key(key(KeyCode::Backspace), &mut session, &mut state);
        handle_key(key(KeyCode::Char('o')), &mut session, &mut state);
        handle_key(key(KeyCode::Char('p')), &mut session, &mut state);
        handle_key(key(KeyCode::Enter), &mut session, &mut state);
        assert!(!state.prompt.active);
        assert_eq!(session.transport().sent, [r#"{"commands":["stop"]}"#]);
        assert_eq!(state.prompt.history, ["stop"]);
    }

    #[test]
    fn updates_feed_counters_and_alerts() {
        let mut state = ConsoleState::new("ws://x:81/", 64);
        let mut session = Session::new(Recorder::default());
        let updates = [
            session.route_frame(r#"{"type":"data","data":"1,2,3,4"}"#),
            session.route_frame(r#"{"type":"data","data":"bad"}"#),
            session.route_frame(r#"{"type":"log","data":"boot"}"#),
            session.route_frame(r#"{"type":"status","data":{"state":2}}"#),
        ];
        for update in updates {
            apply_update(&mut state, update);
        }
        apply_update(&mut state, SessionUpdate::Closed);
        assert_eq!((state.samples, state.rejected, state.ignored), (1, 1, 1));
        assert!(!state.connected);
        let alerts: Vec<String> = state.alerts.iter().map(PromptLine::text).collect();
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[1], "RUN started");
    }

    #[test]
    fn readings_and_chips() {
        assert_eq!(format_reading(Some(201.26), "°C"), "201.3 °C");
        assert_eq!(format_reading(Some(0.5), ""), "0.50");
        assert_eq!(format_reading(None, "%"), "-");
        assert_eq!(status_chip(Some(RunState::Hold)).0, "[HOLD]");
        assert_eq!(status_chip(None).0, "[UNKNOWN]");
    }
}
