use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::{io, path::Path, path::PathBuf, time::Duration};

use crate::core::config::DatasetConfig;
use crate::core::layout;
use crate::core::request::{self, IngestionRequest, Lighting};
use crate::core::resume::{self, FramePattern};
use crate::shared::constants;

type UiTerminal = Terminal<CrosstermBackend<io::Stderr>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Splash,
    Video,
    Interval,
    SubInterval,
    Light,
    Confirm,
}

impl Step {
    fn title(self) -> &'static str {
        match self {
            Step::Splash => "Start",
            Step::Video => "Video",
            Step::Interval => "Weight interval",
            Step::SubInterval => "Sub-interval weight",
            Step::Light => "Lighting",
            Step::Confirm => "Confirm",
        }
    }

    fn is_text_input(self) -> bool {
        matches!(self, Step::Video | Step::Interval | Step::SubInterval)
    }
}

struct MenuApp {
    step: Step,
    status: String,
    should_quit: bool,
    needs_lighting: bool,
    root: PathBuf,
    pattern: FramePattern,
    video_input: String,
    interval_input: String,
    sub_input: String,
    light_index: usize,
    video: Option<PathBuf>,
    interval: Option<String>,
    sub_interval: Option<String>,
    selection: Option<IngestionRequest>,
}

impl MenuApp {
    fn new(config: &DatasetConfig) -> Result<Self> {
        Ok(Self {
            step: Step::Splash,
            status: "Enter to start, Esc to quit".to_string(),
            should_quit: false,
            needs_lighting: config.lighting,
            root: config.root.clone(),
            pattern: config.frame_pattern()?,
            video_input: String::new(),
            interval_input: String::new(),
            sub_input: String::new(),
            light_index: 0,
            video: None,
            interval: None,
            sub_interval: None,
            selection: None,
        })
    }

    fn progress(&self) -> String {
        let total = if self.needs_lighting { 5 } else { 4 };
        let current = match self.step {
            Step::Splash => 0,
            Step::Video => 1,
            Step::Interval => 2,
            Step::SubInterval => 3,
            Step::Light => 4,
            Step::Confirm => total,
        };
        format!("{}/{}", current, total)
    }

    fn lighting(&self) -> Option<Lighting> {
        self.needs_lighting
            .then(|| Lighting::ALL[self.light_index.min(Lighting::ALL.len() - 1)])
    }

    fn on_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('q') if !self.step.is_text_input() => {
                self.should_quit = true;
                return;
            }
            _ => {}
        }

        match self.step {
            Step::Splash => {
                if key == KeyCode::Enter {
                    self.step = Step::Video;
                    self.status = "Type the path of the video clip, then Enter".to_string();
                }
            }
            Step::Video => self.handle_video_input(key),
            Step::Interval => self.handle_interval_input(key),
            Step::SubInterval => self.handle_sub_input(key),
            Step::Light => self.handle_light_select(key),
            Step::Confirm => self.handle_confirm(key),
        }
    }

    fn handle_video_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Backspace => {
                self.video_input.pop();
            }
            KeyCode::Char(c) => self.video_input.push(c),
            KeyCode::Enter => {
                // drag-and-drop into a terminal often quotes the path
                let raw = self.video_input.trim().trim_matches(|c: char| c == '\'' || c == '"');
                match request::validate_video(Path::new(raw)) {
                    Ok(video) => {
                        self.video = Some(video);
                        self.step = Step::Interval;
                        self.status = "Weight interval, e.g. 1-2".to_string();
                    }
                    Err(err) => self.status = err.to_string(),
                }
            }
            _ => {}
        }
    }

    fn handle_interval_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Backspace => {
                if self.interval_input.is_empty() {
                    self.step = Step::Video;
                    self.status = "Type the path of the video clip, then Enter".to_string();
                } else {
                    self.interval_input.pop();
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' || c == '-' => {
                self.interval_input.push(c);
            }
            KeyCode::Enter => match request::validate_interval(&self.interval_input) {
                Ok(interval) => {
                    self.interval = Some(interval);
                    self.step = Step::SubInterval;
                    self.status = "Sub-interval weight in pounds, e.g. 1.3".to_string();
                }
                Err(err) => self.status = err.to_string(),
            },
            _ => {}
        }
    }

    fn handle_sub_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Backspace => {
                if self.sub_input.is_empty() {
                    self.step = Step::Interval;
                    self.status = "Weight interval, e.g. 1-2".to_string();
                } else {
                    self.sub_input.pop();
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                if c != '.' || !self.sub_input.contains('.') {
                    self.sub_input.push(c);
                }
            }
            KeyCode::Enter => match request::validate_sub_interval(&self.sub_input) {
                Ok(sub) => {
                    self.sub_interval = Some(sub);
                    if self.needs_lighting {
                        self.step = Step::Light;
                        self.status = "Select the lighting condition".to_string();
                    } else {
                        self.step = Step::Confirm;
                        self.status = "Enter to extract, Backspace to go back".to_string();
                    }
                }
                Err(err) => self.status = err.to_string(),
            },
            _ => {}
        }
    }

    fn handle_light_select(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                self.light_index = self.light_index.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.light_index + 1 < Lighting::ALL.len() {
                    self.light_index += 1;
                }
            }
            KeyCode::Backspace => {
                self.step = Step::SubInterval;
                self.status = "Sub-interval weight in pounds, e.g. 1.3".to_string();
            }
            KeyCode::Enter => {
                self.step = Step::Confirm;
                self.status = "Enter to extract, Backspace to go back".to_string();
            }
            _ => {}
        }
    }

    fn handle_confirm(&mut self, key: KeyCode) {
        match key {
            KeyCode::Backspace => {
                if self.needs_lighting {
                    self.step = Step::Light;
                    self.status = "Select the lighting condition".to_string();
                } else {
                    self.step = Step::SubInterval;
                    self.status = "Sub-interval weight in pounds, e.g. 1.3".to_string();
                }
            }
            KeyCode::Enter => {
                let (Some(video), Some(interval), Some(sub)) =
                    (&self.video, &self.interval, &self.sub_interval)
                else {
                    self.status = "Missing answers, go back and fill them in".to_string();
                    return;
                };

                match IngestionRequest::new(
                    video,
                    interval,
                    sub,
                    self.lighting(),
                    self.needs_lighting,
                ) {
                    Ok(request) => {
                        self.selection = Some(request);
                        self.should_quit = true;
                    }
                    // the clip may have been moved since it was entered
                    Err(err) => {
                        self.status = err.to_string();
                        self.step = Step::Video;
                    }
                }
            }
            _ => {}
        }
    }

    fn target_preview(&self) -> Option<(PathBuf, u64)> {
        let target = layout::bucket_dir(
            &self.root,
            self.interval.as_deref()?,
            self.sub_interval.as_deref()?,
            self.lighting(),
        );
        let next = resume::next_start_index(&target, &self.pattern).ok()?;
        Some((target, next))
    }
}

/// Runs the wizard. `None` means the operator cancelled.
pub fn run_menu(config: &DatasetConfig) -> Result<Option<IngestionRequest>> {
    let mut app = MenuApp::new(config)?;

    let mut terminal = setup_terminal()?;
    let run_result = run_app(&mut terminal, &mut app);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(err) = restore_result {
        crate::utils::logger::error(&format!("Failed to restore terminal from menu: {}", err));
    }

    run_result?;

    Ok(app.selection)
}

fn setup_terminal() -> Result<UiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;

    let mut stderr = io::stderr();
    execute!(stderr, EnterAlternateScreen, Hide).context("failed to switch to alternate screen")?;

    let backend = CrosstermBackend::new(stderr);
    let terminal = Terminal::new(backend).context("failed to initialize terminal backend")?;

    Ok(terminal)
}

fn restore_terminal(terminal: &mut UiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

fn run_app(terminal: &mut UiTerminal, app: &mut MenuApp) -> Result<()> {
    loop {
        terminal.draw(|frame| draw_menu(frame, app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                // raw mode swallows SIGINT
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    app.selection = None;
                    break;
                }
                app.on_key(key.code);
            }
        }
    }

    Ok(())
}

fn draw_menu(frame: &mut Frame<'_>, app: &MenuApp) {
    let area = frame.size();

    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        format!(
            " {} | {} ({}) ",
            constants::APP_NAME,
            app.step.title(),
            app.progress()
        ),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(inner);

    draw_logo(frame, layout[0]);

    match app.step {
        Step::Splash => draw_splash(frame, layout[1], app),
        Step::Video => draw_text_input(
            frame,
            layout[1],
            "Video file path",
            &app.video_input,
        ),
        Step::Interval => draw_text_input(
            frame,
            layout[1],
            "Weight interval (e.g. 1-2)",
            &app.interval_input,
        ),
        Step::SubInterval => draw_text_input(
            frame,
            layout[1],
            "Sub-interval weight (e.g. 1.3)",
            &app.sub_input,
        ),
        Step::Light => draw_light_list(frame, layout[1], app),
        Step::Confirm => draw_confirm(frame, layout[1], app),
    }

    draw_footer(frame, layout[2], app);
}

fn draw_logo(frame: &mut Frame<'_>, area: Rect) {
    let lines: Vec<Line<'_>> = constants::MENU_LOGO
        .iter()
        .map(|line| {
            Line::from(Span::styled(
                *line,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
        })
        .collect();

    let logo = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(logo, area);
}

fn draw_splash(frame: &mut Frame<'_>, area: Rect, app: &MenuApp) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "Food pile frame ingestion",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Dataset: {}", app.root.display())),
        Line::from(""),
        Line::from("Enter: start"),
        Line::from("Esc / q: quit"),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });

    frame.render_widget(content, area);
}

fn draw_text_input(frame: &mut Frame<'_>, area: Rect, title: &'static str, value: &str) {
    let input_block = Block::default().borders(Borders::ALL).title(title);

    let text = format!("{}_", value);

    let input = Paragraph::new(text)
        .block(input_block)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });

    frame.render_widget(input, area);
}

fn draw_light_list(frame: &mut Frame<'_>, area: Rect, app: &MenuApp) {
    let items = constants::MENU_LIGHT_LABELS
        .iter()
        .map(|item| ListItem::new(*item))
        .collect::<Vec<_>>();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Lighting condition"))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    state.select(Some(app.light_index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_confirm(frame: &mut Frame<'_>, area: Rect, app: &MenuApp) {
    let video = app
        .video
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let light = app
        .lighting()
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    let (target, first_frame) = match app.target_preview() {
        Some((target, next)) => (target.display().to_string(), app.pattern.file_name(next)),
        None => ("?".to_string(), "?".to_string()),
    };

    let mut lines = vec![
        Line::from(Span::styled(
            "Check before extracting",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("Video: {}", video)),
        Line::from(format!(
            "Interval: {}",
            app.interval.as_deref().unwrap_or_default()
        )),
        Line::from(format!(
            "Sub-interval: {}",
            app.sub_interval.as_deref().unwrap_or_default()
        )),
    ];
    if app.needs_lighting {
        lines.push(Line::from(format!("Light: {}", light)));
    }
    lines.extend([
        Line::from(format!("Target: {}", target)),
        Line::from(format!("First frame: {}", first_frame)),
        Line::from(""),
        Line::from("Enter: extract   Backspace: back   Esc: quit"),
    ]);

    let confirm = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));

    frame.render_widget(confirm, area);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &MenuApp) {
    let keys = if app.step.is_text_input() {
        "[Enter] confirm  [Backspace] delete  [Esc] quit  "
    } else {
        "[↑↓/j,k] move  [Enter] select  [Esc/q] quit  "
    };

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(keys, Style::default().fg(Color::DarkGray)),
        Span::styled(app.status.as_str(), Style::default().fg(Color::White)),
    ]))
    .alignment(Alignment::Left)
    .wrap(Wrap { trim: true });

    frame.render_widget(footer, area);
}
