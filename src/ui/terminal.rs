use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::{
    io,
    time::{Duration, Instant},
};

use super::beat_indicator::beat_lines;
use crate::metronome::{Metronome, MetronomeEvent, TimeSignature};

#[derive(Debug, Clone, Copy, PartialEq)]
enum InputMode {
    SetBpm,
}

#[derive(Debug, Clone, PartialEq)]
enum HeaderStatus {
    InputPrompt(String, String), // (prompt, current_input)
    Success(String),
    Cancelled,
}

/// Snapshot of the metronome taken once per frame.
#[derive(Debug, Clone, Copy)]
struct View {
    bpm: f64,
    beat: u32,
    running: bool,
    muted: bool,
    signature: TimeSignature,
    taps: usize,
}

pub struct TerminalUI {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    metronome: Metronome,
    event_receiver: crossbeam::channel::Receiver<MetronomeEvent>,
    is_running: bool,
    last_update: Instant,
    output_device_name: String,
    input_mode: Option<InputMode>,
    input_buffer: String,
    header_status: Option<HeaderStatus>,
    status_timer: Option<Instant>,
}

impl TerminalUI {
    pub fn new(
        metronome: Metronome,
        event_receiver: crossbeam::channel::Receiver<MetronomeEvent>,
        output_device_name: &str,
    ) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            metronome,
            event_receiver,
            is_running: true,
            last_update: Instant::now(),
            output_device_name: output_device_name.to_string(),
            input_mode: None,
            input_buffer: String::new(),
            header_status: None,
            status_timer: None,
        })
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        while self.is_running {
            self.process_events()?;
            self.check_status_timer();

            // Redraw at ~60 fps so the beat indicator keeps up with 300 BPM
            if self.last_update.elapsed() >= Duration::from_millis(16) {
                self.draw()?;
                self.last_update = Instant::now();
            }

            std::thread::sleep(Duration::from_millis(1));
        }

        self.metronome.stop();
        Ok(())
    }

    fn process_events(&mut self) -> anyhow::Result<()> {
        if event::poll(Duration::from_millis(0))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            self.handle_key_event(key);
        }

        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_metronome_event(event);
        }

        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if let Some(input_mode) = self.input_mode {
            self.handle_input_key(key, input_mode);
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.is_running = false;
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.metronome.start();
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.metronome.stop();
            }
            KeyCode::Char('b') | KeyCode::Char('B') => {
                self.metronome.tap_tempo();
                let taps = self.metronome.tap_count();
                if taps < 2 {
                    self.show_success("Tap again to set tempo");
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right => {
                self.metronome.adjust_bpm(1.0);
            }
            KeyCode::Char('-') | KeyCode::Left => {
                self.metronome.adjust_bpm(-1.0);
            }
            KeyCode::Char('t') | KeyCode::Char('T') => {
                self.start_input_mode(InputMode::SetBpm, "Set BPM:");
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.metronome.toggle_signature();
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                self.metronome.toggle_mute();
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                let config = self.metronome.signature_config();
                if config.resumes_on_closing_accent() {
                    self.metronome.set_current_beat(config.cycle_length);
                    let beat = self.metronome.next_start_beat();
                    self.show_success(&format!("Next start from beat {}", beat));
                } else {
                    self.show_success(&format!("{} always starts on beat 1", config.label));
                }
            }
            _ => {}
        }
    }

    fn handle_metronome_event(&mut self, event: MetronomeEvent) {
        match event {
            MetronomeEvent::BpmChanged(bpm) => {
                self.show_success(&format!("BPM: {:.2}", bpm));
            }
            MetronomeEvent::SignatureChanged(signature) => {
                self.show_success(&format!("Mode: {}", signature));
            }
            MetronomeEvent::MuteToggled(muted) => {
                self.show_success(if muted { "Muted" } else { "Unmuted" });
            }
            MetronomeEvent::Started | MetronomeEvent::Stopped | MetronomeEvent::Beat(_) => {
                // Read straight from the metronome when drawing
            }
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent, input_mode: InputMode) {
        match key.code {
            KeyCode::Enter => {
                let input = self.input_buffer.clone();
                self.exit_input_mode();
                match input_mode {
                    InputMode::SetBpm => match self.metronome.enter_bpm(&input) {
                        Ok(bpm) => self.show_success(&format!("BPM: {:.0}", bpm)),
                        Err(err) => self.show_success(&format!("Invalid BPM: {}", err)),
                    },
                }
            }
            KeyCode::Esc => {
                self.show_cancelled();
                self.exit_input_mode();
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
                self.update_input_display();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' || c == '-' => {
                self.input_buffer.push(c);
                self.update_input_display();
            }
            _ => {}
        }
    }

    fn start_input_mode(&mut self, mode: InputMode, prompt: &str) {
        self.input_mode = Some(mode);
        self.input_buffer.clear();
        self.header_status = Some(HeaderStatus::InputPrompt(prompt.to_string(), String::new()));
        self.status_timer = None;
    }

    fn exit_input_mode(&mut self) {
        self.input_mode = None;
        self.input_buffer.clear();
    }

    fn update_input_display(&mut self) {
        if let Some(HeaderStatus::InputPrompt(ref prompt, _)) = self.header_status {
            self.header_status = Some(HeaderStatus::InputPrompt(
                prompt.clone(),
                self.input_buffer.clone(),
            ));
        }
    }

    fn show_success(&mut self, message: &str) {
        // Keep the prompt visible while typing
        if self.input_mode.is_some() {
            return;
        }
        self.header_status = Some(HeaderStatus::Success(message.to_string()));
        self.status_timer = Some(Instant::now());
    }

    fn show_cancelled(&mut self) {
        self.header_status = Some(HeaderStatus::Cancelled);
        self.status_timer = Some(Instant::now());
    }

    fn check_status_timer(&mut self) {
        if let Some(timer) = self.status_timer
            && timer.elapsed() >= Duration::from_secs(3)
        {
            self.header_status = None;
            self.status_timer = None;
        }
    }

    fn snapshot(&self) -> View {
        View {
            bpm: self.metronome.bpm(),
            beat: self.metronome.current_beat(),
            running: self.metronome.is_running(),
            muted: self.metronome.is_muted(),
            signature: self.metronome.signature(),
            taps: self.metronome.tap_count(),
        }
    }

    fn draw(&mut self) -> anyhow::Result<()> {
        let view = self.snapshot();
        let audio_connected = self.metronome.audio_connected();
        let header_status = self.header_status.clone();
        let output_device_name = self.output_device_name.clone();

        self.terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3), // Header
                    Constraint::Min(6),    // Beats
                    Constraint::Length(5), // Tempo
                    Constraint::Length(4), // Footer
                ])
                .split(f.area());

            Self::draw_header_static(
                f,
                chunks[0],
                &output_device_name,
                audio_connected,
                &header_status,
            );
            Self::draw_beats_static(f, chunks[1], &view);
            Self::draw_tempo_static(f, chunks[2], &view);
            Self::draw_footer_static(f, chunks[3], &view);
        })?;
        Ok(())
    }

    fn draw_header_static(
        f: &mut Frame,
        area: Rect,
        output_device_name: &str,
        audio_connected: bool,
        header_status: &Option<HeaderStatus>,
    ) {
        let header_text = match header_status {
            Some(HeaderStatus::InputPrompt(prompt, current_input)) => {
                format!("{} {}_", prompt, current_input)
            }
            Some(HeaderStatus::Success(message)) => format!("✓ {}", message),
            Some(HeaderStatus::Cancelled) => "✗ Cancelled".to_string(),
            None if audio_connected => format!("Output: {}", output_device_name),
            None => "Output: none (silent)".to_string(),
        };

        let header = Paragraph::new(header_text)
            .style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Cuebeat"));
        f.render_widget(header, area);
    }

    fn draw_beats_static(f: &mut Frame, area: Rect, view: &View) {
        let config = view.signature.config();
        let mut lines = vec![
            Line::from(Span::styled(
                config.description,
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
        ];
        for line in beat_lines(view.signature, view.beat, view.running) {
            lines.push(line);
            lines.push(Line::from(""));
        }

        let beats = Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Compás {}", config.label)),
        );
        f.render_widget(beats, area);
    }

    fn draw_tempo_static(f: &mut Frame, area: Rect, view: &View) {
        let state = if view.running {
            Span::styled(
                " RUNNING ",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(" STOPPED ", Style::default().fg(Color::Black).bg(Color::Gray))
        };

        let mute = if view.muted {
            Span::styled(" MUTED ", Style::default().fg(Color::Black).bg(Color::Yellow))
        } else {
            Span::raw("")
        };

        let lines = vec![
            Line::from(vec![
                Span::styled(
                    format!(" BPM: {:.0} ", view.bpm.round()),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(" Beat: {}/{} ", view.beat, view.signature.cycle_length()),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![state, Span::raw(" "), mute]),
            Line::from(Span::styled(
                format!(" Taps: {}", view.taps),
                Style::default().fg(Color::DarkGray),
            )),
        ];

        let tempo = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Tempo"));
        f.render_widget(tempo, area);
    }

    fn draw_footer_static(f: &mut Frame, area: Rect, view: &View) {
        let key_color = Color::Yellow;
        let desc_color = Color::White;
        let sep_color = Color::DarkGray;

        let key_desc = |key: &str, desc: &str| -> Vec<Span> {
            vec![
                Span::styled(
                    key.to_string(),
                    Style::default().fg(key_color).add_modifier(Modifier::BOLD),
                ),
                Span::styled("=".to_string(), Style::default().fg(sep_color)),
                Span::styled(desc.to_string(), Style::default().fg(desc_color)),
            ]
        };

        let separator = || Span::styled(" | ".to_string(), Style::default().fg(sep_color));

        // Line 1 - transport
        let mut line1_spans = Vec::new();
        line1_spans.extend(key_desc("Space", "Start/Restart"));
        line1_spans.push(separator());
        line1_spans.extend(key_desc("S", "Stop"));
        line1_spans.push(separator());
        let config = view.signature.config();
        if config.resumes_on_closing_accent() {
            line1_spans.extend(key_desc("R", &format!("From beat {}", config.cycle_length)));
            line1_spans.push(separator());
        }
        line1_spans.extend(key_desc("M", if view.muted { "Unmute" } else { "Mute" }));
        line1_spans.push(separator());
        line1_spans.extend(key_desc("Q", "Quit"));

        // Line 2 - tempo and mode
        let next_mode = view.signature.toggled().config().label;
        let mut line2_spans = Vec::new();
        line2_spans.extend(key_desc("B", "Tap"));
        line2_spans.push(separator());
        line2_spans.extend(key_desc("+/-", "BPM ±1"));
        line2_spans.push(separator());
        line2_spans.extend(key_desc("T", "Type BPM"));
        line2_spans.push(separator());
        line2_spans.extend(key_desc("C", &format!("Switch to {}", next_mode)));

        let footer = Paragraph::new(vec![Line::from(line1_spans), Line::from(line2_spans)])
            .block(Block::default().borders(Borders::ALL).title("Controls"));

        f.render_widget(footer, area);
    }
}

impl Drop for TerminalUI {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
    }
}
