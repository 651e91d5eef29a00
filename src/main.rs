use std::io::{self, BufRead, Stdout, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Row, Table};
use ratatui::Terminal;
use tracing::{info, warn};

use fc_ctl::logging::{init_logging, LogOutput};
use fc_ctl::{
    transport, Command, ControllerConfig, ControllerSession, QueueItem, SimulatedRig,
    TelemetrySnapshot,
};

#[derive(Parser)]
#[command(name = "fcctl", version, about = "Serial controller for a fuel-cell test rig")]
struct Cli {
    /// Serial port of the rig (overrides the config file)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Talk to a simulated rig instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone)]
enum Mode {
    /// Numbered command menu (default)
    Menu,
    /// Live dashboard with keyboard control
    Monitor,
    /// Print queue items as JSON lines
    Stream {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Send one command and print what comes back
    Send {
        /// Command name, e.g. `start` or `fan-up-5`
        name: String,
        /// How long to wait for replies, in milliseconds
        #[arg(long, default_value_t = 1000)]
        wait_ms: u64,
    },
    /// List serial ports on this machine
    Ports,
}

// The main entry point for the command-line controller.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        ControllerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = Some(port);
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }

    let mode = cli.mode.unwrap_or(Mode::Menu);
    let output = match (config.log_dir.as_deref(), &mode) {
        (Some(dir), _) => LogOutput::Directory(dir),
        (None, Mode::Monitor) => LogOutput::Discard,
        (None, _) => LogOutput::Stderr,
    };
    let _guard = init_logging(&config.log_level, output);

    match mode {
        Mode::Ports => list_ports(),
        Mode::Menu => run_menu(open_session(&config, cli.simulate)?),
        Mode::Monitor => run_monitor(open_session(&config, cli.simulate)?, &config),
        Mode::Stream { seconds } => run_stream(open_session(&config, cli.simulate)?, seconds),
        Mode::Send { name, wait_ms } => {
            let command: Command = name.parse()?;
            let session = open_session(&config, cli.simulate)?;
            run_send(session, command, Duration::from_millis(wait_ms))
        }
    }
}

fn open_session(config: &ControllerConfig, simulate: bool) -> Result<ControllerSession> {
    let mut session = ControllerSession::new(config.session_options());
    if simulate {
        session.attach(Box::new(SimulatedRig::default()))?;
        info!("Attached to simulated rig");
        return Ok(session);
    }

    let port = config
        .port
        .as_deref()
        .context("No serial port given; use --port or set `port` in the config file")?;
    session.connect(port)?;
    println!("Connected to {} at {} baud.", port, config.baud_rate);
    Ok(session)
}

fn list_ports() -> Result<()> {
    let ports = transport::available_ports()?;
    if ports.is_empty() {
        eprintln!("[ERROR] No serial ports found.");
        return Ok(());
    }
    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  {}: {}", i, port);
    }
    Ok(())
}

fn print_item(item: &QueueItem) {
    match item {
        QueueItem::Readings(readings) => {
            for (key, reading) in readings {
                println!("  {:<10} {:>10} {}", key, reading.value, reading.unit);
            }
        }
        QueueItem::Raw(text) => println!("< {}", text),
        QueueItem::Error(message) => eprintln!("[DEVICE] {}", message),
    }
}

// --- Menu mode ---

fn run_menu(mut session: ControllerSession) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        for item in session.drain() {
            print_item(&item);
        }

        println!("\n--- Fuel Cell Controller ---");
        for (i, command) in Command::ALL.iter().enumerate() {
            println!("{}. {}", i + 1, command.description());
        }
        println!("0. Exit");
        println!("(press Enter to show new data)");
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let choice = line?;
        match choice.trim() {
            "" => continue,
            "0" => break,
            other => match other.parse::<usize>() {
                Ok(n) if (1..=Command::ALL.len()).contains(&n) => {
                    if let Err(e) = session.send(Command::ALL[n - 1]) {
                        eprintln!("[ERROR] {}", e);
                    }
                }
                _ => eprintln!("Invalid choice. Please try again."),
            },
        }
    }

    session.disconnect();
    Ok(())
}

// --- Stream mode ---

fn run_stream(mut session: ControllerSession, seconds: Option<u64>) -> Result<()> {
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let receiver = session.subscribe();
    let stdout = io::stdout();

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(item) => {
                let mut out = stdout.lock();
                serde_json::to_writer(&mut out, &item)?;
                writeln!(out)?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.disconnect();
    Ok(())
}

// --- Send mode ---

fn run_send(mut session: ControllerSession, command: Command, wait: Duration) -> Result<()> {
    session.send(command)?;
    println!("> {} ({:?})", command.description(), command.code());
    thread::sleep(wait);
    for item in session.drain() {
        print_item(&item);
    }
    session.disconnect();
    Ok(())
}

// --- Monitor mode ---

// Keys follow the rig's own codes where they are single characters.
fn command_for_key(key: KeyCode) -> Option<Command> {
    match key {
        KeyCode::Char('s') => Some(Command::StartFuelCell),
        KeyCode::Char('e') => Some(Command::EndFuelCell),
        KeyCode::Char('f') => Some(Command::FansAuto),
        KeyCode::Char('b') => Some(Command::BlowersAuto),
        KeyCode::Char('p') => Some(Command::ManualPurge),
        KeyCode::Char('v') => Some(Command::GetVersion),
        KeyCode::Char('9') => Some(Command::FanDown1),
        KeyCode::Char('0') => Some(Command::FanUp1),
        KeyCode::Char('-') => Some(Command::FanDown5),
        KeyCode::Char('=') => Some(Command::FanUp5),
        KeyCode::Char('[') => Some(Command::BlowerDown3),
        KeyCode::Char(']') => Some(Command::BlowerUp3),
        _ => None,
    }
}

struct MonitorState {
    snapshot: TelemetrySnapshot,
    port: String,
    last_action: String,
}

fn run_monitor(mut session: ControllerSession, config: &ControllerConfig) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    stdout
        .execute(EnterAlternateScreen)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut state = MonitorState {
        snapshot: TelemetrySnapshot::with_raw_capacity(config.raw_history),
        port: session.port_name().unwrap_or("-").to_string(),
        last_action: String::from("ready"),
    };
    let result = run_monitor_loop(&mut terminal, &mut session, &mut state);

    disable_raw_mode().context("Failed to disable raw mode")?;
    terminal
        .backend_mut()
        .execute(LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;

    session.disconnect();
    result
}

fn run_monitor_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    session: &mut ControllerSession,
    state: &mut MonitorState,
) -> Result<()> {
    let tick_rate = Duration::from_millis(250);

    loop {
        state.snapshot.apply_all(session.drain());
        let pending = session.pending();
        terminal.draw(|f| draw_monitor(f, state, pending))?;

        if event::poll(tick_rate).context("Failed to poll events")? {
            if let Event::Key(key) = event::read().context("Failed to read event")? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    code => {
                        if let Some(command) = command_for_key(code) {
                            state.last_action = match session.send(command) {
                                Ok(()) => format!("sent {}", command.name()),
                                Err(e) => {
                                    warn!(error = %e, "Command failed");
                                    format!("{} failed: {}", command.name(), e)
                                }
                            };
                        }
                    }
                }
            }
        }
    }
}

fn draw_monitor(f: &mut ratatui::Frame, state: &MonitorState, pending: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(10),
            Constraint::Length(3),
        ])
        .split(f.size());

    // Status bar
    let error_text = state.snapshot.last_error().unwrap_or("none");
    let status_text = format!(
        " Port: {}  Items: {}  Queue: {}  Last device error: {}  │  {}",
        state.port,
        state.snapshot.items_seen(),
        pending,
        error_text,
        state.last_action
    );
    let status_style = if state.snapshot.last_error().is_some() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Green)
    };
    let status = Paragraph::new(status_text).style(status_style).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Fuel Cell Controller "),
    );
    f.render_widget(status, chunks[0]);

    // Readings table
    let header = Row::new(["Key", "Value", "Unit"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .height(1);
    let rows: Vec<Row> = state
        .snapshot
        .latest()
        .iter()
        .map(|(key, reading)| {
            Row::new([
                key.clone(),
                format!("{:.3}", reading.value),
                reading.unit.clone(),
            ])
        })
        .collect();
    let widths = [
        Constraint::Length(16),
        Constraint::Length(14),
        Constraint::Min(6),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(" Real-time Data "));
    f.render_widget(table, chunks[1]);

    // Raw messages, newest at the bottom
    let visible = chunks[2].height.saturating_sub(2) as usize;
    let raw: Vec<ListItem> = state
        .snapshot
        .raw_messages()
        .rev()
        .take(visible)
        .rev()
        .map(|text| ListItem::new(text.to_string()))
        .collect();
    let raw_list =
        List::new(raw).block(Block::default().borders(Borders::ALL).title(" Raw Messages "));
    f.render_widget(raw_list, chunks[2]);

    let help = Paragraph::new(
        " [s]tart [e]nd [f]ans auto [b]lowers auto [p]urge [v]ersion  fan: 9/0 ±1% -/= ±5%  blower: [/] ±3%  [q]uit",
    )
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[3]);
}
