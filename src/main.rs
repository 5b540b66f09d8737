mod app;
mod config;
mod error;
mod event;
mod insight;
mod logging;
mod sim;
mod ui;
mod withdraw;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use app::App;
use clap::Parser;
use crossterm::event::{self as cevent, Event as CEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{error, info};

use crate::config::Cli;
use crate::event::Event;
use crate::insight::{GeminiProvider, InsightDispatcher, InsightProvider, OfflineProvider};
use crate::ui::draw;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::setup_logging(&cli.log_dir)?;
    let config = cli.sim_config()?;

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let provider = build_provider(&cli);
    let (tx, rx) = mpsc::channel();
    let dispatcher = InsightDispatcher::new(provider, tx.clone());
    let mut app = App::new(config, rng, dispatcher, Instant::now());
    info!(tick_ms = cli.tick_ms, seed = ?cli.seed, "dashboard starting");

    let mut terminal = setup_terminal()?;
    let res = run_app(&mut terminal, &mut app, tx, rx, cli.tick_rate());
    restore_terminal(&mut terminal)?;
    if let Err(err) = &res {
        error!("dashboard exited with error: {:#}", err);
    }
    res
}

fn build_provider(cli: &Cli) -> Arc<dyn InsightProvider> {
    match (&cli.api_key, cli.offline) {
        (Some(key), false) if !key.is_empty() => {
            info!(model = %cli.model, "insight provider online");
            Arc::new(GeminiProvider::new(key.clone(), cli.model.clone()))
        }
        _ => Arc::new(OfflineProvider),
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tx: Sender<Event>,
    rx: Receiver<Event>,
    tick_rate: Duration,
) -> Result<()> {
    let input_tx = tx.clone();
    thread::spawn(move || {
        loop {
            if !cevent::poll(Duration::from_millis(250)).unwrap_or(false) {
                continue;
            }
            match cevent::read() {
                Ok(CEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    if input_tx.send(Event::Input(key)).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => {}
            }
        }
    });

    thread::spawn(move || {
        loop {
            if tx.send(Event::Tick).is_err() {
                break;
            }
            thread::sleep(tick_rate);
        }
    });

    loop {
        terminal.draw(|f| draw(f, app))?;

        match rx.recv()? {
            Event::Input(key) => {
                app.on_key(key, Instant::now());
            }
            Event::Tick => {
                app.on_tick(Instant::now());
            }
            Event::Insight(insight) => {
                app.on_insight(insight);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
