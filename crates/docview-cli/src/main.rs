mod app;
mod render;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use docview_config::Config;
use docview_engine::ViewOptions;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::{
    env,
    io::{Stdout, stdout},
    path::PathBuf,
    process,
};

use app::App;

/// Logs go to the file named by `DOCVIEW_LOG`, never to the terminal the UI
/// is drawing on.
fn init_logging() -> Result<()> {
    let Ok(path) = env::var("DOCVIEW_LOG") else {
        return Ok(());
    };
    let file = std::fs::File::create(&path).with_context(|| format!("Failed to create log file {path}"))?;
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    log::info!("docview starting up");

    // Document and decorations from CLI args, falling back to the config file
    let args: Vec<String> = env::args().collect();
    let config_path = Config::config_path();
    let config = match Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let (document_path, decorations_path) = match args.len() {
        1 => match config.document_path.clone() {
            Some(path) => (path, config.decorations_path.clone()),
            None => {
                eprintln!("Error: No document provided and none configured");
                eprintln!("Usage: {} <document> [decorations.toml]", args[0]);
                eprintln!("Or set document_path in {}", config_path.display());
                process::exit(1);
            }
        },
        2 => (PathBuf::from(&args[1]), config.decorations_path.clone()),
        3 => (PathBuf::from(&args[1]), Some(PathBuf::from(&args[2]))),
        _ => {
            eprintln!("Usage: {} [document] [decorations.toml]", args[0]);
            process::exit(1);
        }
    };
    log::info!(
        "document {}, decorations {:?}",
        document_path.display(),
        decorations_path
    );

    let options: ViewOptions = config.view;
    let mut app = match App::open(document_path, decorations_path.as_deref(), options) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("{err:?}");
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let result = match key.code {
            KeyCode::Esc => return Ok(()),
            KeyCode::Char('q') if ctrl => return Ok(()),
            KeyCode::Char('s') if ctrl => app.save(),
            KeyCode::Char('r') if ctrl => app.refresh(),
            KeyCode::Char(c) if !ctrl => {
                let mut buf = [0; 4];
                app.insert(c.encode_utf8(&mut buf))
            }
            KeyCode::Enter => app.insert("\n"),
            KeyCode::Backspace => app.backspace(),
            KeyCode::Delete => app.delete_forward(),
            KeyCode::Left => {
                app.move_left();
                Ok(())
            }
            KeyCode::Right => {
                app.move_right();
                Ok(())
            }
            KeyCode::Home => {
                app.move_home();
                Ok(())
            }
            KeyCode::End => {
                app.move_end();
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::warn!("edit failed: {err:#}");
            app.status = format!("error: {err:#}");
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());

    let title = format!(
        "{}{}",
        app.document_path.display(),
        if app.modified { " [+]" } else { "" }
    );
    let content = Paragraph::new(app.lines())
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(ratatui::widgets::Wrap { trim: false });
    f.render_widget(content, chunks[0]);

    let status = vec![
        Line::from(vec![
            Span::styled(app.cursor_info(), Style::default().fg(Color::Yellow)),
            Span::raw(" | "),
            Span::raw(app.status.clone()),
        ]),
        Line::from(Span::raw(
            "Esc/Ctrl-q: Quit | Ctrl-s: Save | Ctrl-r: Refresh | ←/→/Home/End: Move",
        )),
    ];
    f.render_widget(Paragraph::new(status).block(Block::default()), chunks[1]);
}
