//! tokenwarden - a terminal client for a token-authenticated backend.
//!
//! Restores the previous session from the renewal cookie when it can,
//! otherwise prompts for credentials, then keeps the access token fresh
//! in the background while you issue commands.

mod commands;

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

use commands::{Command, HELP_TEXT};
use tokenwarden_core::utils::{format_countdown, format_expiry, truncate_string};
use tokenwarden_core::{
    ApiClient, AuthFailure, Config, LoginCredentials, SessionEvent, SessionManager, SessionState,
};

// ============================================================================
// Constants
// ============================================================================

/// Log file name inside the cache directory (rotated daily)
const LOG_FILE_NAME: &str = "tokenwarden.log";

/// Maximum characters of a response body to print
const MAX_PREVIEW_LEN: usize = 2000;

const PROMPT: &str = "tokenwarden> ";

type InputLines = Lines<BufReader<Stdin>>;

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a daily file in the cache directory so they don't interleave
/// with the prompt; stderr is used if that directory is unavailable.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, guard) = match config.cache_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        Err(_) => (BoxMakeWriter::new(std::io::stderr), None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        println!("Usage: tokenwarden [--check]\n");
        println!("  --check   Try to restore the saved session, print its status and exit");
        println!("\n{}", HELP_TEXT);
        return Ok(());
    }

    let mut config = Config::load()?;
    let _guard = init_tracing(&config);
    info!(base_url = %config.base_url, "tokenwarden starting");

    let manager = SessionManager::from_config(&config)?;
    let client = ApiClient::new(&config, manager.clone())?;

    if args.len() > 1 && args[1] == "--check" {
        let restored = manager.restore().await;
        print_status(&manager);
        manager.shutdown();
        if !restored {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = manager.subscribe();

    if manager.restore().await {
        println!("Session restored.");
        print_status(&manager);
    } else if !prompt_login(&manager, &mut config, &mut lines).await? {
        manager.shutdown();
        return Ok(());
    }

    println!("Type `help` for commands.");
    let result = run_repl(&manager, &client, &mut config, &mut lines, &mut events).await;

    // Drop the renewal timer; the server keeps the cookie for next time
    manager.shutdown();
    info!("tokenwarden shutting down");
    result
}

/// What woke the command loop up
enum Input {
    Line(Option<String>),
    Event(Result<SessionEvent, RecvError>),
    Interrupt,
}

async fn run_repl(
    manager: &SessionManager,
    client: &ApiClient,
    config: &mut Config,
    lines: &mut InputLines,
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    loop {
        print_prompt();

        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            event = events.recv() => Input::Event(event),
            _ = tokio::signal::ctrl_c() => Input::Interrupt,
        };

        match input {
            Input::Line(None) | Input::Interrupt => {
                println!();
                return Ok(());
            }
            Input::Line(Some(line)) => match Command::parse(&line) {
                Command::Empty => {}
                Command::Quit => return Ok(()),
                Command::Help => println!("{}", HELP_TEXT),
                Command::Status => print_status(manager),
                Command::Renew => match manager.renew().await {
                    Ok(()) => {
                        println!("Renewed.");
                        print_status(manager);
                    }
                    Err(e) => println!("{}", e.user_message()),
                },
                Command::Get(path) => run_get(client, &path).await,
                Command::Login => {
                    if !prompt_login(manager, config, lines).await? {
                        return Ok(());
                    }
                }
                Command::Logout => {
                    manager.logout().await;
                    println!("Logged out. Type `login` to sign in again.");
                }
                Command::Unknown(message) => println!("{}", message),
            },
            Input::Event(Ok(SessionEvent::Expired)) => {
                println!("\n{}", AuthFailure::SessionExpired.user_message());
                if !prompt_login(manager, config, lines).await? {
                    return Ok(());
                }
            }
            Input::Event(Ok(SessionEvent::Renewed { expires_at })) => {
                info!(%expires_at, "Background renewal completed");
            }
            Input::Event(Ok(_)) => {}
            Input::Event(Err(RecvError::Lagged(skipped))) => {
                warn!(skipped, "Missed session events");
            }
            Input::Event(Err(RecvError::Closed)) => return Ok(()),
        }
    }
}

/// Prompt until a login succeeds. Returns false if input ran out.
async fn prompt_login(
    manager: &SessionManager,
    config: &mut Config,
    lines: &mut InputLines,
) -> Result<bool> {
    loop {
        match &config.last_identifier {
            Some(last) => print!("Username [{}]: ", last),
            None => print!("Username: "),
        }
        let _ = std::io::stdout().flush();

        let Some(input) = lines.next_line().await? else {
            return Ok(false);
        };
        let identifier = match (input.trim(), &config.last_identifier) {
            ("", Some(last)) => last.clone(),
            (typed, _) => typed.to_string(),
        };

        // rpassword reads from the terminal, not our stdin reader
        let secret =
            tokio::task::spawn_blocking(|| rpassword::prompt_password("Password: ")).await??;

        match manager.login(&LoginCredentials::new(identifier, secret)).await {
            Ok(_) => {
                println!("Logged in.");
                print_status(manager);
                remember_identifier(config, &input);
                return Ok(true);
            }
            Err(AuthFailure::RateLimited(wait)) => {
                println!("{}", AuthFailure::RateLimited(wait).user_message());
                tokio::time::sleep(wait.min(Duration::from_secs(5))).await;
            }
            Err(e) => println!("{}", e.user_message()),
        }
    }
}

fn remember_identifier(config: &mut Config, typed: &str) {
    let typed = typed.trim();
    if typed.is_empty() || config.last_identifier.as_deref() == Some(typed) {
        return;
    }
    config.last_identifier = Some(typed.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

async fn run_get(client: &ApiClient, path: &str) {
    match client.get::<serde_json::Value>(path).await {
        Ok(value) => {
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            println!("{}", truncate_string(&pretty, MAX_PREVIEW_LEN));
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn print_status(manager: &SessionManager) {
    let status = manager.status();
    let state = match status.state {
        SessionState::Unauthenticated => "logged out",
        SessionState::Authenticating => "logging in",
        SessionState::Authenticated => "logged in",
        SessionState::Renewing => "renewing",
    };
    println!("  State:    {}", state);
    if let Some(expires_at) = status.expires_at {
        println!("  Expires:  {}", format_expiry(expires_at, Utc::now()));
    }
    if let Some(secs) = status.renewal_in {
        println!("  Renewal:  in {}", format_countdown(Duration::from_secs(secs)));
    }
}

fn print_prompt() {
    print!("{}", PROMPT);
    let _ = std::io::stdout().flush();
}
