pub mod api;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod playback;
pub mod session;
pub mod store;
pub mod token;

#[cfg(test)]
mod testing;

use api::client::SpotifyClient;
use clock::{Clock, SystemClock};
use commands::{auth_commands, playback_commands};
use config::AppConfig;
use error::AppResult;
use events::{EventSink, UiEvent};
use session::{Session, SessionPhase};
use std::io::Write;
use std::sync::Arc;
use store::FileCredentialStore;
use token::TokenManager;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct AppState {
    pub config: AppConfig,
    pub session: Session,
}

pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("nowplaying=info"))
        .init();
}

/// Config from disk, or defaults written back so the file exists next time.
pub fn load_config() -> AppConfig {
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}. Using defaults.", e);
        let default_config = AppConfig::default();
        if let Err(save_err) = default_config.save() {
            log::error!("Failed to save default config: {}", save_err);
        }
        default_config
    });
    config.apply_env();
    config
}

/// Wire the HTTP client, the session file and the session controller.
pub fn build_state(config: AppConfig, sink: Arc<dyn EventSink>) -> AppResult<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = Arc::new(SpotifyClient::new(&config, Arc::clone(&clock))?);
    let store = Arc::new(FileCredentialStore::new(AppConfig::session_path()?));
    let tokens = TokenManager::new(
        config.client_id.clone(),
        config.redirect_uri.clone(),
        config.transport_controls,
        client.clone(),
        store,
        clock,
    );
    let session = Session::new(config.clone(), tokens, client, sink);
    Ok(AppState { config, session })
}

fn open(require_client: bool) -> AppResult<(AppState, JoinHandle<()>)> {
    let config = load_config();
    if require_client {
        config.validate()?;
    }
    let (tx, rx) = mpsc::unbounded_channel();
    let state = build_state(config, Arc::new(tx))?;
    Ok((state, spawn_printer(rx)))
}

/// Print UI events to the terminal. Progress overwrites its own line.
fn spawn_printer(mut rx: mpsc::UnboundedReceiver<UiEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut on_progress_line = false;
        while let Some(event) = rx.recv().await {
            if print_event(&event, &mut on_progress_line).is_err() {
                break;
            }
        }
    })
}

fn print_event(event: &UiEvent, on_progress_line: &mut bool) -> std::io::Result<()> {
    let Some(line) = event.render() else {
        return Ok(());
    };
    let mut stdout = std::io::stdout().lock();
    if matches!(event, UiEvent::Progress(_)) {
        *on_progress_line = true;
        write!(stdout, "\r{}", line)?;
    } else {
        if std::mem::take(on_progress_line) {
            writeln!(stdout)?;
        }
        writeln!(stdout, "{}", line)?;
        if let UiEvent::PhaseChanged {
            phase: SessionPhase::SignedOut,
        } = event
        {
            writeln!(stdout, "Signed out. Run `nowplaying login` to sign in again.")?;
        }
    }
    stdout.flush()
}

async fn control_until_quit(state: &AppState) -> AppResult<()> {
    if state.session.phase().await != SessionPhase::Active {
        println!("Not signed in. Run `nowplaying login` first.");
        return Ok(());
    }
    if state.config.transport_controls {
        println!("Controls: n next, p previous, t or space play/pause, q quit");
    } else {
        println!("Press q to quit");
    }
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    playback_commands::run_controls(state, stdin).await
}

pub async fn login() -> AppResult<()> {
    let (state, _printer) = open(true)?;
    let url = auth_commands::login(&state)?;
    println!("Open this URL to sign in:\n\n{}\n", url);
    println!("Then run `nowplaying callback <redirect-url>` with the address you land on.");
    Ok(())
}

pub async fn callback(redirect_url: &str) -> AppResult<()> {
    let (state, _printer) = open(true)?;
    auth_commands::handle_auth_callback(&state, redirect_url).await?;
    control_until_quit(&state).await
}

pub async fn run() -> AppResult<()> {
    let (state, _printer) = open(true)?;
    auth_commands::restore_session(&state).await?;
    control_until_quit(&state).await
}

pub async fn logout() -> AppResult<()> {
    let (state, _printer) = open(false)?;
    auth_commands::logout(&state).await?;
    println!("Signed out");
    Ok(())
}

pub async fn status() -> AppResult<()> {
    let (state, _printer) = open(false)?;
    let status = auth_commands::check_auth_status(&state).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
