use crate::error::AppResult;
use crate::AppState;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    Next,
    Previous,
    Toggle,
    Quit,
}

/// Map one input line to a control. A line of only spaces toggles.
pub fn parse_key(line: &str) -> Option<ControlKey> {
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.is_empty() && line.trim().is_empty() {
        return Some(ControlKey::Toggle);
    }
    match line.trim() {
        "n" => Some(ControlKey::Next),
        "p" => Some(ControlKey::Previous),
        "t" => Some(ControlKey::Toggle),
        "q" => Some(ControlKey::Quit),
        _ => None,
    }
}

pub async fn next_track(state: &AppState) -> AppResult<()> {
    state.session.skip_next().await
}

pub async fn previous_track(state: &AppState) -> AppResult<()> {
    state.session.skip_previous().await
}

pub async fn toggle_playback(state: &AppState) -> AppResult<()> {
    state.session.toggle_play_pause().await
}

/// Read control keys until `q` or end of input. Rejected commands are
/// logged and the loop keeps going.
pub async fn run_controls<R>(state: &AppState, input: R) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let result = match parse_key(&line) {
            Some(ControlKey::Next) => next_track(state).await,
            Some(ControlKey::Previous) => previous_track(state).await,
            Some(ControlKey::Toggle) => toggle_playback(state).await,
            Some(ControlKey::Quit) => break,
            None => {
                if !line.trim().is_empty() {
                    log::debug!("Ignoring input {:?}", line);
                }
                continue;
            }
        };
        if let Err(e) = result {
            log::warn!("Command not applied: {}", e);
        }
    }
    state.session.stop_polling().await;
    Ok(())
}
