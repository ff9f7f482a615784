pub mod auth_commands;
pub mod playback_commands;
