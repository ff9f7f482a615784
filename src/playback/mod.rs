pub mod poller;
pub mod state;
pub mod transition;
