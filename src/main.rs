use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nowplaying", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the Spotify authorization URL
    Login,
    /// Finish login with the address the browser was redirected to
    Callback { url: String },
    /// Show what is playing using the stored session (default)
    Run,
    /// Forget the stored session
    Logout,
    /// Print the stored session as JSON
    Status,
}

#[tokio::main]
async fn main() {
    nowplaying_lib::init_logging();
    let args = Args::parse();

    let result = match args.command.unwrap_or(Command::Run) {
        Command::Login => nowplaying_lib::login().await,
        Command::Callback { url } => nowplaying_lib::callback(&url).await,
        Command::Run => nowplaying_lib::run().await,
        Command::Logout => nowplaying_lib::logout().await,
        Command::Status => nowplaying_lib::status().await,
    };

    if let Err(e) = result {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
