//! Roombook command line.
//!
//! # Usage
//!
//! ```bash
//! roombook login --email ada@example.com
//! roombook book --capacity 2 --duration 60 --time 2025-03-11T09:15
//! roombook rooms
//! roombook browse
//! roombook interactive
//! roombook serve
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use roombook::app::{RoombookApp, TERMINAL_SESSION};
use roombook::config::Config;
use roombook::fast_path::{BookRequest, DEFAULT_DURATION_MINUTES};
use roombook::interaction::{Action, InteractionState, Values};
use roombook::server::{self, AppState};
use roombook_runtime::metrics::MetricsRecorder;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "roombook", version, about = "Book coworking meeting rooms")]
struct Cli {
    /// Where sessions and accounts are stored
    #[arg(long, global = true, env = "ROOMBOOK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session tokens
    Login {
        /// Account email
        #[arg(long, short)]
        email: String,
        /// Account password (prompted on stdin when omitted)
        #[arg(long, short, env = "ROOMBOOK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Book a room right away
    Book {
        /// For how many people (clamped to 1..=2)
        #[arg(long, short, default_value_t = 1, allow_negative_numbers = true)]
        capacity: i64,
        /// Exact room name; first available room otherwise
        #[arg(long, short)]
        name: Option<String>,
        /// Start, `yyyy-MM-ddTHH:mm` on a quarter hour; next quarter hour otherwise
        #[arg(long, short)]
        time: Option<String>,
        /// Minutes, a multiple of 15 (capped at 120)
        #[arg(long, short, default_value_t = DEFAULT_DURATION_MINUTES, allow_negative_numbers = true)]
        duration: i64,
    },
    /// List the rooms of the coworking space
    Rooms,
    /// Interactive quick booking
    QuickBook,
    /// Interactive search, then pick a room
    Browse,
    /// Interactive list of upcoming reservations
    Reservations,
    /// Line-based interactive session
    Interactive,
    /// Run the chat webhook server
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roombook=info,roombook_runtime=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let app = RoombookApp::from_config(&config).await?;
    match cli.command {
        Commands::Login { email, password } => login(&app, email, password).await,
        Commands::Logout => {
            app.logout(TERMINAL_SESSION).await?;
            println!("Logged out");
            Ok(())
        },
        Commands::Book {
            capacity,
            name,
            time,
            duration,
        } => {
            let request = BookRequest {
                capacity,
                room_name: name,
                start: time,
                duration_minutes: duration,
            };
            let summary = app.book(TERMINAL_SESSION, &request).await?;
            println!("Booking complete!");
            println!("{summary}");
            Ok(())
        },
        Commands::Rooms => {
            let rooms = app.rooms(TERMINAL_SESSION).await?;
            print!("{}", roombook::terminal::rooms_table(&rooms));
            Ok(())
        },
        Commands::QuickBook => interactive(&app, Some("quick-book")).await,
        Commands::Browse => interactive(&app, Some("browse")).await,
        Commands::Reservations => interactive(&app, Some("reservations")).await,
        Commands::Interactive => interactive(&app, None).await,
        Commands::Serve => serve(app, &config).await,
    }
}

async fn login(app: &RoombookApp, email: String, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password().await?,
    };

    app.store().reset(TERMINAL_SESSION, InteractionState::default()).await?;
    let values = Values::new().with("email", email).with("password", password);
    let state = app.interact(TERMINAL_SESSION, Action::submit("login", values)).await?;

    match state {
        InteractionState::Landing(landing) => {
            println!("Logged in, {:.2} credits left", landing.credits.unwrap_or_default());
            Ok(())
        },
        other => anyhow::bail!(other.error().unwrap_or("login failed").to_string()),
    }
}

async fn interactive(app: &RoombookApp, screen: Option<&str>) -> anyhow::Result<()> {
    roombook::terminal::run_at(app, screen, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

async fn read_password() -> anyhow::Result<String> {
    use tokio::io::AsyncBufReadExt;

    eprint!("password: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("cannot read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn serve(app: RoombookApp, config: &Config) -> anyhow::Result<()> {
    tracing::info!("Starting roombook webhook server...");

    let mut metrics = MetricsRecorder::new();
    metrics.install()?;

    server::serve(&config.bind_address(), AppState::new(app, Arc::new(metrics))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_screens_are_subcommands() {
        for (arg, expected) in [
            ("rooms", "Rooms"),
            ("quick-book", "QuickBook"),
            ("browse", "Browse"),
            ("reservations", "Reservations"),
        ] {
            let cli = Cli::try_parse_from(["roombook", arg]);
            let name = match cli.map(|cli| cli.command) {
                Ok(Commands::Rooms) => "Rooms",
                Ok(Commands::QuickBook) => "QuickBook",
                Ok(Commands::Browse) => "Browse",
                Ok(Commands::Reservations) => "Reservations",
                _ => "other",
            };
            assert_eq!(name, expected, "{arg}");
        }
    }
}
