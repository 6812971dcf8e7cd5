use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;
mod render;

use commands::Context;

#[derive(Parser)]
#[command(name = "daydream")]
#[command(about = "Daydream - chat with the dream forge from your terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// User id to act as (overrides DAYDREAM_USER_ID and the saved login)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Backend origin (overrides the config file and DAYDREAM_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log client activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat {
        /// Wait for whole replies instead of streaming them
        #[arg(long)]
        no_stream: bool,
    },
    /// Inspect or clear the persisted conversation
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Remember a user id for future sessions
    Login { user_id: String },
    /// Forget the remembered user id
    Logout,
    /// Show the active user id and where it came from
    Whoami,
    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print the stored conversation
    Show,
    /// Delete the stored conversation
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration
    Show,
    /// Write a config file with default values
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let ctx = Context::new(cli.user, cli.api_url)?;

    match cli.command.unwrap_or(Commands::Chat { no_stream: false }) {
        Commands::Chat { no_stream } => commands::chat::run(&ctx, no_stream).await?,
        Commands::History { action } => match action {
            HistoryAction::Show => commands::history::show(&ctx).await?,
            HistoryAction::Clear => commands::history::clear(&ctx).await?,
        },
        Commands::Login { user_id } => commands::identity::login(&ctx, &user_id)?,
        Commands::Logout => commands::identity::logout(&ctx)?,
        Commands::Whoami => commands::identity::whoami(&ctx),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&ctx)?,
            ConfigAction::Init => commands::config::init(&ctx)?,
        },
    }

    Ok(())
}
