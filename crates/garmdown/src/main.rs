use std::path::PathBuf;

use clap::{Parser, Subcommand};
use garmdown::cli::{commands, AppContext};
use garmdown::config::TokenKind;
use garmdown::reporter::ReportFormat;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "garmdown")]
#[command(author, version, about = "Download Garmin Connect activities and fill a training sheet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/garmdown/config.toml)
    #[arg(short, long, global = true, env = "GARMDOWN_CONFIG")]
    config: Option<PathBuf>,

    /// Profile to use
    #[arg(short, long, global = true, env = "GARMDOWN_PROFILE")]
    profile: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch activity metadata into the database
    Activity {
        /// Number of activities to fetch (default: download.activity_chunk_size)
        #[arg(short, long)]
        limit: Option<u32>,
        /// Starting 0-based activity index
        #[arg(short, long, default_value = "0")]
        start: u32,
    },
    /// Download TCX files not yet downloaded
    Tcx {
        /// Number of files to download (default: download.tcx_chunk_size)
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Copy downloaded TCX files to the import directory
    Import {
        /// Re-import activities starting on or after this date (YYYY-MM-DD)
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Fetch activities, download and import TCX files, then back up if due
    Download {
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Remove every file from the import directory
    Clean,
    /// List activities not yet downloaded
    Notdown {
        /// Show every attribute
        #[arg(short, long)]
        detail: bool,
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// List activities not yet imported
    Notimport {
        /// Show every attribute
        #[arg(short, long)]
        detail: bool,
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Back up the database now
    Backup,
    /// Report the activities of a day
    Report {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Summary)]
        format: ReportFormat,
    },
    /// Fill stale rows of the training sheet
    Sheet,
    /// Download everything, then update the training sheet
    Sync {
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show database counts
    Status,
    /// Manage service tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Store a bearer token
    Set {
        #[arg(value_enum)]
        service: TokenKind,
        /// Token value; prompted for when omitted
        #[arg(long)]
        token: Option<String>,
        /// Seconds until the token expires
        #[arg(long)]
        expires_in: Option<i64>,
    },
    /// Remove a stored token
    Clear {
        #[arg(value_enum)]
        service: TokenKind,
    },
    /// Show stored tokens
    Status,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "garmdown=debug" } else { "garmdown=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = AppContext::load(cli.config, cli.profile).and_then(|ctx| match cli.command {
        Commands::Activity { limit, start } => commands::activities(&ctx, limit, start),
        Commands::Tcx { limit } => commands::tcx(&ctx, limit),
        Commands::Import { from } => commands::import(&ctx, from),
        Commands::Download { limit } => commands::download(&ctx, limit),
        Commands::Clean => commands::clean(&ctx),
        Commands::Notdown { detail, limit } => commands::not_downloaded(&ctx, detail, limit),
        Commands::Notimport { detail, limit } => commands::not_imported(&ctx, detail, limit),
        Commands::Backup => commands::backup(&ctx),
        Commands::Report { date, format } => commands::report(&ctx, date, format),
        Commands::Sheet => commands::sheet(&ctx),
        Commands::Sync { limit } => commands::sync_all(&ctx, limit),
        Commands::Status => commands::status(&ctx),
        Commands::Token { command } => match command {
            TokenCommands::Set {
                service,
                token,
                expires_in,
            } => commands::token_set(&ctx, service, token, expires_in),
            TokenCommands::Clear { service } => commands::token_clear(&ctx, service),
            TokenCommands::Status => commands::token_status(&ctx),
        },
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
