use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::remote::RestClient;
use crate::session::SessionStore;

pub mod commands;

use self::commands::{
    AppContext, CategoryArgs, DeleteArgs, DraftArgs, EditArgs, ExportArgs, ListArgs, LoginArgs,
    NewArgs, ProfileArgs, RegisterArgs, SearchArgs, ShowArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "secretkeeper",
    version,
    about = "Command-line client for the SecretKeeper notes service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over SECRETKEEPER_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over SECRETKEEPER_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login(LoginArgs),
    /// Create an account
    Register(RegisterArgs),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List active notes
    List(ListArgs),
    /// Search active notes by title or content
    Search(SearchArgs),
    /// Print a single note
    Show(ShowArgs),
    /// Create a note
    New(NewArgs),
    /// Edit an existing note
    Edit(EditArgs),
    /// Move a note to the recycle bin
    Delete(DeleteArgs),
    /// Manage categories
    Categories(CategoryArgs),
    /// Show note statistics
    Stats,
    /// View or update account preferences
    Profile(ProfileArgs),
    /// Inspect or discard local fallback drafts
    Drafts(DraftArgs),
    /// Export active notes as JSON
    Export(ExportArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("SECRETKEEPER_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("SECRETKEEPER_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;

    if config.remote.base_url.is_empty() {
        anyhow::bail!(
            "no remote endpoint configured; set remote.base_url in {} or SECRETKEEPER_REMOTE_URL",
            paths.config_file.display()
        );
    }

    let remote = Arc::new(
        RestClient::new(&config.remote)
            .map_err(|err| anyhow::anyhow!("building remote client: {err}"))?,
    );
    let context = AppContext {
        config: Arc::new(config),
        sessions: SessionStore::new(&paths.state_dir),
        remote,
        paths,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime.block_on(commands::dispatch(context, cli.command))
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
