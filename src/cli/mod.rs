pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "storyline")]
#[command(about = "Share and browse photo stories", long_about = None)]
pub struct Cli {
    /// Path to the local database (defaults to the user data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Forget the session
    Logout,
    /// Show the current session and settings
    Whoami,
    /// Browse the story feed
    Feed {
        /// Reload from the first page
        #[arg(short, long)]
        refresh: bool,
        /// Fetch the next page before listing
        #[arg(short, long)]
        more: bool,
    },
    /// Show a single story
    Show {
        id: String,
    },
    /// Upload a new story
    Upload {
        /// Image file to upload
        photo: PathBuf,
        #[arg(short, long)]
        description: String,
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// List stories that carry a location
    Map,
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Switch dark mode on or off
    DarkMode { state: Toggle },
    /// Set the interface language (e.g. "en", "id")
    Language { code: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}
