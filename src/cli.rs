//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scribed")]
#[command(about = "Real-time speech-to-text streaming server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bind host (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Bind port (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Whisper model name (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Transcription language, or "auto" (overrides config)
    #[arg(short, long, global = true)]
    pub language: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the streaming server (the default)
    Serve,
    /// Transcribe a single audio file and print the text
    Transcribe {
        /// Audio file (WAV, WebM, Ogg, MP4, MP3)
        file: PathBuf,
    },
    /// Manage Whisper models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List catalog models and their installation status
    List,
    /// Download and install a model
    Install {
        /// Model name (e.g. "base", "small.en")
        name: String,
    },
}
