//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use folio::config::{Settings, StoreMode};
use std::path::PathBuf;

/// Folio markdown blog server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root holding `folio.toml` (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name (default: folio.toml)
    #[arg(short = 'C', long, default_value = "folio.toml")]
    pub config: PathBuf,

    /// Blog root holding config.yml, entries/ and pages/ (relative to project root)
    #[arg(short, long)]
    pub content: Option<PathBuf>,

    /// Print debug output
    #[arg(long)]
    pub debug: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the blog. Reload changed files automatically
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,

        /// enable watch
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,

        /// Mirror parsed content to the durable store
        #[arg(long)]
        durable: bool,
    },

    /// Parse everything once and print a summary
    Check,
}

impl Cli {
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("./"))
    }

    /// Apply command-line overrides on top of `folio.toml`.
    pub fn update_settings(&self, settings: &mut Settings) {
        if let Some(content) = &self.content {
            settings.site.content.clone_from(content);
        }

        if let Commands::Serve {
            interface,
            port,
            watch,
            durable,
        } = &self.command
        {
            if let Some(interface) = interface {
                settings.serve.interface.clone_from(interface);
            }
            if let Some(port) = port {
                settings.serve.port = *port;
            }
            if let Some(watch) = watch {
                settings.serve.watch = *watch;
            }
            if *durable {
                settings.store.mode = StoreMode::Durable;
            }
        }
    }
}
