//! FsGate command-line front-end
//!
//! Runs single gateway operations against the configured root folder.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gateway::config::{default_config_path, Config};
use gateway::contracts::Caller;
use gateway::Gateway;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// FsGate - sandboxed file access over a single root folder.
#[derive(Parser, Debug)]
#[command(name = "fsgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Identity to act as (empty for anonymous)
    #[arg(short, long, global = true, default_value = "")]
    pub user: String,

    /// Role held by the caller (repeatable)
    #[arg(short, long = "role", global = true, value_name = "ROLE")]
    pub roles: Vec<String>,

    /// Print listings as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the folders and files inside a folder
    Ls {
        /// Virtual folder path
        #[arg(default_value = "/")]
        path: String,
    },

    /// Download a file
    Get {
        /// Virtual file path
        path: String,

        /// Write to this local file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Upload a local file ("-" reads stdin)
    Put {
        /// Local file to upload
        local: PathBuf,

        /// Virtual destination folder
        #[arg(default_value = "/")]
        folder: String,

        /// File name to store under (defaults to the local name)
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Delete a file
    Rm {
        /// Virtual file path
        path: String,
    },

    /// Copy a file
    Cp {
        /// Virtual source file
        src: String,
        /// Virtual destination file
        dst: String,
    },

    /// Move a file
    Mv {
        /// Virtual source file
        src: String,
        /// Virtual destination file
        dst: String,
    },

    /// Create a folder
    Mkdir {
        /// Virtual folder path
        path: String,
    },

    /// Delete a folder and its contents
    Rmdir {
        /// Virtual folder path
        path: String,
    },

    /// Move a folder
    Mvdir {
        /// Virtual source folder
        src: String,
        /// Virtual destination folder
        dst: String,
    },

    /// Check whether a file (or folder) exists
    Exists {
        /// Virtual path
        path: String,

        /// Check for a folder instead of a file
        #[arg(long)]
        folder: bool,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Serialize)]
struct Listing {
    folders: Vec<String>,
    files: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    // Initialize tracing
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.log_level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(io::stderr)
        .init();

    tracing::debug!("Using config file: {:?}", config_path);

    let caller = Caller::new(cli.user.clone(), cli.roles.iter().cloned());

    match cli.command {
        Commands::Config(cmd) => run_config_command(&cmd, &config, &config_path),
        command => {
            let gateway = Gateway::from_config(&config)?;
            run_operation(command, &gateway, &caller, cli.json)
        }
    }
}

fn run_operation(
    command: Commands,
    gateway: &Gateway,
    caller: &Caller,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Ls { path } => {
            let listing = Listing {
                folders: gateway.folders().list_folders(&path, caller)?,
                files: gateway.folders().list_files(&path, caller)?,
            };
            print_listing(&listing, json)?;
        }
        Commands::Get { path, output } => {
            let mut download = gateway.files().download(&path, caller)?;
            match output {
                Some(output) => {
                    let mut file = File::create(&output).with_context(|| {
                        format!("Failed to create output file: {}", output.display())
                    })?;
                    let bytes = download.copy_to(&mut file)?;
                    eprintln!(
                        "{} -> {} ({} bytes, {})",
                        download.path,
                        output.display(),
                        bytes,
                        download.content_type
                    );
                }
                None => {
                    let stdout = io::stdout();
                    let mut lock = stdout.lock();
                    download.copy_to(&mut lock)?;
                    lock.flush()?;
                }
            }
        }
        Commands::Put {
            local,
            folder,
            name,
        } => {
            let name = match name {
                Some(name) => name,
                None => local_file_name(&local)?,
            };
            let written = if local == Path::new("-") {
                gateway.files().upload(io::stdin().lock(), &folder, &name, caller)?
            } else {
                let file = File::open(&local)
                    .with_context(|| format!("Failed to open local file: {}", local.display()))?;
                gateway.files().upload(file, &folder, &name, caller)?
            };
            println!("{}", written);
        }
        Commands::Rm { path } => gateway.files().delete(&path, caller)?,
        Commands::Cp { src, dst } => gateway.files().copy(&src, &dst, caller)?,
        Commands::Mv { src, dst } => gateway.files().r#move(&src, &dst, caller)?,
        Commands::Mkdir { path } => gateway.folders().create_folder(&path, caller)?,
        Commands::Rmdir { path } => gateway.folders().delete_folder(&path, caller)?,
        Commands::Mvdir { src, dst } => gateway.folders().move_folder(&src, &dst, caller)?,
        Commands::Exists { path, folder } => {
            let exists = if folder {
                gateway.folders().folder_exists(&path, caller)?
            } else {
                gateway.folders().file_exists(&path, caller)?
            };
            println!("{}", exists);
        }
        Commands::Config(_) => bail!("config commands do not operate on the root folder"),
    }

    Ok(())
}

fn run_config_command(cmd: &ConfigCommands, config: &Config, path: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file already exists: {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

fn print_listing(listing: &Listing, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(listing)?);
        return Ok(());
    }

    if listing.folders.is_empty() && listing.files.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    for folder in &listing.folders {
        println!("{}/", folder);
    }
    for file in &listing.files {
        println!("{}", file);
    }
    Ok(())
}

fn local_file_name(local: &Path) -> anyhow::Result<String> {
    local
        .file_name()
        .filter(|_| local != Path::new("-"))
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| {
            format!(
                "Cannot derive a file name from '{}'; pass --name",
                local.display()
            )
        })
}
