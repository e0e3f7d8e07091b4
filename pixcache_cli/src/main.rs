use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use pixcache_cli::config::{ConfigManager, get_config};
use pixcache_core::{DataSize, ImageCache, ResolveOptions};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pixcache")]
#[command(author, version, about = "Pixcache - Two-tier image cache", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an image through the cache tiers
    Fetch {
        /// Image URL
        url: String,

        /// Write the image bytes to this file, adding the format's extension if it has none
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Never go to the network
        #[arg(long)]
        cache_only: bool,

        /// Skip the disk tier
        #[arg(long)]
        memory_only: bool,

        /// Serve disk hits without checking the origin
        #[arg(long)]
        no_revalidate: bool,

        /// Ignore cached copies and download again
        #[arg(long)]
        force_refresh: bool,
    },

    /// Remove expired entries and trim the disk cache to capacity
    Sweep,

    /// Remove every cached image
    Clear,

    /// Show disk cache occupancy
    Usage,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Get a configuration value
    Get {
        /// Configuration key (e.g., memory.capacity_bytes)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., disk.expiration)
        key: String,

        /// Value to set
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on debug flag
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Warn)
            .filter_module("pixcache_core", log::LevelFilter::Debug)
            .filter_module("pixcache_cli", log::LevelFilter::Debug)
            .filter_module("pixcache", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Commands::Fetch {
            url,
            output,
            cache_only,
            memory_only,
            no_revalidate,
            force_refresh,
        } => {
            let options = ResolveOptions::new()
                .with_cache_only(cache_only)
                .with_memory_only(memory_only)
                .with_revalidation(!no_revalidate)
                .with_force_refresh(force_refresh);
            handle_fetch(&url, output, options).await
        }
        Commands::Sweep => {
            let cache = open_cache()?;
            let report = cache.sweep().await.context("Sweep failed")?;
            println!("Removed {} disk entries", report.disk);
            Ok(())
        }
        Commands::Clear => {
            let cache = open_cache()?;
            let removed = cache.clear().await.context("Clearing the cache failed")?;
            println!("Removed {removed} disk entries");
            Ok(())
        }
        Commands::Usage => {
            let cache = open_cache()?;
            let usage = cache
                .disk()
                .usage()
                .context("Could not read the cache folder")?;
            println!("{}", "Disk cache".bold().blue());
            println!("  Folder:   {}", cache.disk().folder().display());
            println!("  Entries:  {}", usage.entry_count);
            println!(
                "  Size:     {} of {}",
                usage.total_size,
                cache.disk().capacity()
            );
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
    }
}

fn open_cache() -> Result<ImageCache> {
    let config = get_config()?;
    ImageCache::from_config(&config).context("Failed to open the image cache")
}

async fn handle_fetch(url: &str, output: Option<PathBuf>, options: ResolveOptions) -> Result<()> {
    let cache = open_cache()?;
    let start = Instant::now();

    let Some(payload) = cache.resolve(url, options).await else {
        anyhow::bail!("Image not available: {url}");
    };
    let elapsed = start.elapsed();

    if let Some(mut path) = output {
        if path.extension().is_none() {
            path.set_extension(payload.format.extension());
        }
        std::fs::write(&path, &payload.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("{} {}", "Saved".green(), path.display());
    }

    println!(
        "{url}: {} {:?}{} in {:.2?}",
        DataSize::from_len(payload.bytes.len()),
        payload.format,
        payload
            .validator
            .as_deref()
            .map(|v| format!(" etag={v}"))
            .unwrap_or_default(),
        elapsed
    );
    Ok(())
}

fn handle_config_command(command: ConfigCommand) -> Result<()> {
    let mut manager = ConfigManager::new();

    match command {
        ConfigCommand::Show => {
            let items = manager.list()?;
            eprintln!("{}", "Configuration:".bold().blue());
            eprintln!("Config file: {}", manager.get_config_path().display());
            eprintln!();

            let mut current_section = String::new();
            for (key, value) in items {
                let (section, name) = key.split_once('.').unwrap_or(("general", key.as_str()));
                if section != current_section {
                    println!("[{}]", section.yellow());
                    current_section = section.to_string();
                }
                println!("  {} = {}", name.cyan(), value);
            }
        }
        ConfigCommand::Path => {
            println!("{}", manager.get_config_path().display());
        }
        ConfigCommand::Get { key } => {
            println!("{}", manager.get(&key)?);
        }
        ConfigCommand::Set { key, value } => {
            manager.set(&key, &value)?;
            eprintln!("{} {} = {}", "Set".green(), key, value);
        }
    }

    Ok(())
}
