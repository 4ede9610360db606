//! Hookhost - inspect plugin folders and manifests.
//!
//! Shows how a host using hookhost would classify the plugins it finds,
//! without constructing any of them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hookhost::plugin::{scan_folder, FilterPipeline, PluginFolder, PluginSummary};
use hookhost::{ManagerOptions, PluginConfig, PluginManifest};

/// Plugin registry inspector
#[derive(Parser)]
#[command(name = "hookhost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan plugin folders and show how each plugin would be classified
    Scan {
        /// Folders to scan instead of the configured ones
        folders: Vec<PathBuf>,

        /// Configuration file (defaults to .hookhost.toml, then the global file)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate a plugin manifest
    Check {
        /// Manifest file or plugin folder
        path: PathBuf,
    },

    /// Show the effective plugin configuration
    Config {
        /// Show the global configuration file path
        #[arg(long)]
        path: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Scan { folders, config, format } => {
            cmd_scan(&folders, config.as_deref(), &format)?;
        }
        Commands::Check { path } => {
            cmd_check(&path)?;
        }
        Commands::Config { path } => {
            cmd_config(path)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PluginConfig> {
    match path {
        Some(path) => PluginConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => PluginConfig::load(),
    }
}

#[derive(Serialize)]
struct ScanReport {
    plugins: Vec<PluginSummary>,
    duplicates: Vec<PluginSummary>,
}

/// Classify every plugin found in the plugin folders.
fn cmd_scan(folders: &[PathBuf], config: Option<&Path>, format: &str) -> Result<()> {
    let config = load_config(config)?;
    let mut options = ManagerOptions::from_config(&config)?;
    if !folders.is_empty() {
        options.folders = folders.iter().map(PluginFolder::new).collect();
    }

    let filter = FilterPipeline::new(&options);
    let mut positions = HashMap::new();
    let mut malformed = HashSet::new();
    let mut report = ScanReport { plugins: Vec::new(), duplicates: Vec::new() };

    for folder in &options.folders {
        for candidate in scan_folder(folder) {
            let summary = filter.classify(&candidate);
            let unusable = candidate.manifest.is_err();
            match positions.get(&summary.identifier).copied() {
                None => {
                    if unusable {
                        malformed.insert(summary.identifier.clone());
                    }
                    positions.insert(summary.identifier.clone(), report.plugins.len());
                    report.plugins.push(summary);
                }
                // A readable manifest takes over from an unreadable one
                Some(position) if !unusable && malformed.remove(&summary.identifier) => {
                    let previous = std::mem::replace(&mut report.plugins[position], summary);
                    report.duplicates.push(previous);
                }
                Some(_) => report.duplicates.push(summary),
            }
        }
    }

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{json}");
        }
        _ => {
            for plugin in &report.plugins {
                let mut flags = Vec::new();
                if plugin.bundled {
                    flags.push("bundled");
                }
                if plugin.restart_required {
                    flags.push("restart");
                }
                let flags =
                    if flags.is_empty() { String::new() } else { format!(" [{}]", flags.join(", ")) };

                println!("{:<24} {} {}{}", plugin.state, plugin.identifier, plugin.version, flags);
                if let Some(reason) = &plugin.reason {
                    println!("{:<24}   {reason}", "");
                }
            }
            for duplicate in &report.duplicates {
                let location =
                    duplicate.location.as_deref().map(|l| l.display().to_string()).unwrap_or_default();
                println!("{:<24} {} ({location})", "duplicate", duplicate.identifier);
            }
            println!("\nTotal: {} plugins", report.plugins.len());
        }
    }

    Ok(())
}

/// Validate a single manifest and report what it requires.
fn cmd_check(path: &Path) -> Result<()> {
    let manifest_path =
        if path.is_dir() { path.join(hookhost::plugin::MANIFEST_FILE) } else { path.to_path_buf() };

    let manifest = PluginManifest::from_file(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    manifest.validate()?;

    println!("{} {} is valid", manifest.identifier(), manifest.plugin.version);
    if !manifest.plugin.hooks.is_empty() {
        println!("  Hooks: {}", manifest.plugin.hooks.join(", "));
    }
    if let Some(requirement) = &manifest.compatibility.host {
        let host = ManagerOptions::default().host_version;
        let verdict = if manifest.is_compatible_with(&host) { "compatible" } else { "incompatible" };
        println!("  Host: {requirement} ({verdict} with {host})");
    }
    if !manifest.compatibility.capabilities.is_empty() {
        println!("  Capabilities: {}", manifest.compatibility.capabilities.join(", "));
    }

    Ok(())
}

/// Print the effective configuration.
fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = PluginConfig::global_config_path() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = PluginConfig::load()?;
    println!("{}", config.to_toml()?);

    Ok(())
}
