//! Settings file management command

use anyhow::{Context, Result};
use clover_core::Settings;
use console::style;
use std::path::PathBuf;

/// Arguments for the config command
pub struct ConfigArgs {
    /// Initialize a new settings file with defaults
    pub init: bool,
    /// Show the path to the settings file
    pub path: bool,
    /// Show settings in JSON format
    pub json: bool,
    /// Suppress informational output
    pub quiet: bool,
    /// Settings file to use
    pub config_file: Option<PathBuf>,
}

/// Execute the config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    if args.path {
        match &args.config_file {
            Some(path) => println!("{}", path.display()),
            None => eprintln!("{}", style("Could not determine config path").yellow()),
        }
        return Ok(());
    }

    if args.init {
        return init_config(args.config_file, args.quiet);
    }

    show_config(args.config_file, args.json)
}

/// Write a settings file with default values, leaving an existing one alone
fn init_config(config_path: Option<PathBuf>, quiet: bool) -> Result<()> {
    let path = config_path.context("Could not determine configuration directory")?;

    if path.exists() {
        eprintln!(
            "{} Configuration file already exists at: {}",
            style("Warning:").yellow(),
            path.display()
        );
        eprintln!("Use a text editor to modify it, or delete it to re-initialize.");
        return Ok(());
    }

    let saved_path = Settings::default()
        .save_to_path(Some(path))
        .context("Failed to save configuration file")?;

    if !quiet {
        println!(
            "{} Created configuration file at: {}",
            style("Success:").green(),
            saved_path.display()
        );
        println!();
        println!("Flags given on the command line override these defaults, e.g.:");
        println!();
        println!("  [probe]");
        println!("  block_size = \"4M\"      # Larger blocks for fast media");
        println!("  no_delete = true       # Keep block files for inspection");
    }

    Ok(())
}

/// Show the effective settings
fn show_config(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());

    // An explicitly broken file is reported rather than silently replaced
    let settings = match &config_path {
        Some(path) if config_exists => Settings::read(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        _ => Settings::default(),
    };

    if json {
        let json_output = serde_json::to_string_pretty(&settings)
            .context("Failed to serialize settings to JSON")?;
        println!("{}", json_output);
        return Ok(());
    }

    println!("{}", style("Clover Configuration").bold());
    println!();

    if let Some(path) = &config_path {
        if config_exists {
            println!("  {} {}", style("Config file:").dim(), path.display());
        } else {
            println!(
                "  {} {} {}",
                style("Config file:").dim(),
                path.display(),
                style("(not found, using defaults)").yellow()
            );
        }
    }
    println!();

    println!("{}", style("[probe]").cyan());
    println!("  block_size = \"{}\"", settings.probe.block_size);
    println!(
        "  skip_integrity_check = {}",
        settings.probe.skip_integrity_check
    );
    println!("  no_delete = {}", settings.probe.no_delete);
    println!("  sync = {}", settings.probe.sync);
    println!();

    println!("{}", style("[output]").cyan());
    println!("  json = {}", settings.output.json);
    println!("  quiet = {}", settings.output.quiet);

    if !config_exists {
        println!();
        println!(
            "{}",
            style("Run 'clover config --init' to create a configuration file.").dim()
        );
    }

    Ok(())
}
