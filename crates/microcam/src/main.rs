//! `microcam` - CLI for the camera frame receiver
//!
//! This binary runs the upload service and offers a few commands for
//! inspecting its storage and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use microcam::cli::{Cli, Command, ConfigCommand, ServeCommand};
use microcam::storage::OsFs;
use microcam::{init_logging, Config, FrameStore};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Validation runs separately so a broken file can be reported on
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        return handle_validate(file.clone().or_else(|| cli.config.clone()));
    }

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, &serve_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_serve(mut config: Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = &cmd.bind {
        config.server.bind_addr.clone_from(bind);
        config.validate()?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime.block_on(microcam::serve(&config))?;
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = FrameStore::at(config.upload_dir(), Arc::new(OsFs));
    let stats = store
        .stats()
        .with_context(|| format!("reading {}", store.root().display()))?;

    if json {
        let status = serde_json::json!({
            "upload_dir": store.root(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("microcam status");
        println!("---------------");
        println!("Upload dir:    {}", store.root().display());
        println!("Frames:        {}", stats.total_frames);
        println!("Total bytes:   {}", stats.total_bytes);
        println!(
            "Latest:        {}",
            if stats.has_latest { "present" } else { "none" }
        );
        if let Some(oldest) = stats.oldest_frame {
            println!("Oldest frame:  {}", oldest.to_rfc3339());
        }
        if let Some(newest) = stats.newest_frame {
            println!("Newest frame:  {}", newest.to_rfc3339());
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind_addr);
                println!("  Max upload bytes:   {}", config.server.max_upload_bytes);
                println!();
                println!("[Storage]");
                println!("  Upload dir:         {}", config.upload_dir().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file)?,
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::check_file(&path) {
        Ok(_) => {
            println!("Configuration is valid.");
            Ok(())
        }
        Err(e) => anyhow::bail!("Configuration error: {e}"),
    }
}
