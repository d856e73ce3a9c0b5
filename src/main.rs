//! keybeam - type Unicode text through a USB HID keyboard gadget
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │        stdin lines / --text args         │
//! ├──────────────────────────────────────────┤
//! │  Encoder (keycode/keysym/scancode)       │
//! │                  ↓                       │
//! │  DeviceWriter (worker thread)            │
//! │                  ↓                       │
//! │  root shell → /dev/hidg0                 │
//! └──────────────────────────────────────────┘
//! ```

use anyhow::{Context, Result};
use keybeam::config::{self, Config};
use keybeam::device::{DeviceWriter, ShellLauncher, WriterSettings};
use keybeam::keyboard::{Encoder, LayoutIndex, TableDir};
use log::{info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

/// Print help message
fn print_help() {
    println!(
        r#"keybeam {} - type text through a USB HID keyboard gadget

USAGE:
    keybeam [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -c, --config PATH       Use this config file
    --text TEXT             Type TEXT (repeatable); otherwise read stdin lines
    --list-layouts          List available layouts and exit
    --init-config           Generate default config file
    -f, --force             Overwrite config file with --init-config

EXAMPLES:
    echo hello | keybeam              Type "hello" on the attached host
    keybeam --text 'p@ssw0rd'         Type one string
    keybeam --list-layouts            Show layouts in the table directory

CONFIG FILE:
    ~/.config/keybeam/config.toml

LOGGING:
    RUST_LOG=debug keybeam ...
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Values following every occurrence of `flags`
fn flag_values<'a>(args: &'a [String], flags: &[&str]) -> Vec<&'a str> {
    args.windows(2)
        .filter(|w| flags.contains(&w[0].as_str()))
        .map(|w| w[1].as_str())
        .collect()
}

/// Load config and the path to watch for changes
fn load_config(explicit: Option<&str>) -> (Config, Option<PathBuf>) {
    match explicit {
        Some(path) => {
            let path = PathBuf::from(path);
            (Config::load_or_default(&path), Some(path))
        }
        None => (Config::load(), Config::config_path()),
    }
}

/// Resolve the configured layout into the encoder
fn load_layout(encoder: &Encoder, cfg: &Config) -> Result<()> {
    let tables = TableDir::new(cfg.tables.tables_dir());
    let graph = encoder
        .load(
            &tables,
            &cfg.tables.layout,
            &cfg.tables.keysyms,
            &cfg.tables.scancodes,
        )
        .with_context(|| {
            format!(
                "Failed to load layout {} from {}",
                cfg.tables.layout,
                tables.root().display()
            )
        })?;
    let report = graph.report();
    info!(
        "Layout {} ready: {} keycodes, {} symbols, {} warnings",
        graph.layout(),
        report.resolved_keycodes,
        report.symbols,
        report.warnings.len()
    );
    Ok(())
}

fn list_layouts(cfg: &Config) -> Result<()> {
    let tables = TableDir::new(cfg.tables.tables_dir());
    let mut layouts = LayoutIndex::new(tables.keycodes_dir())
        .list()
        .context("Failed to list layouts")?;
    layouts.sort_by_key(|l| l.display_name());
    for layout in layouts {
        println!("{:<24} {}", layout.id(), layout.display_name());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Check command line arguments
    let args: Vec<String> = std::env::args().collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("keybeam {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Config file generation mode
    if args.iter().any(|a| a == "--init-config") {
        let force = args.iter().any(|a| a == "--force" || a == "-f");
        let path = Config::write_default_config(force)?;
        println!("Config file generated: {}", path.display());
        return Ok(());
    }

    let config_arg = flag_values(&args, &["--config", "-c"]).first().copied();
    let (mut cfg, config_path) = load_config(config_arg);

    if args.iter().any(|a| a == "--list-layouts") {
        return list_layouts(&cfg);
    }

    let encoder = Arc::new(Encoder::new());
    load_layout(&encoder, &cfg)?;

    let writer = DeviceWriter::new(
        Arc::clone(&encoder),
        ShellLauncher::from_config(&cfg.device),
        WriterSettings::from_config(&cfg.device),
    );

    let texts = flag_values(&args, &["--text"]);
    if !texts.is_empty() {
        for text in texts {
            writer.submit(text);
        }
        writer.shutdown();
        return Ok(());
    }

    // Config file change watcher (Linux only)
    #[cfg(target_os = "linux")]
    let config_watcher = config_path
        .as_deref()
        .and_then(|path| config::ConfigWatcher::new(path).ok());
    #[cfg(target_os = "linux")]
    if config_watcher.is_some() {
        info!("Config hot-reload enabled");
    }
    #[cfg(not(target_os = "linux"))]
    let _ = config_path;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;

        #[cfg(target_os = "linux")]
        if let (Some(watcher), Some(path)) = (&config_watcher, &config_path) {
            if watcher.check_reload() {
                let new_cfg = Config::load_or_default(path);
                if new_cfg.tables != cfg.tables {
                    // on failure the previous layout stays active
                    if let Err(e) = load_layout(&encoder, &new_cfg) {
                        warn!("Layout reload failed: {:#}", e);
                    }
                }
                if new_cfg.device != cfg.device {
                    warn!("Device settings changed; restart keybeam to apply");
                }
                cfg = new_cfg;
            }
        }

        if line.is_empty() {
            continue;
        }
        writer.submit(line);
    }

    writer.shutdown();
    Ok(())
}
