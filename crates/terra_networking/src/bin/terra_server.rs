//! # TERRA Server
//!
//! The authoritative server for a shared TERRA world.
//!
//! ## Usage
//!
//! ```bash
//! terra_server --config terra.toml --port 7777 --seed 42
//! ```
//!
//! Settings come from the built-in defaults, then the config file, then
//! `TERRA_*` environment variables, then these flags. Logging follows
//! `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use terra_networking::server::{transport, ServerConfig};

fn print_help() {
    println!("Usage: terra_server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>   TOML config file");
    println!("  -p, --port <PORT>     TCP port to listen on (default: 7777)");
    println!("      --seed <SEED>     World seed for a fresh data directory (default: 42)");
    println!("  -h, --help            Show this help");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Simple flag parsing, no external deps
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut port: Option<u16> = None;
    let mut seed: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config" | "-c", Some(v)) => {
                config_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--port" | "-p", Some(v)) => {
                let Ok(p) = v.parse() else {
                    eprintln!("invalid port: {v}");
                    return ExitCode::FAILURE;
                };
                port = Some(p);
                i += 1;
            }
            ("--seed", Some(v)) => {
                let Ok(s) = v.parse() else {
                    eprintln!("invalid seed: {v}");
                    return ExitCode::FAILURE;
                };
                seed = Some(s);
                i += 1;
            }
            ("--help" | "-h", _) => {
                print_help();
                return ExitCode::SUCCESS;
            }
            (other, _) => {
                eprintln!("unknown or incomplete option: {other}");
                print_help();
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let mut config = match ServerConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "bad configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TERRA SERVER                                             ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!("  Port:         {}", config.port);
    println!("  Room:         {}", config.room_code);
    println!("  Max players:  {}", config.max_players);
    println!("  Tick rate:    {} Hz", config.tick_rate);
    println!("  Data dir:     {}", config.data_dir.display());
    println!();

    match transport::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}
