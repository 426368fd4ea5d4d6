mod auth;
mod cascade;
mod clock;
mod config;
mod db;
mod engine;
mod error;
mod invite_code;
mod model;
mod validation;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::engine::Engine;
use crate::invite_code::ThreadCodeRng;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            return;
        }
    };

    info!(
        db_path = %config.db_path.display(),
        operation_timeout_secs = config.operation_timeout_secs,
        "signhub starting"
    );

    let conn = match db::open(&config.db_path) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to open database: {e}");
            return;
        }
    };
    let db = Arc::new(Mutex::new(conn));

    let clock = Arc::new(SystemClock::new());
    let rng = Arc::new(ThreadCodeRng);

    let _engine: Engine = Engine::with_timeout(
        db,
        clock,
        rng,
        config.invite_code_max_attempts,
        std::time::Duration::from_secs(config.operation_timeout_secs),
    );
    info!("engine ready");
}

fn print_usage() {
    println!(
        "signhub — transactional domain engine for inter-company collaboration

USAGE:
    signhub [OPTIONS]

OPTIONS:
    --config <PATH>     Path to config file (default: ~/.config/signhub/config.toml)
    --default-config    Print default config to stdout and exit
    -h, --help          Print this help message

ENVIRONMENT:
    RUST_LOG            Tracing filter, e.g. \"signhub=debug\" (default: info)"
    );
}
