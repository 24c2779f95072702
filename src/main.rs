use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use tracing::{error, info};

use shuttle_core::config::Config;
use shuttle_core::protocol;
use shuttle_core::state::CoreState;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // stdout carries the protocol, logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shuttle_core=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let mut state = CoreState::open(config)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };

        if line.trim().is_empty() {
            continue;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| protocol::handle(&mut state, &line)));

        let response = match result {
            Ok(resp) => resp,
            Err(_) => {
                error!("request handler panicked");
                serde_json::json!({
                    "status": "error",
                    "message": "internal core error"
                })
                .to_string()
            }
        };

        if writeln!(stdout, "{response}").is_err() {
            break;
        }

        let _ = stdout.flush();
    }

    info!("stdin closed, shutting down");
    Ok(())
}
