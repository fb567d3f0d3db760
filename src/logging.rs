/// Tracing setup. Logs go to a file under the data dir, never to the
/// terminal: the TUI owns stdout, and single-shot mode prints reply
/// fragments there.
///
/// Filter precedence: `BANTER_LOG` env var, else `banter=debug` with
/// `--verbose`, else `banter=info`.
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "banter.log";

pub fn init(dir: &Path, verbose: bool) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let filter = EnvFilter::try_from_env("BANTER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "banter=debug" } else { "banter=info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
