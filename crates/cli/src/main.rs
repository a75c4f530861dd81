use std::io::{BufRead, Write};

use anyhow::Context;

use tokenledger_cli::Session;
use tokenledger_infra::LedgerConfig;

fn main() -> anyhow::Result<()> {
    tokenledger_observability::init();

    let config = LedgerConfig::from_env().context("failed to load ledger config")?;
    let session = Session::start(&config).context("failed to create ledger")?;

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = session.handle_line(&line);
        serde_json::to_writer(&mut stdout, &response)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }

    tracing::info!("input closed, shutting down");
    Ok(())
}
