//! Worker-mode protocol: one JSON line per request on stdin, one JSON line per
//! [`BatchOutcome`] on stdout.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use super::analyzer::AnalyzerFactory;
use super::batch::process_batch;
use crate::{Batch, BatchOutcome, Config};

/// Request sent by the parent for every batch.
#[derive(Debug, Deserialize)]
pub struct WorkerRequest {
    pub batch: Batch,
    pub config: Config,
}

/// Borrowing twin of [`WorkerRequest`] used on the sending side.
#[derive(Serialize)]
pub(crate) struct WorkerRequestRef<'a> {
    pub batch: &'a Batch,
    pub config: &'a Config,
}

/// Encode a request as a single line (without the trailing newline).
pub(crate) fn encode_request(batch: &Batch, config: &Config) -> serde_json::Result<String> {
    serde_json::to_string(&WorkerRequestRef { batch, config })
}

/// Serve requests until `input` reaches EOF. Each outcome is flushed immediately so the parent
/// never waits on a buffered answer.
pub fn serve_worker<R, W>(input: R, mut output: W, factory: &dyn AnalyzerFactory) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line.context("read worker request")?;
        if line.trim().is_empty() {
            continue;
        }
        let request: WorkerRequest =
            serde_json::from_str(&line).context("decode worker request")?;
        debug!(
            "worker {}: batch {} ({} files)",
            std::process::id(),
            request.batch.id,
            request.batch.len()
        );
        let outcome: BatchOutcome = process_batch(&request.batch, &request.config, factory);
        serde_json::to_writer(&mut output, &outcome).context("encode batch outcome")?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}
