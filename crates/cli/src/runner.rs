//! `llm-embed process`: run one NDJSON batch through the processor.
//!
//! Each non-blank input line is one record. Each output line is one outcome,
//! either `{"record": ...}` or `{"error": "..."}`, in input order.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use llm_embed_processor::{EmbedProcessor, ProcessContext, ProcessedRecord, Processor};
use llm_embed_record::Record;
use serde_json::json;

pub struct RunOptions<'a> {
    pub params: BTreeMap<String, String>,
    pub input: Option<&'a Path>,
    pub timeout: Option<Duration>,
}

/// Summary of a finished run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub errors: usize,
}

pub async fn run(options: RunOptions<'_>, out: &mut impl Write) -> Result<RunSummary, String> {
    let mut processor = EmbedProcessor::new();
    processor
        .configure(&options.params)
        .map_err(|e| e.to_string())?;

    let text = read_input(options.input).await?;
    let records = parse_records(&text)?;
    tracing::debug!(records = records.len(), "read input batch");

    let mut ctx = ProcessContext::new();
    if let Some(timeout) = options.timeout {
        ctx = ctx.with_timeout(timeout);
    }

    let token = ctx.token().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling batch");
            token.cancel();
        }
    });

    let outcomes = processor.process(&ctx, records).await;
    interrupt.abort();

    let mut summary = RunSummary::default();
    for outcome in &outcomes {
        let line = match outcome {
            ProcessedRecord::Single(record) => {
                summary.records += 1;
                json!({ "record": record })
            }
            ProcessedRecord::Error(err) => {
                summary.errors += 1;
                json!({ "error": err.to_string() })
            }
        };
        writeln!(out, "{}", line).map_err(|e| format!("error writing output: {}", e))?;
    }
    out.flush()
        .map_err(|e| format!("error writing output: {}", e))?;
    Ok(summary)
}

async fn read_input(path: Option<&Path>) -> Result<String, String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("error reading file '{}': {}", path.display(), e)),
        None => tokio::task::spawn_blocking(|| {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).map(|_| text)
        })
        .await
        .map_err(|e| format!("error reading stdin: {}", e))?
        .map_err(|e| format!("error reading stdin: {}", e)),
    }
}

/// Parse NDJSON records. Blank lines are skipped; any invalid line fails the
/// whole input.
pub fn parse_records(text: &str) -> Result<Vec<Record>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| format!("invalid record on line {}: {}", i + 1, e))
        })
        .collect()
}
