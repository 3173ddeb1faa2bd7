//! `af` - audit a proof ledger.
//!
//! Opens the ledger, verifies its hash chain, replays it into a fresh
//! snapshot and prints a summary. Failures exit with the code of their
//! error class:
//!
//! ```text
//! 0  ledger verified and replayed
//! 1  retriable (a claim conflict)
//! 2  blocked
//! 3  logic or usage error
//! 4  corruption (hash mismatch, broken sequence)
//! ```
//!
//! Logs go to `~/.af/logs/af.log` (or `./.af/logs/af.log`), falling back
//! to stderr when neither can be opened. `RUST_LOG` overrides the default
//! `info` filter.

use std::{
    env,
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use af_config::EngineConfig;
use af_core::{Engine, StaticReferences};
use af_types::{EpistemicState, ErrorClass, NodeId, TaintState};

const USAGE: &str = "usage: af [--config <path>] [--json] <ledger>";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_af_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout carries the report, so logs stay on stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_af_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in af_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn af_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.af/logs/af.log
    if let Some(config_path) = af_config::config_path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("af.log"));
    }

    // Fallback: ./.af/logs/af.log
    candidates.push(PathBuf::from(".af").join("logs").join("af.log"));

    candidates
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    ledger: PathBuf,
    config: Option<PathBuf>,
    json: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut ledger = None;
        let mut config = None;
        let mut json = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => json = true,
                "--config" => {
                    let Some(path) = args.next() else {
                        bail!("--config needs a path\n{USAGE}");
                    };
                    config = Some(PathBuf::from(path));
                }
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                path if ledger.is_none() => ledger = Some(PathBuf::from(path)),
                extra => bail!("unexpected argument {extra}\n{USAGE}"),
            }
        }

        let Some(ledger) = ledger else {
            bail!("{USAGE}");
        };
        Ok(Self {
            ledger,
            config,
            json,
        })
    }
}

/// What `af` reports about a healthy ledger.
#[derive(Debug, Serialize)]
struct Audit {
    ledger: PathBuf,
    entries: u64,
    head_hash: String,
    conjecture: Option<String>,
    root_state: Option<EpistemicState>,
    nodes: usize,
    validated: usize,
    tainted: usize,
    open_challenges: usize,
    prover_jobs: usize,
    verifier_jobs: usize,
}

impl Audit {
    fn print_text(&self) {
        println!("ledger          {}", self.ledger.display());
        println!("entries         {}", self.entries);
        println!("head hash       {}", self.head_hash);
        if let Some(conjecture) = &self.conjecture {
            println!("conjecture      {conjecture}");
        }
        if let Some(state) = self.root_state {
            println!("root            {state}");
        }
        println!(
            "nodes           {} ({} validated, {} tainted)",
            self.nodes, self.validated, self.tainted
        );
        println!("open challenges {}", self.open_challenges);
        println!(
            "jobs            {} prover, {} verifier",
            self.prover_jobs, self.verifier_jobs
        );
    }
}

fn audit(ledger: &Path, config: EngineConfig) -> Result<Audit> {
    // Opening would create an empty ledger; an audit never should.
    if !ledger.is_file() {
        bail!("no ledger at {}", ledger.display());
    }

    let engine = Engine::open(ledger, config, Arc::new(StaticReferences::default()))?;
    let report = engine.verify()?;
    let snapshot = engine.replay()?;
    let state = &snapshot.state;

    let audit = Audit {
        ledger: ledger.to_path_buf(),
        entries: report.entries,
        head_hash: report.head_hash,
        conjecture: state.conjecture().map(str::to_owned),
        root_state: state
            .node(&NodeId::root())
            .map(|root| root.epistemic_state),
        nodes: state.node_count(),
        validated: state
            .nodes()
            .filter(|node| node.epistemic_state == EpistemicState::Validated)
            .count(),
        tainted: state
            .nodes()
            .filter(|node| node.taint_state == TaintState::Tainted)
            .count(),
        open_challenges: state
            .challenges()
            .filter(|challenge| challenge.is_open())
            .count(),
        prover_jobs: engine.prover_jobs().len(),
        verifier_jobs: engine.verifier_jobs().len(),
    };
    tracing::info!(
        ledger = %ledger.display(),
        entries = audit.entries,
        nodes = audit.nodes,
        "Ledger audit passed"
    );
    Ok(audit)
}

fn run() -> Result<()> {
    let args = Args::parse(env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };

    let audit = audit(&args.ledger, config)?;
    if args.json {
        let rendered =
            serde_json::to_string_pretty(&audit).context("failed to render the audit")?;
        println!("{rendered}");
    } else {
        audit.print_text();
    }
    Ok(())
}

/// Engine failures carry their own class. Anything else (usage, config,
/// a missing ledger) is a logic error.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(engine_err) = err.downcast_ref::<af_core::Error>() {
        return engine_err.exit_code();
    }
    ErrorClass::Logic.exit_code()
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code_for(&err);
            tracing::error!(exit_code = code, "{err:#}");
            eprintln!("af: {err:#}");
            ExitCode::from(code)
        }
    }
}
