//! Sitesmith
//!
//! Command-line entry point: run one pipeline, serve the HTTP API, or
//! inspect persisted state.

mod api;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use sitesmith_core::agents::Roster;
use sitesmith_core::export::{write_bundle, BundleMetadata};
use sitesmith_core::llm::ScriptedBackend;
use sitesmith_core::pipeline::AgentStatus;
use sitesmith_core::state::io::{ensure_runtime_dir, get_runtime_path};
use sitesmith_core::state::{JsonFileSink, SqliteSink, StateDb, StateSink};
use sitesmith_core::{Orchestrator, PipelineConfig, PipelineResult, ProgressEvent, ProjectStore};

#[derive(Parser, Clone)]
#[command(author, version, about = "Sitesmith - turn a request into a website bundle")]
struct Args {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Run the pipeline once for a request
    Run {
        /// What to build, in plain language
        request: String,
        /// Pipeline config file (default: .sitesmith/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// State file (default: .sitesmith/project-state.json)
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// Persist into .sitesmith/sitesmith.db instead of the state file
        #[arg(long)]
        sqlite: bool,
        /// Write the generated bundle to this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
        /// Use canned answers instead of a live provider
        #[arg(long)]
        offline: bool,
    },
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Run database (default: .sitesmith/sitesmith.db)
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        offline: bool,
    },
    /// Print persisted project state
    State {
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// List runs stored in the database
        #[arg(long)]
        runs: bool,
        /// Print one stored run by id
        #[arg(long)]
        run: Option<String>,
    },
}

pub(crate) fn build_orchestrator(config: PipelineConfig, offline: bool) -> Orchestrator {
    if offline {
        let roster = Roster::with_backend(&config, Arc::new(ScriptedBackend::demo()));
        Orchestrator::with_roster(config, roster)
    } else {
        Orchestrator::new(config)
    }
}

fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    PipelineConfig::load(&path.unwrap_or_else(PipelineConfig::default_path))
}

fn json_sink(path: Option<PathBuf>) -> JsonFileSink {
    path.map(JsonFileSink::new)
        .unwrap_or_else(JsonFileSink::default_location)
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// API keys from `.sitesmith/.env`, then a local `.env`
fn load_env() {
    let env_path = get_runtime_path().join(".env");
    if env_path.exists() {
        if let Err(e) = dotenvy::from_path(&env_path) {
            tracing::warn!(path = %env_path.display(), error = %e, "Failed to load env file");
        }
    }
    let _ = dotenvy::dotenv();
}

fn print_event(event: &ProgressEvent) {
    let marker = match event.status {
        AgentStatus::Idle => " ",
        AgentStatus::Working => ">",
        AgentStatus::Completed => "+",
        AgentStatus::Error => "!",
    };
    println!(
        "{} [{:>3}%] {:<9} {}",
        marker,
        event.progress,
        event.agent.id(),
        event.message
    );
}

fn print_summary(result: &PipelineResult) {
    let state = &result.final_state.state;
    println!("\n{}", result.message);
    if let Some(brief) = &state.project_brief {
        println!("   Brief:  {}", brief.summary);
    }
    if let Some(design) = &state.ui_design {
        println!("   Colors: {}", design.colors.join(" "));
    }
    for (label, files) in [("frontend", &state.code.frontend), ("backend", &state.code.backend)] {
        for file in files.iter().flatten() {
            println!("   {:<8} {}", label, file.path);
        }
    }
    if let Some(qa) = &state.qa_report {
        println!("   QA:     {:?} ({} bugs)", qa.status, qa.bugs.len());
    }
    if let Some(fixes) = &result.final_state.fixes {
        println!("   Fixes:  {} files", fixes.len());
    }
}

struct RunOptions {
    request: String,
    config: Option<PathBuf>,
    state: Option<PathBuf>,
    sqlite: bool,
    out: Option<PathBuf>,
    json: bool,
    offline: bool,
}

async fn run_once(opts: RunOptions) -> Result<()> {
    let config = load_config(opts.config)?;

    let (sink, run) = if opts.sqlite {
        let db = Arc::new(StateDb::open()?);
        let sink = SqliteSink::for_request(db.clone(), &opts.request);
        let run_id = sink.run_id().to_string();
        (Arc::new(sink) as Arc<dyn StateSink>, Some((db, run_id)))
    } else {
        (Arc::new(json_sink(opts.state)) as Arc<dyn StateSink>, None)
    };

    let (event_tx, mut event_rx) = mpsc::channel::<ProgressEvent>(100);
    let quiet = opts.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !quiet {
                print_event(&event);
            }
        }
    });

    let mut orchestrator = build_orchestrator(config, opts.offline).with_event_channel(event_tx);
    let mut store = ProjectStore::new(sink);
    let outcome = orchestrator.run_pipeline(&opts.request, &mut store).await;
    drop(orchestrator);
    let _ = printer.await;

    if store.persistence_failures() > 0 {
        eprintln!(
            "Warning: {} state writes failed; see logs",
            store.persistence_failures()
        );
    }

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            if let Some(raw) = e.raw_response() {
                eprintln!("Model answer was:\n{}", raw);
            }
            return Err(e).context("Pipeline run failed");
        }
    };

    if let Some((db, run_id)) = &run {
        db.save_result(run_id, &result)?;
    }
    let run_id = run.map(|(_, run_id)| run_id);

    if let Some(out) = &opts.out {
        let metadata = BundleMetadata::new(opts.request.as_str(), run_id.clone());
        let summary = write_bundle(&result, &metadata, out).await?;
        if !opts.json {
            println!(
                "Wrote {} files to {}",
                summary.files_written,
                summary.root.display()
            );
        }
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
        if let Some(run_id) = run_id {
            println!("   Run id: {}", run_id);
        }
    }
    Ok(())
}

async fn show_state(state: Option<PathBuf>, runs: bool, run: Option<String>) -> Result<()> {
    if runs {
        let db = StateDb::open()?;
        for summary in db.list_runs()? {
            println!(
                "{}  {:<14} {}  {}",
                summary.run_id,
                summary.step,
                summary.updated_at,
                summary.request.unwrap_or_default()
            );
        }
        return Ok(());
    }

    if let Some(run_id) = run {
        let db = StateDb::open()?;
        let project = db
            .load_run(&run_id)?
            .with_context(|| format!("No run with id {}", run_id))?;
        println!("{}", serde_json::to_string_pretty(&project)?);
        return Ok(());
    }

    let sink = json_sink(state);
    match sink.load().await? {
        Some(project) => println!("{}", serde_json::to_string_pretty(&project)?),
        None => println!("No project state at {}", sink.path().display()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    load_env();

    let args = Args::parse();
    match args.command {
        CliCommand::Run {
            request,
            config,
            state,
            sqlite,
            out,
            json,
            offline,
        } => {
            run_once(RunOptions {
                request,
                config,
                state,
                sqlite,
                out,
                json,
                offline,
            })
            .await
        }
        CliCommand::Serve {
            port,
            config,
            db,
            offline,
        } => {
            let runtime = ensure_runtime_dir().await?;
            tracing::info!(path = %runtime.display(), "Runtime directory ready");
            let config = load_config(config)?;
            let db = match db {
                Some(path) => StateDb::open_at(path)?,
                None => StateDb::open()?,
            };
            let app_state = api::AppState::new(config, db, offline);
            api::serve(Arc::new(app_state), port).await
        }
        CliCommand::State { state, runs, run } => show_state(state, runs, run).await,
    }
}
