//! `sentiscope`: classify dataset items with a local or hosted sentiment model.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use sentiscope_ai::{LexiconLoader, LocalBackend, LocalState, OnnxLoader};
use sentiscope_core::{BackendMode, Credential, NoopSink, PipelineLoader, TelemetrySink};
use sentiscope_http::remote::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use sentiscope_http::{ChatCompletionsBackend, HttpTelemetrySink};
use sentiscope_session::{Orchestrator, Session};
use sentiscope_store::{CredentialChain, Dataset, EnvCredentials, PreferenceStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod display;
mod shell;

/// Name under which the remote API key is stored and looked up.
const CREDENTIAL_KEY: &str = "api_key";

#[derive(Parser, Debug)]
#[command(name = "sentiscope")]
#[command(about = "Sentiment classification with a local or remote model")]
#[command(version)]
struct Cli {
    /// Dataset to sample from: one item per line, or a Parquet file with a `text` column
    #[arg(long, env = "SENTISCOPE_DATASET", global = true)]
    dataset: Option<PathBuf>,

    /// Startup mode; defaults to the stored preference, then `remote`
    #[arg(long, env = "SENTISCOPE_MODE", global = true)]
    mode: Option<BackendMode>,

    /// Preference file
    #[arg(
        long,
        env = "SENTISCOPE_PREFS",
        default_value = "sentiscope.prefs.json",
        global = true
    )]
    prefs: PathBuf,

    /// Chat-completions endpoint of the remote model
    #[arg(long, env = "SENTISCOPE_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    endpoint: String,

    /// Remote model name
    #[arg(long, env = "SENTISCOPE_REMOTE_MODEL", default_value = DEFAULT_MODEL, global = true)]
    remote_model: String,

    /// Directory holding an ONNX sentiment model; the keyword lexicon is used when unset
    #[arg(long, env = "SENTISCOPE_MODEL_DIR", global = true)]
    model_dir: Option<PathBuf>,

    /// Base URL to fetch missing model files from
    #[arg(long, env = "SENTISCOPE_MODEL_URL", global = true)]
    model_url: Option<String>,

    /// Collector URL for usage events; nothing is sent when unset
    #[arg(long, env = "SENTISCOPE_TELEMETRY_URL", global = true)]
    telemetry_url: Option<String>,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify one item and exit
    Classify {
        /// Text to classify instead of a sampled dataset item
        #[arg(long)]
        text: Option<String>,
    },
    /// Interactive session: switch modes and classify sampled items
    Shell,
    /// Manage stored preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsAction {
    /// Store the remote API key; read from stdin when omitted
    SetKey { key: Option<String> },
    /// Remove the stored remote API key
    ClearKey,
    /// Store the startup mode
    Mode { mode: BackendMode },
    /// Show stored preferences (the key itself is never printed)
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Prefs { action } => {
            run_prefs(&PreferenceStore::new(&cli.prefs), action)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Classify { text } => {
            let session = build_session(&cli)?;
            run_classify(&session, text.clone()).await
        }
        Command::Shell => {
            let session = build_session(&cli)?;
            shell::run(&session).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,sentiscope_ai=info,sentiscope_http=info,sentiscope_session=info,sentiscope_store=info",
        _ => "info,sentiscope_ai=debug,sentiscope_http=debug,sentiscope_session=debug,sentiscope_store=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn local_loader(cli: &Cli) -> Arc<dyn PipelineLoader> {
    match &cli.model_dir {
        Some(dir) => {
            let mut loader = OnnxLoader::new(dir.clone());
            if let Some(url) = &cli.model_url {
                loader = loader.with_download(url.clone());
            }
            Arc::new(loader)
        }
        None => Arc::new(LexiconLoader),
    }
}

fn build_session(cli: &Cli) -> anyhow::Result<Session> {
    let dataset_path = cli
        .dataset
        .as_ref()
        .context("no dataset given: pass --dataset or set SENTISCOPE_DATASET")?;
    let dataset = Dataset::load(dataset_path)
        .with_context(|| format!("loading dataset {}", dataset_path.display()))?;

    let prefs = PreferenceStore::new(&cli.prefs);
    let mode = match cli.mode {
        Some(mode) => mode,
        None => prefs
            .mode()
            .with_context(|| format!("reading {}", cli.prefs.display()))?
            .unwrap_or_default(),
    };

    let credentials = CredentialChain::new()
        .with(Arc::new(EnvCredentials::default()))
        .with(Arc::new(prefs));
    let remote = ChatCompletionsBackend::new(cli.endpoint.clone(), cli.remote_model.clone());
    let local = LocalBackend::new(local_loader(cli));
    let telemetry: Arc<dyn TelemetrySink> = match &cli.telemetry_url {
        Some(url) => Arc::new(HttpTelemetrySink::new(url.clone())),
        None => Arc::new(NoopSink),
    };

    info!(
        mode = %mode,
        items = dataset.len(),
        endpoint = %cli.endpoint,
        "session starting"
    );
    let orchestrator = Orchestrator::new(
        Arc::new(local),
        Arc::new(remote),
        Arc::new(credentials),
        CREDENTIAL_KEY,
        mode,
    );
    Ok(Session::new(dataset, orchestrator, telemetry))
}

async fn run_classify(session: &Session, text: Option<String>) -> anyhow::Result<ExitCode> {
    if session.orchestrator().mode() == BackendMode::Local {
        eprintln!("{}", display::loading_notice());
        if session.orchestrator().wait_for_local().await == LocalState::Failed {
            if let Some(err) = session.orchestrator().local().last_error() {
                eprintln!("{}", display::fallback_notice(&err));
            }
        }
    }

    let outcome = match text {
        Some(text) => session.classify_item(text).await,
        None => session.classify_next().await,
    };
    println!("{}", display::outcome(&outcome));
    Ok(if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_prefs(prefs: &PreferenceStore, action: &PrefsAction) -> anyhow::Result<()> {
    match action {
        PrefsAction::SetKey { key } => {
            let raw = match key {
                Some(key) => key.clone(),
                None => read_key_from_stdin()?,
            };
            let credential = Credential::new(raw).context("the API key is blank")?;
            prefs
                .set_credential(CREDENTIAL_KEY, &credential)
                .with_context(|| format!("writing {}", prefs.path().display()))?;
            println!("API key stored in {}", prefs.path().display());
        }
        PrefsAction::ClearKey => {
            let removed = prefs
                .clear_credential(CREDENTIAL_KEY)
                .with_context(|| format!("writing {}", prefs.path().display()))?;
            if removed {
                println!("API key removed from {}", prefs.path().display());
            } else {
                println!("no API key stored in {}", prefs.path().display());
            }
        }
        PrefsAction::Mode { mode } => {
            prefs
                .set_mode(*mode)
                .with_context(|| format!("writing {}", prefs.path().display()))?;
            println!("startup mode set to {mode}");
        }
        PrefsAction::Show => {
            let stored = prefs
                .load()
                .with_context(|| format!("reading {}", prefs.path().display()))?;
            println!("{}", display::prefs_summary(prefs.path(), &stored, CREDENTIAL_KEY));
        }
    }
    Ok(())
}

fn read_key_from_stdin() -> anyhow::Result<String> {
    eprint!("API key: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading API key from stdin")?;
    Ok(line)
}
