use clap::Parser;
use license_check_agent::{
    backoff::{Pacer, TokioPacer},
    config::{Settings, DEFAULT_LOG_DIR},
    error::LicenseCheckError,
    exit_codes,
    llm::LlmClient,
    logging,
    orchestrator::{InputSource, Orchestrator},
    sharepoint::SharePointClient,
    tools::create_default_registry,
    verification::{SearchAgent, VerificationAgent},
    Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Command-line arguments for license-check
#[derive(Parser, Debug)]
#[command(name = "license-check")]
#[command(about = "Verify corporate software licensing requirements with a web-search LLM agent")]
#[command(version)]
struct Args {
    /// Read this local workbook instead of downloading from SharePoint
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Results workbook path (defaults to OUTPUT_DIR/OUTPUT_FILE)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Attempts per record and per SharePoint call
    #[arg(long)]
    max_retries: Option<u32>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    match &args.env_file {
        Some(path) => {
            if let Err(e) = dotenv::from_path(path) {
                eprintln!("Could not load {}: {}", path.display(), e);
                std::process::exit(exit_codes::FAILURE);
            }
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    let settings = Settings::from_env().and_then(|s| apply_overrides(s, &args));

    let log_dir = settings
        .as_ref()
        .map(|s| s.log_dir.clone())
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR));
    logging::init(&log_dir);

    let settings = match settings {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(exit_codes::FAILURE);
        }
    };

    let mut orchestrator = match build_orchestrator(settings, &args) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "Startup failed");
            std::process::exit(exit_codes::FAILURE);
        }
    };

    info!(run_id = %orchestrator.run_id(), "License check starting");

    let code = tokio::select! {
        code = orchestrator.run() => code,
        _ = tokio::signal::ctrl_c() => {
            warn!("Process interrupted by user");
            exit_codes::FAILURE
        }
    };

    std::process::exit(code);
}

fn apply_overrides(mut settings: Settings, args: &Args) -> Result<Settings> {
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }
    settings.validate()?;
    Ok(settings)
}

fn build_orchestrator(settings: Arc<Settings>, args: &Args) -> Result<Orchestrator> {
    let pacer: Arc<dyn Pacer> = Arc::new(TokioPacer);

    let input = match (&args.input, &settings.sharepoint) {
        (Some(path), _) => InputSource::Local(path.clone()),
        (None, Some(sharepoint)) => InputSource::Remote {
            library: sharepoint.library.clone(),
            file_name: sharepoint.file_name.clone(),
            source: Box::new(SharePointClient::new(
                sharepoint.clone(),
                settings.request_timeout,
                settings.max_retries,
                pacer.clone(),
            )?),
        },
        (None, None) => {
            return Err(LicenseCheckError::Config(
                "no input: pass --input or set the SHAREPOINT_* variables".to_string(),
            ))
        }
    };

    let model = LlmClient::new(&settings.llm, settings.request_timeout)?;
    info!(model = model.model(), "LLM client ready");

    let tools = create_default_registry(settings.request_timeout)?;
    let agent = SearchAgent::new(Box::new(model), tools);
    let verifier = VerificationAgent::new(Box::new(agent), pacer.clone(), settings.max_retries);

    let mut orchestrator = Orchestrator::new(settings, input, Box::new(verifier), pacer);
    if let Some(output) = &args.output {
        orchestrator = orchestrator.with_output_path(output);
    }
    Ok(orchestrator)
}
