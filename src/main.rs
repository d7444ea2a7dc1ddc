use anyhow::Context;
use scribed::config::Config;
use scribed::stt::{SharedEngine, Transcriber, WhisperConfig, WhisperTranscriber};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use scribed::cli::{Cli, Commands, ModelsAction};

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "scribed=info,tower_http=info",
        1 => "scribed=debug,tower_http=debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve the model file to load, downloading a catalog model if needed.
async fn resolve_model_path(config: &Config) -> anyhow::Result<PathBuf> {
    if let Some(path) = &config.stt.model_path {
        return Ok(path.clone());
    }

    #[cfg(feature = "model-download")]
    {
        scribed::models::ensure_model(&config.stt.model, true)
            .await
            .map_err(Into::into)
    }
    #[cfg(not(feature = "model-download"))]
    {
        anyhow::bail!(
            "model '{}' cannot be fetched in this build; set stt.model_path to a local file",
            config.stt.model
        )
    }
}

async fn load_transcriber(config: &Config) -> anyhow::Result<Arc<dyn Transcriber>> {
    let model_path = resolve_model_path(config).await?;
    let whisper_config = WhisperConfig {
        model_path,
        threads: config.stt.threads,
    };
    let transcriber = tokio::task::spawn_blocking(move || WhisperTranscriber::new(whisper_config))
        .await
        .context("model load task failed")??;
    Ok(Arc::new(transcriber))
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!(
        version = %scribed::version_string(),
        backend = scribed::defaults::gpu_backend(),
        "starting scribed"
    );

    let engine = SharedEngine::empty();

    // The model can take seconds to load; serve immediately and let
    // sessions see not-ready until it lands
    let loader_engine = engine.clone();
    let loader_config = config.clone();
    tokio::spawn(async move {
        match load_transcriber(&loader_config).await {
            Ok(transcriber) => {
                info!(model = transcriber.model_name(), "transcription model loaded");
                loader_engine.install(transcriber);
            }
            Err(e) => {
                error!(error = %e, "failed to load transcription model");
            }
        }
    });

    scribed::server::serve(config, engine).await
}

#[cfg(feature = "cli")]
async fn run_transcribe(config: Config, file: PathBuf) -> anyhow::Result<()> {
    let transcriber = load_transcriber(&config).await?;

    let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let samples = if scribed::audio::wav::looks_like_wav(&bytes) {
        scribed::audio::wav::read_wav(std::io::Cursor::new(bytes))?.into_inference_samples()
    } else {
        let decoded = scribed::audio::decode::decode_bytes(&bytes, extension.as_deref())?;
        scribed::audio::resample::prepare_for_inference(
            &decoded.samples,
            decoded.channels,
            decoded.sample_rate,
        )
    };

    let language = config.stt.language.clone();
    let result =
        tokio::task::spawn_blocking(move || transcriber.transcribe(&samples, &language)).await??;
    println!("{}", result.text);
    Ok(())
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.rtc.apply_env();

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(model) = cli.model {
        config.stt.model = model;
    }
    if let Some(language) = cli.language {
        config.stt.language = language;
    }
    config.validate()?;

    match cli.command {
        None | Some(Commands::Serve) => run_server(config).await,
        Some(Commands::Transcribe { file }) => run_transcribe(config, file).await,
        Some(Commands::Models { action }) => run_models(action).await,
    }
}

#[cfg(feature = "cli")]
async fn run_models(action: ModelsAction) -> anyhow::Result<()> {
    match action {
        ModelsAction::List => {
            #[cfg(feature = "model-download")]
            for model in scribed::models::list_models() {
                println!("{}", scribed::models::download::format_model_info(model));
            }
            #[cfg(not(feature = "model-download"))]
            for model in scribed::models::list_models() {
                println!("{:12} {:5} MB", model.name, model.size_mb);
            }
            Ok(())
        }
        ModelsAction::Install { name } => {
            #[cfg(feature = "model-download")]
            {
                let path = scribed::models::download_model(&name, true).await?;
                println!("Installed to {}", path.display());
                Ok(())
            }
            #[cfg(not(feature = "model-download"))]
            {
                let _ = name;
                anyhow::bail!("this build cannot download models")
            }
        }
    }
}

#[cfg(not(feature = "cli"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(0);
    let mut config = Config::default();
    config.rtc.apply_env();
    config.validate()?;
    run_server(config).await
}
