//! chatterbox-studio CLI entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chatterbox_studio::backend::{HttpBackend, ModelLoader, create_backend};
use chatterbox_studio::cli::{Args, Command, ServeArgs, SpeakArgs, parse_reference};
use chatterbox_studio::config::Settings;
use chatterbox_studio::engine::{DeviceSelection, GenerationHandler, GenerationRequest};
use chatterbox_studio::output::OutputStore;
use chatterbox_studio::server::{self, AppState};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings =
        Settings::load_from(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.backend_url {
        settings.backend.url = url;
    }
    if let Some(dir) = args.output_dir {
        settings.output.dir = dir;
    }

    let backend = create_backend(&settings.backend.url)
        .with_context(|| format!("Failed to create client for {}", settings.backend.url))?;
    tracing::debug!(url = backend.base_url(), "model host configured");

    match args.command {
        Command::Speak(speak) => speak_command(backend, &settings, speak),
        Command::Serve(serve) => serve_command(backend, &settings, serve),
        Command::Devices => devices_command(&backend),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "chatterbox_studio=debug,tower_http=debug"
    } else {
        "chatterbox_studio=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build the handler and make sure the output directory exists up front.
fn build_handler(
    backend: HttpBackend,
    settings: &Settings,
) -> Result<GenerationHandler<HttpBackend>> {
    let outputs = OutputStore::new(&settings.output.dir);
    outputs.ensure_dir().with_context(|| {
        format!(
            "Failed to create output directory: {}",
            settings.output.dir.display()
        )
    })?;
    Ok(GenerationHandler::new(backend, outputs))
}

fn configured_device(settings: &Settings) -> Result<DeviceSelection> {
    settings
        .model
        .device
        .parse()
        .with_context(|| format!("Invalid model.device: {}", settings.model.device))
}

fn speak_command(backend: HttpBackend, settings: &Settings, speak: SpeakArgs) -> Result<()> {
    let device = match speak.device {
        Some(choice) => choice.into(),
        None => configured_device(settings)?,
    };

    let mut request = GenerationRequest::new(speak.text)
        .with_exaggeration(speak.exaggeration)
        .with_cfg_weight(speak.cfg_weight)
        .with_seed(speak.seed)
        .with_device(device);

    if let Some(input) = &speak.reference {
        let reference = parse_reference(input, std::io::stdin().lock())
            .context("Failed to read reference audio")?;
        request = request.with_reference(reference);
    }

    let mut handler = build_handler(backend, settings)?;

    println!("Generating speech ({})...", request.mode());
    match handler.generate(request) {
        Ok(artifact) => {
            println!("{}", artifact.status_message());
            Ok(())
        }
        Err(e) => Err(anyhow!(e.status_message())),
    }
}

fn serve_command(backend: HttpBackend, settings: &Settings, serve: ServeArgs) -> Result<()> {
    let host = serve.host.unwrap_or_else(|| settings.server.host.clone());
    let port = serve.port.unwrap_or(settings.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid address {host}:{port}"))?;

    // The blocking HTTP client must be created and dropped outside the runtime.
    let state = Arc::new(AppState::new(build_handler(backend, settings)?));
    let app = server::router(Arc::clone(&state));

    tracing::info!("chatterbox-studio v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("  Model host: {}", settings.backend.url);
    tracing::info!("  Outputs: {}", settings.output.dir.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(server::serve(app, addr));
    drop(runtime);
    drop(state);

    result.with_context(|| format!("Server on {addr} stopped"))
}

fn devices_command(backend: &HttpBackend) -> Result<()> {
    let health = backend
        .probe()
        .with_context(|| format!("Failed to reach model host at {}", backend.base_url()))?;

    println!("Model host: {} ({})", backend.base_url(), health.status);
    println!("  Model: {}", health.model);
    println!("  CUDA available: {}", health.cuda_available);
    println!("  MPS available: {}", health.mps_available);
    if let Some(device) = &health.device {
        println!("  Loaded on: {device}");
    }
    println!("Preferred device: {}", health.preferred_device());

    Ok(())
}
