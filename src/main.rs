use std::{
    io::{self, Read},
    path::Path,
    process,
    sync::Arc,
};

use autostocker::{
    application::error::AppError,
    application::render::{excerpt, render_content, render_service},
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        media::MediaStorage,
        memory::MemoryBackend,
        seed, telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging).map_err(AppError::from)?;
            run_serve(settings).await
        }
        config::Command::Render(args) => run_render(args),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let backend = Arc::new(MemoryBackend::new());
    if let Some(path) = settings.storage.seed_file.as_deref() {
        seed::load_seed(&backend, path).await?;
    }

    let media = MediaStorage::new(
        settings.uploads.directory.clone(),
        &settings.uploads.public_path,
    )
    .map_err(|err| AppError::from(InfraError::from(err)))?;

    let state = AppState::new(backend, Arc::new(media), settings.site.default_locale);
    let router = http::build_router(state, settings.uploads.max_request_bytes.get());

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "autostocker::serve",
        addr = %settings.server.addr,
        media_dir = %settings.uploads.directory.display(),
        default_locale = %settings.site.default_locale,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "autostocker::serve", "server stopped");
    Ok(())
}

fn run_render(args: config::RenderArgs) -> Result<(), AppError> {
    let text = read_document(&args.file).map_err(|err| AppError::from(InfraError::from(err)))?;
    let output = if args.excerpt {
        excerpt(&text)
    } else if args.json {
        let rendered = render_service().render_text(Some(&text));
        serde_json::to_string_pretty(&rendered)
            .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?
    } else {
        render_content(Some(&text))
    };
    println!("{output}");
    Ok(())
}

fn read_document(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "autostocker::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
