use std::{process, sync::Arc};

use moontv_home::{
    application::{
        error::AppError,
        home::{HomeCache, HomeCacheConfig},
    },
    config::{self, Settings, ShowArgs, StorageMode},
    infra::{
        bindings::{ResolvedBindings, build_bindings},
        error::InfraError,
        http::{self, HttpState},
        provider::FileConfigProvider,
        telemetry,
    },
    store::KvLocator,
};
use tokio::{net::TcpListener, sync::Notify, task::JoinError};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Show(args) => run_show(settings, args).await,
    }
}

async fn build_home_cache(
    settings: &Settings,
) -> Result<(Arc<HomeCache>, ResolvedBindings), AppError> {
    let bindings = build_bindings(&settings.bindings).await?;
    let provider = Arc::new(FileConfigProvider::new(&settings.home.config_path));
    let locator = KvLocator::new(bindings.globals.clone(), settings.storage.mode);
    let config = HomeCacheConfig::from_settings(settings.storage.mode, &settings.home);

    if settings.storage.mode == StorageMode::Other {
        warn!(
            declared = settings.storage.declared.as_deref().unwrap_or(""),
            "unrecognised storage mode, treating it as non-kv"
        );
    }

    info!(
        mode = %settings.storage.mode,
        cache_key = %config.cache_key,
        ttl_secs = config.ttl.as_secs(),
        config_path = %settings.home.config_path.display(),
        "home cache configured"
    );

    Ok((Arc::new(HomeCache::new(config, provider, locator)), bindings))
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let (home, bindings) = build_home_cache(&settings).await?;

    if settings.home.auto_refresh {
        home.start_auto_refresh(bindings.env.clone());
    }

    let router = http::build_router(HttpState {
        home: home.clone(),
        env: bindings.env,
    });

    let result = serve_http(&settings, router).await;

    home.stop_auto_refresh();
    result
}

async fn serve_http(settings: &Settings, router: axum::Router) -> Result<(), AppError> {
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { server_shutdown.notified().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        () = shutdown_signal() => {}
    }

    info!("shutdown requested, draining connections");
    shutdown.notify_one();

    let grace = settings.server.graceful_shutdown;
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping remaining connections"
            );
            Ok(())
        }
    }
}

fn server_outcome(joined: Result<std::io::Result<()>, JoinError>) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn run_show(settings: Settings, args: ShowArgs) -> Result<(), AppError> {
    let (home, bindings) = build_home_cache(&settings).await?;
    let payload = home.get_home(Some(&bindings.env)).await;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&payload)
    } else {
        serde_json::to_string(&payload)
    }
    .map_err(|err| AppError::unexpected(format!("failed to encode payload: {err}")))?;

    println!("{rendered}");
    Ok(())
}
