use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use netapp_core::NetworkApplication;
use netapp_example::CounterExtension;
use netapp_host::HostSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sleep between two iterations of the application loop.
const LOOP_TICK_MS: u64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout is the serial console.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,netapp_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("netapp starting...");

    let settings = HostSettings::from_env()?;
    let http_addr = SocketAddr::from(([0, 0, 0, 0], settings.http_port));

    let counter = CounterExtension::new();
    let count = counter.handle();
    let platform = netapp_host::platform(&settings);
    let app_settings = settings.app.clone();

    // The application loop is synchronous and may block (WiFi connect), so
    // it gets a thread of its own.
    let stop = Arc::new(AtomicBool::new(false));
    let loop_stop = stop.clone();
    let app_handle = tokio::task::spawn_blocking(move || {
        let mut app = NetworkApplication::new(app_settings, platform).with_extension(counter);
        app.setup();
        app.run_until(LOOP_TICK_MS, || loop_stop.load(Ordering::Relaxed));
    });

    let http_handle = tokio::spawn(async move {
        if let Err(e) = netapp_example::http::serve(http_addr, count).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!("   Serial CLI: stdin/stdout");
    tracing::info!("   TCP CLI:    telnet localhost {}", settings.app.cli_port);
    tracing::info!("   HTTP:       curl http://localhost:{}/", settings.http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
    }

    stop.store(true, Ordering::Relaxed);
    if let Err(e) = app_handle.await {
        tracing::error!("Application loop panicked: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
