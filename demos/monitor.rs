use std::{sync::Arc, time::Duration};

use netretry::{
    with_retry_when_online, Connectivity, HttpProbe, NetworkMonitor, PlatformError, ProbeOptions,
    RetryOptions,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,netretry=debug")),
        )
        .init();

    let url = std::env::var("NETRETRY_PROBE_URL")
        .unwrap_or_else(|_| "https://www.example.com/".to_owned());

    let connectivity = Arc::new(Connectivity::new(false));
    let monitor = NetworkMonitor::new(connectivity.clone());
    monitor.start();
    let subscription = monitor.on_status_change(|online| {
        println!("network is now {}", if online { "online" } else { "offline" });
    });

    let mut probe_options = ProbeOptions::new(url);
    probe_options.interval_ms = 2_000;
    let probe = HttpProbe::new(connectivity, probe_options)?.spawn();

    let options =
        RetryOptions::<PlatformError>::default().initial_delay(Duration::from_millis(200));
    let greeting = with_retry_when_online(
        &monitor,
        Duration::from_secs(10),
        || async { Ok::<_, PlatformError>("connected") },
        &options,
    )
    .await?;
    println!("{greeting}");

    tokio::time::sleep(Duration::from_secs(10)).await;

    subscription.unsubscribe();
    monitor.stop();
    probe.abort();
    Ok(())
}
