use std::time::Duration;

use netretry::{with_retry, RetryOptions, RetryPolicy};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,netretry=debug")),
        )
        .init();

    let url = std::env::var("NETRETRY_URL")?;
    let policy = RetryPolicy::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let options = RetryOptions::<reqwest::Error>::from_policy(policy).on_retry(|attempt, err| {
        eprintln!("attempt {attempt} failed: {err}");
    });

    let body = with_retry(
        || async {
            http.get(&url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        },
        &options,
    )
    .await?;

    println!("{} bytes from {url}", body.len());
    Ok(())
}
