use std::{fmt, sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::sleep};

use crate::{Connectivity, NetRetryError, Result};

/// Configures the connectivity probe target and cadence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProbeOptions {
    /// URL requested on every probe. Any HTTP response counts as online.
    pub url: String,
    /// Pause between probes in milliseconds.
    pub interval_ms: u64,
    /// Per-probe request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl ProbeOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval_ms: 5_000,
            timeout_ms: 3_000,
        }
    }
}

/// Drives a [`Connectivity`] flag by periodically requesting a URL.
///
/// Native hosts have no platform online flag; the probe stands in for it.
#[derive(Clone)]
pub struct HttpProbe {
    http: reqwest::Client,
    connectivity: Arc<Connectivity>,
    options: ProbeOptions,
}

impl fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProbe")
            .field("connectivity", &self.connectivity)
            .field("options", &self.options)
            .finish()
    }
}

impl HttpProbe {
    pub fn new(connectivity: Arc<Connectivity>, options: ProbeOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(options.timeout_ms))
            .build()
            .map_err(NetRetryError::Transport)?;
        Ok(Self {
            http,
            connectivity,
            options,
        })
    }

    /// Probes once and records the result. Returns the observed state.
    pub async fn probe_once(&self) -> bool {
        let online = match self.http.head(&self.options.url).send().await {
            Ok(_response) => true,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(url = %self.options.url, error = %_err, "connectivity probe failed");
                false
            }
        };
        self.connectivity.set_online(online);
        online
    }

    /// Spawns a task probing every `interval_ms` until aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let interval = Duration::from_millis(self.options.interval_ms);
            loop {
                self.probe_once().await;
                sleep(interval).await;
            }
        })
    }
}
