use crate::errors::{ConfigError, ProviderError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

pub mod generator;
pub mod prompts;

/// Cooperative cancellation shared by the batch loops. Cloning shares the flag.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sleeps for `delay` unless cancelled first. Returns `true` when cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancelToken) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    if delay.is_zero() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = cancel.cancelled() => true,
    }
}

/// Runs `fut` under the timeout; `0` disables the limit.
pub async fn with_timeout<T, F>(secs: u64, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    if secs == 0 {
        return fut.await;
    }
    match timeout(Duration::from_secs(secs), fut).await {
        Ok(r) => r,
        Err(_) => Err(ProviderError::Timeout(secs)),
    }
}

/// Delay seconds from config or flags. Negative, non-finite and
/// unrepresentable values are a config error.
pub fn secs_to_duration(label: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::Invalid(format!("{} must be >= 0", label)));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::Invalid(format!("{} is out of range: {}", label, secs)))
}
