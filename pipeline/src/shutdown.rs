//! Process-wide shutdown signal.
//!
//! Both binaries stop on SIGINT or SIGTERM. A listener that cannot be
//! installed is logged and then never fires, so the other one still works.

use std::future::pending;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

async fn interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "sigint_listener_failed");
        pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "sigterm_listener_failed");
            pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    pending::<()>().await;
}

/// Resolve on the first of SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    tokio::select! {
        _ = interrupt() => info!(signal = "SIGINT", "shutdown_requested"),
        _ = terminate() => info!(signal = "SIGTERM", "shutdown_requested"),
    }
}

/// Cancel `token` once a shutdown signal arrives.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_token_stays_live_without_signal() {
        let token = CancellationToken::new();
        cancel_on_signal(token.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!token.is_cancelled());
    }
}
