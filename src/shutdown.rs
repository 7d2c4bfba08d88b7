//! Graceful shutdown coordinator.
//!
//! The first SIGINT (Ctrl+C), SIGTERM or SIGHUP cancels a
//! [`CancellationToken`]; the `track` command then stops tracking and
//! persists the flag before exiting. A second signal force-exits.

use tokio_util::sync::CancellationToken;

/// Exit status used when a second signal interrupts the shutdown.
const FORCED_EXIT_CODE: i32 = 130;

struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl Signals {
    fn register() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                hangup: signal(SignalKind::hangup())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next signal and return its name.
    async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = self.terminate.recv() => "SIGTERM",
                _ = self.hangup.recv() => "SIGHUP",
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Ctrl+C listener failed");
                std::future::pending::<()>().await;
            }
            "Ctrl+C"
        }
    }
}

/// Register the signal listeners and return a token cancelled on the
/// first signal. Must be called from within a Tokio runtime.
pub(crate) fn install_signal_handler() -> std::io::Result<CancellationToken> {
    let mut signals = Signals::register()?;
    let token = CancellationToken::new();

    let handler_token = token.clone();
    tokio::spawn(async move {
        let signal = signals.recv().await;
        tracing::info!(signal, "Shutting down, stopping tracking");
        tracing::info!("Press Ctrl+C again to force exit");
        handler_token.cancel();

        let signal = signals.recv().await;
        tracing::warn!(signal, "Force exit requested");
        std::process::exit(FORCED_EXIT_CODE);
    });

    Ok(token)
}
