use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Install a handler that listens for SIGTERM and SIGINT.
///
/// Returns a `CancellationToken` that is cancelled when either signal is
/// received. Signals after the first are still consumed so a second Ctrl-C
/// does not kill the process in the middle of cleanup.
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, cancelling session");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, cancelling session");
                }
            }
            token_clone.cancel();
        }
    });

    Ok(token)
}
