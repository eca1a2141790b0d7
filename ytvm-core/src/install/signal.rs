// ytvm-core/src/install/signal.rs
use tracing::warn;

/// Resolves with the signal name once SIGINT (Ctrl-C) or, on Unix, SIGTERM
/// is received. Never resolves if no handler could be registered.
pub async fn shutdown_signal() -> String {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                Ok(()) = tokio::signal::ctrl_c() => "SIGINT".to_string(),
                Some(()) = term.recv() => "SIGTERM".to_string(),
                else => std::future::pending::<String>().await,
            },
            Err(e) => {
                warn!("Could not register SIGTERM handler: {}", e);
                interrupt_only("SIGINT").await
            }
        }
    }
    #[cfg(not(unix))]
    {
        interrupt_only("Ctrl-C").await
    }
}

async fn interrupt_only(name: &str) -> String {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not register interrupt handler: {}", e);
        return std::future::pending::<String>().await;
    }
    name.to_string()
}
