// ============================================================================
// paracoder-cli/src/shutdown.rs
// ============================================================================
//
// SHUTDOWN HOOK: Killing Transcoders on Ctrl+C or SIGTERM
//
// The batch runs on plain threads, so signals are awaited on a dedicated
// thread with a current-thread tokio runtime. When a signal arrives every
// registered pipeline stage is killed and the process exits with the
// conventional 128 + SIGINT status.
//
// KEY COMPONENTS:
// - install_shutdown_hook: Spawns the signal thread
// - INTERRUPTED_EXIT_CODE: Status used after an interrupt

// ---- Internal crate imports ----
use crate::error::{CliErrorContext, CliResult};

// ---- External crate imports ----
use log::{error, warn};
use paracoder_core::process::ChildRegistry;
use tokio::signal;

// ---- Standard library imports ----
use std::sync::Arc;
use std::thread;

/// Exit status after an interrupt.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Starts the thread that waits for a shutdown signal.
///
/// Children tracked by `registry` are killed before the process exits.
pub fn install_shutdown_hook(registry: Arc<ChildRegistry>) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .cli_context("Failed to start the signal runtime")?;

    thread::Builder::new()
        .name("shutdown-hook".to_string())
        .spawn(move || {
            runtime.block_on(shutdown_signal());
            let killed = registry.terminate_all();
            warn!("Interrupted, terminated {} running process(es)", killed);
            std::process::exit(INTERRUPTED_EXIT_CODE);
        })
        .cli_context("Failed to spawn the shutdown hook thread")?;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
