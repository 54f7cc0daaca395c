//! Shutdown state for the `hotserve serve` process.
//!
//! The first Ctrl+C requests a graceful shutdown through a channel; a second
//! one exits immediately.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::ServeError;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown signal sender, set once by `setup_shutdown_handler`
static SHUTDOWN_TX: OnceLock<Sender<()>> = OnceLock::new();

/// Install the Ctrl+C handler. Call once at program start.
///
/// The returned receiver gets one message per graceful shutdown request.
pub fn setup_shutdown_handler() -> Result<Receiver<()>, ServeError> {
    let (tx, rx) = channel::bounded(1);
    if SHUTDOWN_TX.set(tx).is_err() {
        return Err(ServeError::Validation(
            "shutdown handler already installed".into(),
        ));
    }

    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            // Second Ctrl+C: the graceful path is stuck, bail out
            std::process::exit(130);
        }
        crate::log!("serve"; "shutting down...");
        request_shutdown();
    })
    .map_err(std::io::Error::other)?;

    Ok(rx)
}

fn request_shutdown() {
    if let Some(tx) = SHUTDOWN_TX.get() {
        let _ = tx.try_send(());
    }
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
