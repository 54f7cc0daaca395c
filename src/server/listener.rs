//! Accept loop for one bound server.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rayon::ThreadPool;
use tiny_http::Server;

use super::Application;
use crate::error::ServeError;
use crate::{debug, log};

/// A running accept loop. Requests are handled on the shared pool.
pub struct Listener {
    server: Arc<Server>,
    thread: Option<JoinHandle<()>>,
}

impl Listener {
    pub fn spawn(
        name: &str,
        server: Server,
        app: Arc<Application>,
        pool: Arc<ThreadPool>,
    ) -> Result<Self, ServeError> {
        let server = Arc::new(server);
        let accept = Arc::clone(&server);
        let label = name.to_string();

        let thread = thread::Builder::new()
            .name(format!("hotserve-{name}"))
            .spawn(move || {
                for request in accept.incoming_requests() {
                    let app = Arc::clone(&app);
                    let label = label.clone();
                    pool.spawn(move || {
                        if let Err(e) = app.handle(request) {
                            debug!("serve"; "[{}] response failed: {}", label, e);
                        }
                    });
                }
                debug!("serve"; "[{}] accept loop exited", label);
            })?;

        Ok(Self {
            server,
            thread: Some(thread),
        })
    }

    /// Stop accepting and wait for the accept loop to exit.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log!("error"; "accept loop panicked");
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("addr", &self.server.server_addr().to_ip())
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown();
    }
}
