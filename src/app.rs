use crate::config::Config;
use crate::saved::{FileKvStore, SessionMirror, SessionStore};
use crate::state::AppState;
use crate::sync::SearchState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    shutdown: CancellationToken,
    mirror_task: JoinHandle<()>,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let sessions = Arc::new(SessionStore::new());
        let shutdown = CancellationToken::new();
        let (mirror, mirror_task) = SessionMirror::spawn(sessions.clone(), shutdown.clone());

        let kv = Arc::new(FileKvStore::new(&config.saved_countries_dir));
        info!(path = %kv.root().display(), "saved countries stored on disk");

        let app_state = AppState::new(&config, kv, sessions, Some(mirror))
            .context("Failed to build application state")?;

        if !app_state.weather.is_configured() {
            warn!("WEATHER_API_KEY is not set; detail pages will omit weather");
        }
        if !app_state.photos.is_configured() {
            warn!("UNSPLASH_ACCESS_KEY is not set; detail pages will omit photos");
        }

        // Warm the directory so the first search is fast (non-fatal if it fails).
        let start = Instant::now();
        match app_state.search.directory().fetch_all().await {
            Ok(countries) => info!(
                count = countries.len(),
                duration = fmt_duration(start.elapsed()),
                "country directory warmed"
            ),
            Err(e) => warn!(error = ?e, "Failed to warm country directory on startup (non-fatal)"),
        }

        Ok(App {
            config,
            app_state,
            shutdown,
            mirror_task,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Serve the API until a shutdown signal, then drain within the configured timeout.
    pub async fn serve(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = ?e, %addr, "failed to bind web server");
                return ExitCode::FAILURE;
            }
        };
        info!(%addr, "web server listening");

        let router = create_router(self.app_state.clone());
        let signal = self.shutdown.clone();
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.cancel();
        });
        let mut server = tokio::spawn(server.into_future());
        let abort = server.abort_handle();

        let timeout = self.config.shutdown_timeout;
        let code = tokio::select! {
            result = &mut server => match result {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(e)) => {
                    error!(error = ?e, "web server failed");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    error!(error = ?e, "web server task panicked");
                    ExitCode::FAILURE
                }
            },
            _ = async {
                self.shutdown.cancelled().await;
                tokio::time::sleep(timeout).await;
            } => {
                warn!(
                    timeout = fmt_duration(timeout),
                    "graceful shutdown timed out; aborting open connections"
                );
                abort.abort();
                ExitCode::FAILURE
            }
        };

        self.shutdown.cancel();
        if tokio::time::timeout(timeout, self.mirror_task).await.is_err() {
            warn!("session mirror did not stop in time");
        }
        info!("shutdown complete");
        code
    }

    /// Run the interactive browser on stdin/stdout.
    pub async fn browse(self, query: &str) -> ExitCode {
        let initial = SearchState::from_query(query);
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let result = crate::browse::run(
            self.app_state.search.clone(),
            initial,
            self.config.search_debounce,
            stdin,
            tokio::io::stdout(),
        )
        .await;

        self.shutdown.cancel();
        let _ = self.mirror_task.await;
        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = ?e, "browse session failed");
                ExitCode::FAILURE
            }
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
