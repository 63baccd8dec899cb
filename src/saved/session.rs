//! Server-side session state and best-effort mirroring of saved codes into it.
//!
//! The mirror runs as a single worker task fed by a channel. Failed updates are
//! logged and dropped; nothing here ever blocks or fails a saved-set mutation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionSnapshot {
    pub email: String,
    pub saved_countries: Vec<String>,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active session for {0}")]
    NoSession(String),
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionSnapshot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `email` if none exists; returns the current snapshot.
    pub fn open(&self, email: &str) -> SessionSnapshot {
        self.sessions
            .entry(email.to_owned())
            .or_insert_with(|| {
                let now = Utc::now();
                debug!(email, "session opened");
                SessionSnapshot {
                    email: email.to_owned(),
                    saved_countries: Vec::new(),
                    opened_at: now,
                    updated_at: now,
                }
            })
            .clone()
    }

    /// Returns whether a session existed.
    pub fn close(&self, email: &str) -> bool {
        self.sessions.remove(email).is_some()
    }

    pub fn snapshot(&self, email: &str) -> Option<SessionSnapshot> {
        self.sessions.get(email).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn update_saved(&self, email: &str, codes: Vec<String>) -> Result<(), SessionError> {
        let mut session = self
            .sessions
            .get_mut(email)
            .ok_or_else(|| SessionError::NoSession(email.to_owned()))?;
        session.saved_countries = codes;
        session.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug)]
struct MirrorJob {
    email: String,
    codes: Vec<String>,
}

/// Handle for enqueueing session updates.
#[derive(Clone)]
pub struct SessionMirror {
    tx: mpsc::UnboundedSender<MirrorJob>,
}

impl SessionMirror {
    /// Start the worker. It exits when cancelled or once every handle is dropped,
    /// draining queued jobs either way.
    pub fn spawn(sessions: Arc<SessionStore>, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<MirrorJob>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        rx.close();
                        while let Some(job) = rx.recv().await {
                            apply(&sessions, job);
                        }
                        info!("session mirror stopped");
                        break;
                    }
                    job = rx.recv() => match job {
                        Some(job) => apply(&sessions, job),
                        None => {
                            debug!("session mirror channel closed");
                            break;
                        }
                    },
                }
            }
        });

        (Self { tx }, handle)
    }

    pub fn enqueue(&self, email: &str, codes: Vec<String>) {
        let job = MirrorJob {
            email: email.to_owned(),
            codes,
        };
        if self.tx.send(job).is_err() {
            debug!(email, "session mirror is not running; update dropped");
        }
    }
}

fn apply(sessions: &SessionStore, job: MirrorJob) {
    let count = job.codes.len();
    match sessions.update_saved(&job.email, job.codes) {
        Ok(()) => debug!(email = %job.email, count, "session saved countries updated"),
        Err(e) => warn!(
            email = %job.email,
            error = %e,
            "failed to mirror saved countries into session"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_requires_an_open_session() {
        let store = SessionStore::new();
        let err = store
            .update_saved("a@b.test", vec!["FRA".into()])
            .unwrap_err();
        assert!(matches!(err, SessionError::NoSession(_)));

        store.open("a@b.test");
        store.update_saved("a@b.test", vec!["FRA".into()]).unwrap();
        assert_eq!(
            store.snapshot("a@b.test").unwrap().saved_countries,
            vec!["FRA"]
        );
    }

    #[test]
    fn open_is_idempotent_and_close_forgets() {
        let store = SessionStore::new();
        let first = store.open("a@b.test");
        store.update_saved("a@b.test", vec!["DEU".into()]).unwrap();
        let second = store.open("a@b.test");
        assert_eq!(first.opened_at, second.opened_at);
        assert_eq!(second.saved_countries, vec!["DEU"]);

        assert!(store.close("a@b.test"));
        assert!(!store.close("a@b.test"));
        assert!(store.snapshot("a@b.test").is_none());
    }

    #[tokio::test]
    async fn worker_applies_jobs_in_order_and_survives_failures() {
        let sessions = Arc::new(SessionStore::new());
        sessions.open("a@b.test");
        let (mirror, handle) = SessionMirror::spawn(sessions.clone(), CancellationToken::new());

        mirror.enqueue("nobody@b.test", vec!["FRA".into()]);
        mirror.enqueue("a@b.test", vec!["FRA".into()]);
        mirror.enqueue("a@b.test", vec!["FRA".into(), "JPN".into()]);
        drop(mirror);
        handle.await.unwrap();

        assert_eq!(
            sessions.snapshot("a@b.test").unwrap().saved_countries,
            vec!["FRA", "JPN"]
        );
        assert!(sessions.snapshot("nobody@b.test").is_none());
    }

    #[tokio::test]
    async fn cancellation_stops_the_worker() {
        let sessions = Arc::new(SessionStore::new());
        let cancel = CancellationToken::new();
        let (mirror, handle) = SessionMirror::spawn(sessions, cancel.clone());

        cancel.cancel();
        handle.await.unwrap();
        // Enqueueing after shutdown is silently dropped.
        mirror.enqueue("a@b.test", Vec::new());
    }
}
