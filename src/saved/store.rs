//! Per-user saved-countries sets.
//!
//! Each user's set sits behind its own async mutex, held across the whole
//! read-modify-persist sequence so concurrent mutations never lose updates.

use crate::countries::Country;
use crate::saved::session::SessionMirror;
use crate::saved::storage::KvStore;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const STORAGE_PREFIX: &str = "savedCountries_";

/// An authenticated user, identified by email.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    /// `None` for blank identities.
    pub fn new(email: &str) -> Option<Self> {
        let email = email.trim();
        (!email.is_empty()).then(|| Self(email.to_owned()))
    }

    pub fn email(&self) -> &str {
        &self.0
    }

    fn storage_key(&self) -> String {
        format!("{STORAGE_PREFIX}{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(UserId),
}

impl Identity {
    pub fn from_email(email: Option<&str>) -> Self {
        email
            .and_then(UserId::new)
            .map_or(Self::Anonymous, Self::User)
    }

    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::User(user) => Some(user),
            Self::Anonymous => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum SavedState {
    #[default]
    Loading,
    Ready(IndexMap<String, Country>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Added,
    AlreadyPresent,
    Removed,
    NotPresent,
    /// No identity; nothing happened.
    Anonymous,
    /// The user's set could not be loaded yet.
    NotReady,
}

impl MutationOutcome {
    pub fn changed(self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}

pub struct SavedCountries {
    kv: Arc<dyn KvStore>,
    mirror: Option<SessionMirror>,
    users: DashMap<UserId, Arc<Mutex<SavedState>>>,
}

impl SavedCountries {
    pub fn new(kv: Arc<dyn KvStore>, mirror: Option<SessionMirror>) -> Self {
        Self {
            kv,
            mirror,
            users: DashMap::new(),
        }
    }

    fn slot(&self, user: &UserId) -> Arc<Mutex<SavedState>> {
        self.users.entry(user.clone()).or_default().clone()
    }

    /// Restore the user's set from storage, replacing any in-memory state.
    pub async fn load(&self, identity: &Identity) {
        let Some(user) = identity.user() else {
            return;
        };
        let slot = self.slot(user);
        let mut state = slot.lock().await;
        let saved = self.read(user).await;
        self.mirror_to_session(user, &saved);
        *state = SavedState::Ready(saved);
    }

    /// Load only if nothing is held for the user yet.
    pub async fn ensure_loaded(&self, identity: &Identity) {
        let Some(user) = identity.user() else {
            return;
        };
        let slot = self.slot(user);
        let mut state = slot.lock().await;
        if matches!(*state, SavedState::Loading) {
            let saved = self.read(user).await;
            self.mirror_to_session(user, &saved);
            *state = SavedState::Ready(saved);
        }
    }

    async fn read(&self, user: &UserId) -> IndexMap<String, Country> {
        let raw = match self.kv.get(&user.storage_key()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return IndexMap::new(),
            Err(e) => {
                warn!(user = %user, error = ?e, "failed to read saved countries; starting empty");
                return IndexMap::new();
            }
        };

        match serde_json::from_str::<Vec<Country>>(&raw) {
            Ok(countries) => {
                let saved: IndexMap<_, _> = countries
                    .into_iter()
                    .map(|c| (c.cca3.clone(), c))
                    .collect();
                debug!(user = %user, count = saved.len(), "saved countries loaded");
                saved
            }
            Err(e) => {
                warn!(user = %user, error = %e, "stored saved countries are malformed; resetting");
                IndexMap::new()
            }
        }
    }

    async fn persist(&self, user: &UserId, saved: &IndexMap<String, Country>) {
        let countries: Vec<&Country> = saved.values().collect();
        let result = match serde_json::to_string(&countries) {
            Ok(json) => self.kv.set(&user.storage_key(), &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(user = %user, error = ?e, "failed to persist saved countries");
        }
        self.mirror_to_session(user, saved);
    }

    /// Queue the saved codes for the user's session; called on load and after every mutation.
    fn mirror_to_session(&self, user: &UserId, saved: &IndexMap<String, Country>) {
        if let Some(mirror) = &self.mirror {
            mirror.enqueue(user.email(), saved.keys().cloned().collect());
        }
    }

    /// Insert `country` unless its code is already saved.
    pub async fn add(&self, identity: &Identity, country: Country) -> MutationOutcome {
        let Some(user) = identity.user() else {
            return MutationOutcome::Anonymous;
        };
        let slot = self.slot(user);
        let mut state = slot.lock().await;
        let SavedState::Ready(saved) = &mut *state else {
            return MutationOutcome::NotReady;
        };
        if saved.contains_key(&country.cca3) {
            return MutationOutcome::AlreadyPresent;
        }

        info!(user = %user, code = %country.cca3, "country saved");
        saved.insert(country.cca3.clone(), country);
        self.persist(user, saved).await;
        MutationOutcome::Added
    }

    pub async fn remove(&self, identity: &Identity, code: &str) -> MutationOutcome {
        let Some(user) = identity.user() else {
            return MutationOutcome::Anonymous;
        };
        let slot = self.slot(user);
        let mut state = slot.lock().await;
        let SavedState::Ready(saved) = &mut *state else {
            return MutationOutcome::NotReady;
        };
        if saved.shift_remove(code).is_none() {
            return MutationOutcome::NotPresent;
        }

        info!(user = %user, code, "country unsaved");
        self.persist(user, saved).await;
        MutationOutcome::Removed
    }

    /// `None` while the set is not yet known (loading or anonymous).
    pub async fn contains(&self, identity: &Identity, code: &str) -> Option<bool> {
        let user = identity.user()?;
        let slot = self.users.get(user).map(|s| s.value().clone())?;
        let state = slot.lock().await;
        match &*state {
            SavedState::Ready(saved) => Some(saved.contains_key(code)),
            SavedState::Loading => None,
        }
    }

    /// Saved records in insertion order; `None` while not yet known.
    pub async fn list(&self, identity: &Identity) -> Option<Vec<Country>> {
        let user = identity.user()?;
        let slot = self.users.get(user).map(|s| s.value().clone())?;
        let state = slot.lock().await;
        match &*state {
            SavedState::Ready(saved) => Some(saved.values().cloned().collect()),
            SavedState::Loading => None,
        }
    }

    /// Drop in-memory state for the user; storage is untouched.
    pub fn unload(&self, identity: &Identity) {
        if let Some(user) = identity.user()
            && self.users.remove(user).is_some()
        {
            debug!(user = %user, "saved countries unloaded");
        }
    }

    pub fn loaded_users(&self) -> usize {
        self.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countries::fixtures::country;
    use crate::saved::session::SessionStore;
    use crate::saved::storage::MemoryKvStore;
    use tokio_util::sync::CancellationToken;

    fn alice() -> Identity {
        Identity::from_email(Some("alice@example.test"))
    }

    fn store_with(kv: Arc<MemoryKvStore>) -> SavedCountries {
        SavedCountries::new(kv, None)
    }

    #[test]
    fn blank_identity_is_anonymous() {
        assert_eq!(Identity::from_email(None), Identity::Anonymous);
        assert_eq!(Identity::from_email(Some("   ")), Identity::Anonymous);
        assert!(alice().user().is_some());
    }

    #[tokio::test]
    async fn anonymous_operations_are_no_ops() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = store_with(kv.clone());
        let anon = Identity::Anonymous;

        store.load(&anon).await;
        let france = country("FRA", "France", "Europe", &["Paris"]);
        assert_eq!(store.add(&anon, france).await, MutationOutcome::Anonymous);
        assert_eq!(store.remove(&anon, "FRA").await, MutationOutcome::Anonymous);
        assert_eq!(store.contains(&anon, "FRA").await, None);
        assert_eq!(store.list(&anon).await, None);
        assert_eq!(store.loaded_users(), 0);
    }

    #[tokio::test]
    async fn unknown_until_loaded() {
        let store = store_with(Arc::new(MemoryKvStore::new()));
        assert_eq!(store.contains(&alice(), "FRA").await, None);
        assert_eq!(
            store
                .add(&alice(), country("FRA", "France", "Europe", &[]))
                .await,
            MutationOutcome::NotReady
        );

        store.load(&alice()).await;
        assert_eq!(store.contains(&alice(), "FRA").await, Some(false));
    }

    #[tokio::test]
    async fn add_then_remove_round_trips() {
        let store = store_with(Arc::new(MemoryKvStore::new()));
        store.load(&alice()).await;

        let france = country("FRA", "France", "Europe", &["Paris"]);
        assert_eq!(store.add(&alice(), france.clone()).await, MutationOutcome::Added);
        assert_eq!(store.contains(&alice(), "FRA").await, Some(true));
        assert_eq!(store.remove(&alice(), "FRA").await, MutationOutcome::Removed);
        assert_eq!(store.contains(&alice(), "FRA").await, Some(false));
        assert_eq!(store.list(&alice()).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn add_is_idempotent_and_order_is_kept() {
        let store = store_with(Arc::new(MemoryKvStore::new()));
        store.load(&alice()).await;

        let japan = country("JPN", "Japan", "Asia", &["Tokyo"]);
        let france = country("FRA", "France", "Europe", &["Paris"]);
        store.add(&alice(), japan.clone()).await;
        store.add(&alice(), france.clone()).await;
        assert_eq!(store.add(&alice(), japan.clone()).await, MutationOutcome::AlreadyPresent);
        assert_eq!(store.remove(&alice(), "DEU").await, MutationOutcome::NotPresent);

        assert_eq!(store.list(&alice()).await, Some(vec![japan, france]));
    }

    #[tokio::test]
    async fn mutations_persist_and_reload() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = store_with(kv.clone());
        store.load(&alice()).await;
        store
            .add(&alice(), country("FRA", "France", "Europe", &["Paris"]))
            .await;

        let raw = kv.get("savedCountries_alice@example.test").await.unwrap().unwrap();
        let stored: Vec<Country> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 1);

        let fresh = store_with(kv);
        fresh.load(&alice()).await;
        assert_eq!(fresh.contains(&alice(), "FRA").await, Some(true));
    }

    #[tokio::test]
    async fn malformed_storage_resets_to_empty() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set("savedCountries_alice@example.test", "{not json").await.unwrap();
        let store = store_with(kv);

        store.load(&alice()).await;
        assert_eq!(store.list(&alice()).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn ensure_loaded_keeps_existing_state() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = store_with(kv.clone());
        store.ensure_loaded(&alice()).await;
        store
            .add(&alice(), country("FRA", "France", "Europe", &[]))
            .await;

        // Storage changed behind our back; ensure_loaded must not re-read it.
        kv.set("savedCountries_alice@example.test", "[]").await.unwrap();
        store.ensure_loaded(&alice()).await;
        assert_eq!(store.contains(&alice(), "FRA").await, Some(true));

        store.load(&alice()).await;
        assert_eq!(store.contains(&alice(), "FRA").await, Some(false));
    }

    #[tokio::test]
    async fn unload_forgets_memory_only() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = store_with(kv);
        store.load(&alice()).await;
        store
            .add(&alice(), country("FRA", "France", "Europe", &[]))
            .await;

        store.unload(&alice());
        assert_eq!(store.contains(&alice(), "FRA").await, None);
        store.ensure_loaded(&alice()).await;
        assert_eq!(store.contains(&alice(), "FRA").await, Some(true));
    }

    #[tokio::test]
    async fn concurrent_adds_are_all_kept() {
        let store = Arc::new(store_with(Arc::new(MemoryKvStore::new())));
        store.load(&alice()).await;

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let code = format!("C{i:02}");
                    store.add(&alice(), country(&code, &code, "Europe", &[])).await
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), MutationOutcome::Added);
        }
        assert_eq!(store.list(&alice()).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn loading_mirrors_the_persisted_set() {
        let kv = Arc::new(MemoryKvStore::new());
        let seeded = serde_json::to_string(&[country("DEU", "Germany", "Europe", &[])]).unwrap();
        kv.set("savedCountries_alice@example.test", &seeded)
            .await
            .unwrap();

        let sessions = Arc::new(SessionStore::new());
        sessions.open("alice@example.test");
        let (mirror, worker) = SessionMirror::spawn(sessions.clone(), CancellationToken::new());

        let store = SavedCountries::new(kv, Some(mirror));
        store.ensure_loaded(&alice()).await;

        drop(store);
        worker.await.unwrap();
        assert_eq!(
            sessions.snapshot("alice@example.test").unwrap().saved_countries,
            vec!["DEU"]
        );
    }

    #[tokio::test]
    async fn mutations_are_mirrored_into_the_session() {
        let sessions = Arc::new(SessionStore::new());
        sessions.open("alice@example.test");
        let (mirror, worker) = SessionMirror::spawn(sessions.clone(), CancellationToken::new());

        let store = SavedCountries::new(Arc::new(MemoryKvStore::new()), Some(mirror));
        store.load(&alice()).await;
        store
            .add(&alice(), country("JPN", "Japan", "Asia", &[]))
            .await;
        store
            .add(&alice(), country("FRA", "France", "Europe", &[]))
            .await;
        store.remove(&alice(), "JPN").await;

        drop(store);
        worker.await.unwrap();
        assert_eq!(
            sessions.snapshot("alice@example.test").unwrap().saved_countries,
            vec!["FRA"]
        );
    }
}
