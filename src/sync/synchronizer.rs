//! Keeps search state, the shareable address and issued queries consistent.
//!
//! [`Synchronizer`] is the synchronous core: it turns changes into effects.
//! [`spawn`] wraps it in a task that debounces text input with tokio timers.

use crate::countries::filter::{clamp_page, clamp_page_size};
use crate::sync::generation::RequestGeneration;
use crate::sync::url_state::{SearchState, normalize_region};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Text(String),
    Region(String),
    Page(i64),
    PageSize(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Replace the address bar with this canonical href.
    Navigate(String),
    /// Run this query; apply its result only while `generation` is current.
    Query { generation: u64, state: SearchState },
    ScrollToTop,
}

#[derive(Debug)]
pub struct Synchronizer {
    state: SearchState,
    href: String,
    generations: RequestGeneration,
}

impl Synchronizer {
    pub fn new(initial: SearchState, generations: RequestGeneration) -> Self {
        let href = initial.href();
        Self {
            state: initial,
            href,
            generations,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn generations(&self) -> &RequestGeneration {
        &self.generations
    }

    /// Query for the initial state, before any change has been made.
    pub fn start(&mut self) -> Effect {
        Effect::Query {
            generation: self.generations.issue(),
            state: self.state.clone(),
        }
    }

    pub fn commit_text(&mut self, text: impl Into<String>) -> Vec<Effect> {
        self.apply([Change::Text(text.into())])
    }

    pub fn set_region(&mut self, region: impl Into<String>) -> Vec<Effect> {
        self.apply([Change::Region(region.into())])
    }

    pub fn set_page(&mut self, page: i64) -> Vec<Effect> {
        self.apply([Change::Page(page)])
    }

    pub fn set_page_size(&mut self, page_size: i64) -> Vec<Effect> {
        self.apply([Change::PageSize(page_size)])
    }

    /// Apply changes in order as one commit. Text, region and page-size changes
    /// reset the page to 1; a page change alone also scrolls to the top.
    /// Returns no effects when nothing changed.
    pub fn apply(&mut self, changes: impl IntoIterator<Item = Change>) -> Vec<Effect> {
        let before = self.state.clone();
        let mut scroll = false;

        for change in changes {
            let state = &mut self.state;
            match change {
                Change::Text(text) if text != state.text => {
                    state.text = text;
                    state.page = 1;
                }
                Change::Region(region) => {
                    let region = normalize_region(&region);
                    if region != state.region {
                        state.region = region;
                        state.page = 1;
                    }
                }
                Change::PageSize(size) => {
                    let size = clamp_page_size(size);
                    if size != state.page_size {
                        state.page_size = size;
                        state.page = 1;
                    }
                }
                Change::Page(page) => {
                    let page = clamp_page(page);
                    if page != state.page {
                        state.page = page;
                        scroll = true;
                    }
                }
                Change::Text(_) => {}
            }
        }

        if self.state == before {
            return Vec::new();
        }

        let mut effects = Vec::with_capacity(3);
        if scroll {
            effects.push(Effect::ScrollToTop);
        }
        let href = self.state.href();
        if href != self.href {
            self.href = href.clone();
            effects.push(Effect::Navigate(href));
        }
        effects.push(Effect::Query {
            generation: self.generations.issue(),
            state: self.state.clone(),
        });
        trace!(href = %self.href, "search state committed");
        effects
    }
}

/// Input side of a running synchronizer task.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Change>,
}

impl SyncHandle {
    /// Typed text; committed once input has been quiet for the debounce delay.
    pub fn type_text(&self, text: impl Into<String>) {
        self.send(Change::Text(text.into()));
    }

    pub fn set_region(&self, region: impl Into<String>) {
        self.send(Change::Region(region.into()));
    }

    pub fn set_page(&self, page: i64) {
        self.send(Change::Page(page));
    }

    pub fn set_page_size(&self, page_size: i64) {
        self.send(Change::PageSize(page_size));
    }

    fn send(&self, change: Change) {
        if self.tx.send(change).is_err() {
            debug!("synchronizer task has stopped; change dropped");
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run `sync` on a task. Text changes are debounced; other changes apply at
/// once, absorbing any text still waiting. Pending text is flushed when every
/// handle is dropped. The task stops when the effect receiver is dropped.
pub fn spawn(
    mut sync: Synchronizer,
    debounce: Duration,
) -> (SyncHandle, mpsc::UnboundedReceiver<Effect>, JoinHandle<()>) {
    let (tx, mut changes) = mpsc::unbounded_channel::<Change>();
    let (effects_tx, effects) = mpsc::unbounded_channel::<Effect>();

    let handle = tokio::spawn(async move {
        let mut pending: Option<(String, Instant)> = None;

        let emit = |batch: Vec<Effect>| batch.into_iter().all(|e| effects_tx.send(e).is_ok());

        loop {
            let deadline = pending.as_ref().map(|(_, at)| *at);
            let batch = tokio::select! {
                change = changes.recv() => match change {
                    Some(Change::Text(text)) => {
                        pending = Some((text, Instant::now() + debounce));
                        continue;
                    }
                    Some(change) => {
                        let mut batch: Vec<Change> = pending
                            .take()
                            .map(|(text, _)| Change::Text(text))
                            .into_iter()
                            .collect();
                        batch.push(change);
                        batch
                    }
                    None => {
                        if let Some((text, _)) = pending.take() {
                            emit(sync.commit_text(text));
                        }
                        break;
                    }
                },
                _ = wait_for(deadline) => match pending.take() {
                    Some((text, _)) => vec![Change::Text(text)],
                    None => continue,
                },
            };

            if !emit(sync.apply(batch)) {
                debug!("effect receiver dropped; synchronizer stopping");
                break;
            }
        }
    });

    (SyncHandle { tx }, effects, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Synchronizer {
        Synchronizer::new(SearchState::default(), RequestGeneration::new())
    }

    fn navigations(effects: &[Effect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Navigate(href) => Some(href.as_str()),
                _ => None,
            })
            .collect()
    }

    fn query_state(effects: &[Effect]) -> &SearchState {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Query { state, .. } => Some(state),
                _ => None,
            })
            .expect("a query effect")
    }

    #[test]
    fn text_change_resets_page() {
        let mut sync = core();
        sync.set_page(4);
        let effects = sync.commit_text("an");
        assert_eq!(navigations(&effects), vec!["/?q=an"]);
        assert_eq!(query_state(&effects).page, 1);
        assert!(!effects.contains(&Effect::ScrollToTop));
    }

    #[test]
    fn region_and_page_size_changes_reset_page() {
        let mut sync = core();
        sync.set_page(3);
        assert_eq!(sync.set_region("Asia"), sync_effects("/?region=Asia", 2));
        sync.set_page(2);
        let effects = sync.set_page_size(25);
        assert_eq!(navigations(&effects), vec!["/?region=Asia&limit=25"]);
    }

    fn sync_effects(href: &str, generation: u64) -> Vec<Effect> {
        vec![
            Effect::Navigate(href.to_owned()),
            Effect::Query {
                generation,
                state: SearchState::from_query(href.trim_start_matches('/')),
            },
        ]
    }

    #[test]
    fn page_change_keeps_filters_and_scrolls() {
        let mut sync = core();
        sync.commit_text("an");
        sync.set_region("Asia");
        let effects = sync.set_page(2);
        assert_eq!(effects[0], Effect::ScrollToTop);
        assert_eq!(navigations(&effects), vec!["/?q=an&region=Asia&page=2"]);
        let state = query_state(&effects);
        assert_eq!((state.text.as_str(), state.region.as_str()), ("an", "Asia"));
    }

    #[test]
    fn unchanged_input_emits_nothing() {
        let mut sync = core();
        assert!(sync.set_page(1).is_empty());
        assert!(sync.set_region("all").is_empty());
        assert!(sync.commit_text("").is_empty());
        assert!(sync.set_page_size(10).is_empty());
    }

    #[test]
    fn every_commit_issues_a_newer_generation() {
        let mut sync = core();
        let Effect::Query { generation: initial, .. } = sync.start() else {
            panic!("start must query");
        };
        let effects = sync.commit_text("fr");
        let Some(Effect::Query { generation, .. }) = effects.last() else {
            panic!("expected a query");
        };
        assert!(*generation > initial);
        assert!(sync.generations().is_current(*generation));
        assert!(!sync.generations().is_current(initial));
    }

    #[test]
    fn returning_to_defaults_navigates_to_root() {
        let mut sync = Synchronizer::new(
            SearchState::from_query("q=fr&page=2"),
            RequestGeneration::new(),
        );
        assert_eq!(sync.href(), "/?q=fr&page=2");
        let effects = sync.commit_text("");
        assert_eq!(navigations(&effects), vec!["/"]);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_commits_once_after_quiet_period() {
        let start = Instant::now();
        let (handle, mut effects, _task) = spawn(core(), DEFAULT_DEBOUNCE);

        handle.type_text("f");
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.type_text("fr");
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.type_text("fra");
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(effects.try_recv().is_err());

        assert_eq!(effects.recv().await, Some(Effect::Navigate("/?q=fra".into())));
        assert!(start.elapsed() >= Duration::from_millis(500));
        let Some(Effect::Query { state, .. }) = effects.recv().await else {
            panic!("expected a query");
        };
        assert_eq!(state.text, "fra");
        assert!(effects.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_change_absorbs_pending_text() {
        let (handle, mut effects, _task) = spawn(core(), DEFAULT_DEBOUNCE);

        handle.type_text("an");
        handle.set_region("Asia");

        assert_eq!(
            effects.recv().await,
            Some(Effect::Navigate("/?q=an&region=Asia".into()))
        );
        assert!(matches!(effects.recv().await, Some(Effect::Query { generation: 1, .. })));

        // Nothing left to fire once the debounce window passes.
        tokio::time::sleep(DEFAULT_DEBOUNCE * 2).await;
        assert!(effects.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handles_flushes_pending_text() {
        let (handle, mut effects, task) = spawn(core(), DEFAULT_DEBOUNCE);
        handle.type_text("paris");
        drop(handle);
        task.await.unwrap();

        assert_eq!(effects.recv().await, Some(Effect::Navigate("/?q=paris".into())));
    }
}
