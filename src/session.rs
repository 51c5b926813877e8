//! One search, end to end: fetch from the AI service, then reveal the
//! results board by board.
//!
//! The fetch and the reveal run in a spawned task that reports back through
//! a channel. Every event carries the generation of the search that produced
//! it; the session applies only events from the current generation, so a
//! superseded search can never touch the results of a newer one.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::assistant::Assistant;
use crate::error::ScoutError;
use crate::models::SearchFilters;
use crate::reveal::{RevealController, RevealStatus, RevealStep};
use crate::store::JobListStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Fetching,
    Revealing,
    Done,
    Failed,
}

impl SearchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchPhase::Idle | SearchPhase::Done | SearchPhase::Failed)
    }
}

#[derive(Debug)]
pub struct SessionEvent {
    pub generation: u64,
    pub kind: SessionEventKind,
}

#[derive(Debug)]
pub enum SessionEventKind {
    Fetched { count: usize },
    FetchFailed(ScoutError),
    Reveal(RevealStep),
    Finished,
}

pub struct SearchSession {
    assistant: Assistant,
    controller: RevealController,
    phase: SearchPhase,
    generation: u64,
    status: RevealStatus,
    error: Option<ScoutError>,
    filters: Option<SearchFilters>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl SearchSession {
    pub fn new(assistant: Assistant, controller: RevealController) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            assistant,
            controller,
            phase: SearchPhase::Idle,
            generation: 0,
            status: RevealStatus::default(),
            error: None,
            filters: None,
            events_tx,
            events_rx,
            task: None,
        }
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn status(&self) -> &RevealStatus {
        &self.status
    }

    pub fn error(&self) -> Option<&ScoutError> {
        self.error.as_ref()
    }

    pub fn filters(&self) -> Option<&SearchFilters> {
        self.filters.as_ref()
    }

    /// Starts a new search, superseding any search still in flight.
    /// Returns the generation of the new search.
    pub fn submit(&mut self, filters: SearchFilters, store: &mut JobListStore) -> u64 {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("Superseding search #{}", self.generation);
            }
            task.abort();
        }

        self.generation += 1;
        self.phase = SearchPhase::Fetching;
        self.error = None;
        self.status = RevealStatus::starting(self.controller.sources());
        self.filters = Some(filters.clone());
        store.clear_search_results();

        let generation = self.generation;
        let assistant = self.assistant.clone();
        let controller = self.controller.clone();
        let tx = self.events_tx.clone();
        info!("Search #{} started: {}", generation, filters.describe());

        self.task = Some(tokio::spawn(async move {
            let send = |kind| tx.send(SessionEvent { generation, kind }).is_ok();

            let jobs = match assistant.generate_jobs(&filters).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    send(SessionEventKind::FetchFailed(e));
                    return;
                }
            };
            if !send(SessionEventKind::Fetched { count: jobs.len() }) {
                return;
            }
            controller
                .run(jobs, |step| send(SessionEventKind::Reveal(step)))
                .await;
            send(SessionEventKind::Finished);
        }));

        generation
    }

    /// Applies one event. Returns false when the event belonged to a
    /// superseded search and was dropped.
    pub fn apply(&mut self, event: SessionEvent, store: &mut JobListStore) -> bool {
        if event.generation != self.generation {
            trace!(
                "Dropping event from search #{} (current #{})",
                event.generation, self.generation
            );
            return false;
        }

        match event.kind {
            SessionEventKind::Fetched { count } => {
                debug!("Search #{} fetched {} job(s)", self.generation, count);
                self.phase = SearchPhase::Revealing;
            }
            SessionEventKind::FetchFailed(e) => {
                warn!("Search #{} failed: {}", self.generation, e);
                store.clear_search_results();
                self.status.abort();
                self.error = Some(e);
                self.phase = SearchPhase::Failed;
            }
            SessionEventKind::Reveal(step) => {
                self.status.apply(&step);
                if let RevealStep::Batch { jobs, .. } = step {
                    store.append_search_results(jobs);
                }
            }
            SessionEventKind::Finished => {
                info!(
                    "Search #{} done with {} result(s)",
                    self.generation,
                    store.search_results().len()
                );
                if !self.status.is_finished(self.controller.sources()) {
                    warn!(
                        "Search #{} finished with sources still pending",
                        self.generation
                    );
                }
                self.phase = SearchPhase::Done;
            }
        }
        true
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Applies events until the current search reaches a terminal phase.
    pub async fn run_to_completion(&mut self, store: &mut JobListStore) -> SearchPhase {
        self.run_until(store, |_, _| {}).await
    }

    /// Like [`run_to_completion`](Self::run_to_completion), calling `on_step`
    /// after every applied event.
    pub async fn run_until<F>(&mut self, store: &mut JobListStore, mut on_step: F) -> SearchPhase
    where
        F: FnMut(&SearchSession, &JobListStore),
    {
        while !self.phase.is_terminal() {
            let Some(event) = self.next_event().await else {
                break;
            };
            if self.apply(event, store) {
                on_step(self, store);
            }
        }
        self.phase
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::LlmError;
    use crate::assistant::testing::ScriptedProvider;
    use crate::db::MemoryStore;
    use crate::models::{sample_job, Job, JobBoard};
    use crate::pagination::{total_pages, PageCursor, PAGE_SIZE};
    use crate::reveal::DEFAULT_REVEAL_DELAY;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn jobs(prefix: &str, n: usize) -> Vec<Job> {
        (0..n).map(|i| sample_job(&format!("{}{}", prefix, i))).collect()
    }

    fn titles(jobs: &[Job]) -> Vec<String> {
        jobs.iter().map(|j| j.title.clone()).collect()
    }

    fn setup(provider: ScriptedProvider) -> (SearchSession, JobListStore) {
        let assistant = Assistant::new(Arc::new(provider));
        let session = SearchSession::new(assistant, RevealController::default());
        let store = JobListStore::load(Box::new(MemoryStore::new()));
        (session, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_reveals_all_results() {
        let (mut session, mut store) = setup(ScriptedProvider::new().reply_jobs(&jobs("ai", 9)));
        assert_eq!(session.phase(), SearchPhase::Idle);

        let filters = SearchFilters {
            query: "AI Engineer".to_string(),
            location: "Remote".to_string(),
            employment_kind: "Full-time".to_string(),
            ..SearchFilters::default()
        };
        session.submit(filters, &mut store);
        assert_eq!(session.phase(), SearchPhase::Fetching);
        assert_eq!(session.status().current(), Some(JobBoard::LinkedIn));

        let mut seen_counts = Vec::new();
        let phase = session
            .run_until(&mut store, |_, store| seen_counts.push(store.search_results().len()))
            .await;

        assert_eq!(phase, SearchPhase::Done);
        assert_eq!(store.search_results().len(), 9);
        assert_eq!(total_pages(store.search_results().len(), PAGE_SIZE), 1);
        let cursor = PageCursor::default();
        assert_eq!(cursor.slice(store.search_results()).len(), 9);
        assert!(session.status().is_finished(&JobBoard::ALL));
        assert!(session.error().is_none());

        // Results grew batch by batch rather than all at once.
        assert!(seen_counts.contains(&2));
        assert_eq!(seen_counts.last(), Some(&9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_records_error() {
        let (mut session, mut store) = setup(ScriptedProvider::new().fail(LlmError::Api {
            provider: "scripted",
            status: 500,
            message: "boom".to_string(),
        }));

        session.submit(SearchFilters::initial(), &mut store);
        let phase = session.run_to_completion(&mut store).await;

        assert_eq!(phase, SearchPhase::Failed);
        assert!(store.search_results().is_empty());
        assert_eq!(session.status().current(), None);
        assert!(session.status().completed().is_empty());
        assert!(session.error().unwrap().is_service_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_result_finishes_without_batches() {
        let (mut session, mut store) = setup(ScriptedProvider::new().reply("[]"));
        let started = tokio::time::Instant::now();

        session.submit(SearchFilters::default(), &mut store);
        assert_eq!(session.run_to_completion(&mut store).await, SearchPhase::Done);

        assert!(store.search_results().is_empty());
        assert!(session.status().is_finished(&JobBoard::ALL));
        assert!(started.elapsed() < DEFAULT_REVEAL_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_search_supersedes_reveal_in_progress() {
        let first = jobs("old", 10);
        let second = jobs("new", 4);
        let (mut session, mut store) = setup(
            ScriptedProvider::new()
                .reply_jobs(&first)
                .reply_jobs(&second),
        );

        let first_generation = session.submit(SearchFilters::initial(), &mut store);
        while store.search_results().is_empty() {
            let event = session.next_event().await.unwrap();
            session.apply(event, &mut store);
        }
        assert_eq!(session.phase(), SearchPhase::Revealing);

        let second_generation = session.submit(SearchFilters::default(), &mut store);
        assert!(second_generation > first_generation);
        assert!(store.search_results().is_empty());
        assert_eq!(session.status().completed(), &[] as &[JobBoard]);

        assert_eq!(session.run_to_completion(&mut store).await, SearchPhase::Done);
        assert_eq!(titles(store.search_results()), titles(&second));
        assert!(session.status().is_finished(&JobBoard::ALL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_events_are_dropped() {
        let (mut session, mut store) = setup(ScriptedProvider::new().reply("[]"));
        let generation = session.submit(SearchFilters::default(), &mut store);
        session.run_to_completion(&mut store).await;

        let stale = SessionEvent {
            generation: generation - 1,
            kind: SessionEventKind::Reveal(RevealStep::Batch {
                board: JobBoard::Indeed,
                jobs: jobs("ghost", 3),
            }),
        };
        assert!(!session.apply(stale, &mut store));
        assert!(store.search_results().is_empty());
        assert!(session.status().is_finished(&JobBoard::ALL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reused_model_id_does_not_alias_saved_job() {
        let mut first = sample_job("job-1");
        first.title = "First search job".to_string();
        let mut second = sample_job("job-1");
        second.title = "Second search job".to_string();
        let (mut session, mut store) = setup(
            ScriptedProvider::new()
                .reply_jobs(&[first])
                .reply_jobs(&[second]),
        );

        session.submit(SearchFilters::initial(), &mut store);
        session.run_to_completion(&mut store).await;
        let saved = store.search_results()[0].clone();
        assert!(store.save(saved.clone()));

        session.submit(SearchFilters::default(), &mut store);
        session.run_to_completion(&mut store).await;
        let fresh = store.search_results()[0].clone();
        assert_eq!(fresh.title, "Second search job");
        assert_ne!(fresh.id, saved.id);
        assert!(!store.is_saved(&fresh.id));

        assert!(store.toggle_saved(&fresh));
        assert_eq!(
            titles(store.saved_jobs()),
            vec!["First search job".to_string(), "Second search job".to_string()]
        );
    }
}
