//! Simulated progressive reveal of search results.
//!
//! The AI service returns the whole result list at once. To show results
//! arriving from several job boards, the list is cut into one contiguous
//! batch per board and the batches are released one at a time with a fixed
//! scan delay in between.

use std::time::Duration;
use tracing::trace;

use crate::models::{Job, JobBoard};

pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(600);

/// Which boards have been "scanned" so far in the current search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealStatus {
    completed: Vec<JobBoard>,
    current: Option<JobBoard>,
}

impl RevealStatus {
    /// Status at the start of a search: nothing done, first board in progress.
    pub fn starting(sources: &[JobBoard]) -> Self {
        Self {
            completed: Vec::new(),
            current: sources.first().copied(),
        }
    }

    pub fn completed(&self) -> &[JobBoard] {
        &self.completed
    }

    pub fn current(&self) -> Option<JobBoard> {
        self.current
    }

    pub fn is_finished(&self, sources: &[JobBoard]) -> bool {
        self.current.is_none() && self.completed == sources
    }

    /// Drops the in-progress board without completing anything.
    pub fn abort(&mut self) {
        self.current = None;
    }

    pub fn apply(&mut self, step: &RevealStep) {
        match step {
            RevealStep::Scanning(board) => self.current = Some(*board),
            RevealStep::Batch { .. } => {}
            RevealStep::Scanned { board, next } => {
                self.completed.push(*board);
                self.current = *next;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealStep {
    Scanning(JobBoard),
    Batch { board: JobBoard, jobs: Vec<Job> },
    Scanned { board: JobBoard, next: Option<JobBoard> },
}

/// Splits `jobs` into `count` contiguous batches of `ceil(len / count)`
/// jobs. The last batch takes whatever remains, so nothing is dropped;
/// trailing batches may be empty.
pub fn partition(jobs: Vec<Job>, count: usize) -> Vec<Vec<Job>> {
    if count == 0 {
        return Vec::new();
    }
    let size = jobs.len().div_ceil(count);
    let mut rest = jobs.into_iter();
    let mut batches = Vec::with_capacity(count);
    for i in 0..count {
        if i + 1 == count {
            batches.push(rest.by_ref().collect());
        } else {
            batches.push(rest.by_ref().take(size).collect());
        }
    }
    batches
}

#[derive(Debug, Clone)]
pub struct RevealController {
    sources: Vec<JobBoard>,
    delay: Duration,
}

impl RevealController {
    pub fn new(sources: Vec<JobBoard>, delay: Duration) -> Self {
        Self { sources, delay }
    }

    pub fn sources(&self) -> &[JobBoard] {
        &self.sources
    }

    /// Releases `jobs` board by board through `emit`. Stops early when
    /// `emit` returns false (the consumer has gone away).
    pub async fn run<F>(&self, jobs: Vec<Job>, mut emit: F)
    where
        F: FnMut(RevealStep) -> bool,
    {
        let nothing_to_reveal = jobs.is_empty();
        let batches = partition(jobs, self.sources.len());

        for (i, (board, batch)) in self.sources.iter().zip(batches).enumerate() {
            let next = self.sources.get(i + 1).copied();
            if nothing_to_reveal {
                if !emit(RevealStep::Scanned { board: *board, next }) {
                    return;
                }
                continue;
            }

            if !emit(RevealStep::Scanning(*board)) {
                return;
            }
            tokio::time::sleep(self.delay).await;
            trace!("{} yielded {} job(s)", board, batch.len());
            if !emit(RevealStep::Batch { board: *board, jobs: batch }) {
                return;
            }
            if !emit(RevealStep::Scanned { board: *board, next }) {
                return;
            }
        }
    }
}

impl Default for RevealController {
    fn default() -> Self {
        Self::new(JobBoard::ALL.to_vec(), DEFAULT_REVEAL_DELAY)
    }
}
