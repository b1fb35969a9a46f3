//! Bounded worker pool
//!
//! Runs a list of jobs with at most `size` in flight, via
//! `futures::stream::buffer_unordered`. Every job is attempted at most once
//! and its outcome is reported at its submission index, whatever order the
//! jobs finish in.
//!
//! Two instances are used per run: the document pool (continue on error) and
//! one chunk pool per document (fail fast).

use futures::stream::{self, StreamExt};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// What the pool does after a job fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop dispatching after the first failure; in-flight jobs still finish
    FailFast,
    /// Keep going; every job runs
    ContinueOnError,
}

/// Outcome of one submitted job
#[derive(Debug)]
pub enum JobOutcome<T, E> {
    Completed(T),
    Failed(E),
    /// Never started: cancelled, or dispatch stopped by fail-fast
    NotStarted,
}

impl<T, E> JobOutcome<T, E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

/// Why a pool run did not complete every job
#[derive(Debug)]
pub struct PoolShortfall<E> {
    /// Failed jobs by submission index, ascending
    pub failures: Vec<(usize, E)>,
    pub not_started: usize,
}

/// All outcomes of one pool run; `outcomes[i]` belongs to job `i`
#[derive(Debug)]
pub struct PoolReport<T, E> {
    pub outcomes: Vec<JobOutcome<T, E>>,
}

impl<T, E> PoolReport<T, E> {
    pub fn completed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, JobOutcome::Failed(_)))
            .count()
    }

    pub fn not_started_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, JobOutcome::NotStarted))
            .count()
    }

    /// Every job's value, or what went wrong
    pub fn into_completed(self) -> Result<Vec<T>, PoolShortfall<E>> {
        let mut values = Vec::with_capacity(self.outcomes.len());
        let mut failures = Vec::new();
        let mut not_started = 0;

        for (index, outcome) in self.outcomes.into_iter().enumerate() {
            match outcome {
                JobOutcome::Completed(value) => values.push(value),
                JobOutcome::Failed(error) => failures.push((index, error)),
                JobOutcome::NotStarted => not_started += 1,
            }
        }

        if failures.is_empty() && not_started == 0 {
            Ok(values)
        } else {
            Err(PoolShortfall {
                failures,
                not_started,
            })
        }
    }
}

/// Bounded-concurrency executor
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: String,
    size: usize,
    policy: FailurePolicy,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>, size: usize, policy: FailurePolicy) -> Self {
        Self {
            name: name.into(),
            size: size.max(1),
            policy,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `job` over every item and wait for all of them.
    ///
    /// `job` gets the submission index, the item and a token that fires when
    /// the run is cancelled or, under `FailFast`, when a sibling fails. A job
    /// whose turn comes after that point reports `NotStarted`.
    pub async fn run<I, T, E, F, Fut>(
        &self,
        items: Vec<I>,
        cancel: &CancellationToken,
        mut job: F,
    ) -> PoolReport<T, E>
    where
        F: FnMut(usize, I, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let total = items.len();
        let stop = cancel.child_token();
        let policy = self.policy;
        let pool_name = self.name.as_str();

        tracing::debug!(
            pool = pool_name,
            jobs = total,
            workers = self.size,
            policy = ?policy,
            "Dispatching jobs"
        );

        let mut finished: Vec<(usize, JobOutcome<T, E>)> =
            stream::iter(items.into_iter().enumerate())
                .map(|(index, item)| {
                    let stop = stop.clone();
                    // Futures are lazy; nothing runs until the pool polls it
                    let work = job(index, item, stop.clone());

                    async move {
                        if stop.is_cancelled() {
                            return (index, JobOutcome::NotStarted);
                        }

                        match work.await {
                            Ok(value) => (index, JobOutcome::Completed(value)),
                            Err(error) => {
                                if policy == FailurePolicy::FailFast && !stop.is_cancelled() {
                                    tracing::debug!(
                                        pool = pool_name,
                                        job = index,
                                        "Job failed, no further jobs will start"
                                    );
                                    stop.cancel();
                                }
                                (index, JobOutcome::Failed(error))
                            }
                        }
                    }
                })
                .buffer_unordered(self.size)
                .collect()
                .await;

        finished.sort_by_key(|(index, _)| *index);
        let report = PoolReport {
            outcomes: finished.into_iter().map(|(_, outcome)| outcome).collect(),
        };

        tracing::debug!(
            pool = pool_name,
            completed = report.completed_count(),
            failed = report.failed_count(),
            not_started = report.not_started_count(),
            "Pool run finished"
        );

        report
    }
}
