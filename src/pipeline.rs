//! Synergy analysis and priority scoring.
//!
//! Flow for both: membership gate, project snapshot, prompt, gateway call,
//! response validation. Priority scoring then writes the accepted scores back
//! in a single transaction. Scoring runs for the same project are serialized
//! so two batches never interleave their writes.

use crate::board::Board;
use crate::context::{NO_ACTIVE_TASKS_MESSAGE, NO_TASKS_MESSAGE, ScoringContext, SynergyContext};
use crate::error::{BoardError, BoardResult};
use crate::db::tasks::{PriorityMiss, PriorityWrite};
use crate::gateway::SharedGateway;
use crate::prompts::{PromptKind, priority_prompt, synergy_prompt};
use crate::types::{PriorityUpdate, ProjectId, UserId};
use crate::validate::{RejectReason, RejectedScore, validate_priority_response, validate_synergy};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

/// Message returned after a scoring run.
pub const PRIORITIES_CALCULATED: &str = "Priorities calculated!";

/// Synergy analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynergyReport {
    pub analysis: String,
    /// False when the canned empty-project text was returned.
    #[serde(skip)]
    pub from_gateway: bool,
}

/// Priority scoring result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityReport {
    pub message: String,
    /// Updates written to the store.
    pub priorities: Vec<PriorityUpdate>,
    /// Scores that were screened out, with reasons.
    pub rejected: Vec<RejectedScore>,
    pub rejected_count: usize,
}

impl PriorityReport {
    fn nothing_to_do() -> Self {
        Self {
            message: NO_ACTIVE_TASKS_MESSAGE.to_string(),
            priorities: Vec::new(),
            rejected: Vec::new(),
            rejected_count: 0,
        }
    }
}

/// One async mutex per project. Entries live only while a run holds or
/// waits on them.
#[derive(Default)]
struct ScoringLocks {
    inner: Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>,
}

impl ScoringLocks {
    async fn acquire(self: &Arc<Self>, project_id: ProjectId) -> ScoringGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap();
            Arc::clone(map.entry(project_id).or_default())
        };
        let guard = lock.lock_owned().await;
        ScoringGuard {
            locks: Arc::clone(self),
            project_id,
            guard: Some(guard),
        }
    }

    /// Drop the project's entry once nobody else references it.
    fn release(&self, project_id: ProjectId) {
        let mut map = self.inner.lock().unwrap();
        if map
            .get(&project_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&project_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Held for the duration of one scoring run.
struct ScoringGuard {
    locks: Arc<ScoringLocks>,
    project_id: ProjectId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ScoringGuard {
    fn drop(&mut self) {
        // The owned guard holds an Arc to the mutex; release it first.
        drop(self.guard.take());
        self.locks.release(self.project_id);
    }
}

/// Store misses become rejections alongside the screening ones.
fn store_rejections(write: &PriorityWrite) -> impl Iterator<Item = RejectedScore> + '_ {
    write.skipped.iter().map(|(update, miss)| RejectedScore {
        task_id: update.task_id,
        priority: i64::from(update.priority),
        reason: match miss {
            PriorityMiss::NotInProject => RejectReason::UnknownTask,
            PriorityMiss::Done => RejectReason::InactiveTask,
        },
    })
}

/// Runs gateway-backed analysis for project members.
#[derive(Clone)]
pub struct Pipeline {
    board: Board,
    gateway: SharedGateway,
    timeout: Duration,
    locks: Arc<ScoringLocks>,
}

impl Pipeline {
    pub fn new(board: Board, gateway: SharedGateway, timeout: Duration) -> Self {
        Self {
            board,
            gateway,
            timeout,
            locks: Arc::new(ScoringLocks::default()),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn gateway_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Single gateway attempt bounded by the configured timeout.
    async fn call_gateway(&self, kind: PromptKind, prompt: &str) -> BoardResult<String> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| BoardError::gateway_unavailable("AI model is not configured."))?;

        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, gateway.analyze(kind, prompt)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(text)) => {
                info!(gateway = gateway.name(), kind = kind.as_str(), duration_ms = elapsed_ms, "Gateway call succeeded");
                Ok(text)
            }
            Ok(Err(e)) => {
                warn!(gateway = gateway.name(), kind = kind.as_str(), error = %e, duration_ms = elapsed_ms, "Gateway call failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(gateway = gateway.name(), kind = kind.as_str(), duration_ms = elapsed_ms, "Gateway call timed out");
                Err(BoardError::gateway_unavailable(format!(
                    "Gateway did not answer within {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }

    /// Review workload, bottlenecks, priorities and skill mismatches.
    pub async fn synergy(&self, actor: UserId, project_id: ProjectId) -> BoardResult<SynergyReport> {
        let project = self.board.require_member(actor, project_id)?;
        let tasks = self.board.db().list_project_tasks(project_id)?;

        let Some(ctx) = SynergyContext::build(&project, &tasks) else {
            info!(project_id, "No tasks to analyze; skipping gateway");
            return Ok(SynergyReport {
                analysis: NO_TASKS_MESSAGE.to_string(),
                from_gateway: false,
            });
        };

        let raw = self.call_gateway(PromptKind::Synergy, &synergy_prompt(&ctx)).await?;
        let analysis = validate_synergy(&raw)?;

        Ok(SynergyReport {
            analysis,
            from_gateway: true,
        })
    }

    /// Score every active task and write the accepted scores back.
    ///
    /// A response that fails validation writes nothing. Individual scores
    /// for unknown, `Done`, duplicate or out-of-range tasks are rejected and
    /// reported while the rest of the batch is applied. Tasks deleted or
    /// finished while the gateway was thinking are rejected the same way.
    pub async fn prioritize(&self, actor: UserId, project_id: ProjectId) -> BoardResult<PriorityReport> {
        let project = self.board.require_member(actor, project_id)?;

        let _guard = self.locks.acquire(project_id).await;

        let tasks = self.board.db().list_project_tasks(project_id)?;
        let Some(ctx) = ScoringContext::build(&project, &tasks) else {
            info!(project_id, "No active tasks to prioritize; skipping gateway");
            return Ok(PriorityReport::nothing_to_do());
        };

        let raw = self.call_gateway(PromptKind::Priority, &priority_prompt(&ctx)).await?;

        let mut batch = validate_priority_response(&raw, &ctx).map_err(|e| {
            warn!(project_id, error = %e, "Discarding gateway priority response");
            BoardError::from(e)
        })?;

        let write = if batch.accepted.is_empty() {
            PriorityWrite::default()
        } else {
            self.board
                .db()
                .apply_priorities(project_id, &batch.accepted)
                .map_err(|e| {
                    warn!(project_id, error = %e, "Priority batch rolled back");
                    BoardError::update_failed(e)
                })?
        };

        if !write.skipped.is_empty() {
            warn!(
                project_id,
                skipped = write.skipped.len(),
                "Tasks changed while scoring; scores skipped"
            );
            batch.rejected.extend(store_rejections(&write));
        }
        let applied = write.applied;

        if !batch.rejected.is_empty() {
            warn!(
                project_id,
                rejected = batch.rejected.len(),
                "Gateway scores rejected during screening"
            );
        }
        info!(project_id, applied = applied.len(), "Priorities applied");

        Ok(PriorityReport {
            message: PRIORITIES_CALCULATED.to_string(),
            priorities: applied,
            rejected_count: batch.rejected.len(),
            rejected: batch.rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_project_locks_are_dropped() {
        let locks = Arc::new(ScoringLocks::default());

        let guard = locks.acquire(1).await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert_eq!(locks.len(), 0);

        for project_id in 0..50 {
            drop(locks.acquire(project_id).await);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn waiting_run_keeps_the_lock_entry() {
        let locks = Arc::new(ScoringLocks::default());
        let first = locks.acquire(7).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _second = locks.acquire(7).await;
            })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }
}
