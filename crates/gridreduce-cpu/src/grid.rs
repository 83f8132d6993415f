//! CPU grid launcher.
//!
//! Each resident worker thread stands for one streaming multiprocessor: it
//! pulls the next team index from a shared dispatch counter, materializes
//! that team's register file (one record per thread), and runs the team's
//! lanes in lock-step through [`TeamsReduction::reduce_team`]. Teams spin in
//! admission on the same device-wide counters a GPU grid would.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use gridreduce_core::coordinator::CoordinatorStats;
use gridreduce_core::error::{ReductionError, Result};
use gridreduce_core::ops::BufferOps;
use gridreduce_core::teams::TeamsReduction;
use gridreduce_core::types::TeamContext;

use crate::launch::LaunchConfig;

/// Sentinel for a worker that is between teams.
const NO_TEAM: u32 = u32::MAX;

/// A thread that reported holding the final value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultHolder<R> {
    /// Team of the holder.
    pub team_id: u32,
    /// Thread within the team.
    pub thread_id: u32,
    /// Value in the holder's register.
    pub value: R,
}

/// Outcome of one grid launch.
#[derive(Debug, Clone, Serialize)]
pub struct GridOutcome<R> {
    /// Teams executed.
    pub num_teams: u32,
    /// Threads per team.
    pub threads_per_team: u32,
    /// Every thread that got a set completion signal.
    pub holders: Vec<ResultHolder<R>>,
    /// Coordinator statistics after the launch (cumulative over the
    /// lifetime of the reduction state).
    pub stats: CoordinatorStats,
    /// Wall-clock time of the launch.
    pub elapsed: Duration,
}

impl<R> GridOutcome<R> {
    /// The single result holder.
    pub fn holder(&self) -> Result<&ResultHolder<R>> {
        match self.holders.len() {
            0 => Err(ReductionError::MissingResult),
            1 => Ok(&self.holders[0]),
            n => Err(ReductionError::MultipleResults(n)),
        }
    }

    /// The final value held by the single result holder.
    pub fn value(&self) -> Result<&R> {
        self.holder().map(|h| &h.value)
    }

    /// Consume the outcome, yielding the final value.
    pub fn into_value(mut self) -> Result<R> {
        self.holder()?;
        Ok(self.holders.swap_remove(0).value)
    }
}

/// Launcher metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GridMetrics {
    /// Grid launches started.
    pub launches: u64,
    /// Launches that ended in an error.
    pub failed_launches: u64,
    /// Teams executed to completion.
    pub teams_executed: u64,
}

#[derive(Debug, Default)]
struct GridMetricsInner {
    launches: AtomicU64,
    failed_launches: AtomicU64,
    teams_executed: AtomicU64,
}

/// Launches grids of teams on CPU worker threads.
#[derive(Debug, Clone)]
pub struct CpuGrid {
    config: LaunchConfig,
    metrics: Arc<GridMetricsInner>,
}

impl CpuGrid {
    /// Create a launcher for the given grid shape.
    pub fn new(config: LaunchConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(GridMetricsInner::default()),
        }
    }

    /// Launch configuration.
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Launcher metrics snapshot.
    pub fn metrics(&self) -> GridMetrics {
        GridMetrics {
            launches: self.metrics.launches.load(Ordering::Relaxed),
            failed_launches: self.metrics.failed_launches.load(Ordering::Relaxed),
            teams_executed: self.metrics.teams_executed.load(Ordering::Relaxed),
        }
    }

    /// Run every team of the grid against `reduction` and collect the
    /// result holders.
    ///
    /// `init(team_id, thread_id)` produces each thread's partial result.
    /// Blocks until all teams have finished or one of them failed. A failed
    /// team stops dispatch and cancels admission, so teams waiting on a chunk
    /// the failed team would have filled return instead of spinning. The
    /// first error wins. After a failure the counters are reset so the same
    /// reduction state can be launched again.
    pub fn launch<O, F>(&self, reduction: &TeamsReduction<O>, init: F) -> Result<GridOutcome<O::Record>>
    where
        O: BufferOps,
        F: Fn(u32, u32) -> O::Record + Sync,
    {
        let warp_size = reduction.config().warp_size;
        self.config.validate(warp_size)?;
        TeamContext::new(0, self.config.num_teams, self.config.threads_per_team, warp_size)
            .with_mode(self.config.mode)
            .validate()?;

        self.metrics.launches.fetch_add(1, Ordering::Relaxed);
        let workers = self.config.resident_teams();
        info!(
            "Launching grid (teams={}, threads={}, workers={}, mode={}, dispatch={:?})",
            self.config.num_teams,
            self.config.threads_per_team,
            workers,
            self.config.mode,
            self.config.dispatch
        );

        let started = Instant::now();
        let result = self.run_workers(reduction, &init, workers);
        let elapsed = started.elapsed();

        match result {
            Ok(holders) => {
                let outcome = GridOutcome {
                    num_teams: self.config.num_teams,
                    threads_per_team: self.config.threads_per_team,
                    holders,
                    stats: reduction.stats(),
                    elapsed,
                };
                info!(
                    "Grid finished in {:?} (holders={}, max_in_flight={})",
                    elapsed,
                    outcome.holders.len(),
                    outcome.stats.max_in_flight
                );
                Ok(outcome)
            }
            Err(e) => {
                self.metrics.failed_launches.fetch_add(1, Ordering::Relaxed);
                warn!("Grid launch failed after {:?}: {}", elapsed, e);
                reduction.coordinator().reset();
                Err(e)
            }
        }
    }

    /// Launch on the tokio blocking pool.
    pub async fn launch_async<O, F>(
        &self,
        reduction: Arc<TeamsReduction<O>>,
        init: F,
    ) -> Result<GridOutcome<O::Record>>
    where
        O: BufferOps + 'static,
        O::Record: 'static,
        O::Buffer: 'static,
        F: Fn(u32, u32) -> O::Record + Send + Sync + 'static,
    {
        let grid = self.clone();
        tokio::task::spawn_blocking(move || grid.launch(&reduction, init))
            .await
            .map_err(|e| ReductionError::BackendError(format!("grid task failed: {}", e)))?
    }

    fn run_workers<O, F>(
        &self,
        reduction: &TeamsReduction<O>,
        init: &F,
        workers: usize,
    ) -> Result<Vec<ResultHolder<O::Record>>>
    where
        O: BufferOps,
        F: Fn(u32, u32) -> O::Record + Sync,
    {
        let next_ticket = AtomicU32::new(0);
        let abort = AtomicBool::new(false);
        let current: Vec<AtomicU32> = (0..workers).map(|_| AtomicU32::new(NO_TEAM)).collect();
        let holders = Mutex::new(Vec::new());
        let failure: Mutex<Option<ReductionError>> = Mutex::new(None);
        let (next_ticket, abort, holders_ref, failure_ref) =
            (&next_ticket, &abort, &holders, &failure);
        let fail = move |err: ReductionError| {
            failure_ref.lock().get_or_insert(err);
            abort.store(true, Ordering::Release);
            reduction.coordinator().cancel();
        };

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for (worker, slot) in current.iter().enumerate() {
                let spawned = std::thread::Builder::new()
                    .name(format!("gridreduce-team-worker-{}", worker))
                    .spawn_scoped(scope, move || {
                        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                            self.worker_loop(reduction, init, next_ticket, abort, slot, holders_ref)
                        }));
                        let err = match outcome {
                            Ok(Ok(())) => return,
                            Ok(Err(e)) => e,
                            Err(_) => ReductionError::TeamPanicked {
                                team_id: slot.load(Ordering::Acquire),
                            },
                        };
                        fail(err);
                    });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        fail(ReductionError::BackendError(format!(
                            "failed to spawn team worker {}: {}",
                            worker, e
                        )));
                        break;
                    }
                }
            }

            for handle in handles {
                if handle.join().is_err() {
                    fail(ReductionError::BackendError(
                        "team worker terminated abnormally".to_string(),
                    ));
                }
            }
        });

        if let Some(err) = failure.into_inner() {
            return Err(err);
        }
        Ok(holders.into_inner())
    }

    fn worker_loop<O, F>(
        &self,
        reduction: &TeamsReduction<O>,
        init: &F,
        next_ticket: &AtomicU32,
        abort: &AtomicBool,
        current: &AtomicU32,
        holders: &Mutex<Vec<ResultHolder<O::Record>>>,
    ) -> Result<()>
    where
        O: BufferOps,
        F: Fn(u32, u32) -> O::Record + Sync,
    {
        let num_teams = self.config.num_teams;
        let threads = self.config.threads_per_team;
        let warp_size = reduction.config().warp_size;

        while !abort.load(Ordering::Acquire) {
            let ticket = next_ticket.fetch_add(1, Ordering::Relaxed);
            if ticket >= num_teams {
                break;
            }
            let team_id = self.config.dispatch.team_for(ticket, num_teams);
            current.store(team_id, Ordering::Release);

            let ctx = TeamContext::new(team_id, num_teams, threads, warp_size)
                .with_mode(self.config.mode);
            let mut lanes: Vec<O::Record> = (0..threads).map(|t| init(team_id, t)).collect();

            let mask = reduction.reduce_team(&ctx, &mut lanes)?;
            if mask.count() > 0 {
                let mut holders = holders.lock();
                for thread_id in mask.iter() {
                    debug!(team_id, thread_id, "thread holds the grid result");
                    holders.push(ResultHolder {
                        team_id,
                        thread_id: thread_id as u32,
                        value: lanes[thread_id].clone(),
                    });
                }
            }

            self.metrics.teams_executed.fetch_add(1, Ordering::Relaxed);
            current.store(NO_TEAM, Ordering::Release);
        }
        Ok(())
    }
}
