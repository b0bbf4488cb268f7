//! The periodic task manager.
//!
//! Each registered job runs on its own tick. A job's next tick never
//! starts while the previous run is in flight (the run is awaited inline
//! and missed ticks are delayed, not burst), and every run is bounded by a
//! soft `max_run_time`. A single run's failure is the job's own business;
//! the schedule always continues.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A job the scheduler drives.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// One run. Errors are the job's to log; a failed run must not stop
    /// future ticks.
    async fn run(&self);
}

struct Registration {
    task: Arc<dyn PeriodicTask>,
    interval: Duration,
    max_run_time: Duration,
}

/// Drives registered jobs until stopped.
pub struct TaskManager {
    registrations: Mutex<Vec<Registration>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    /// A new, empty manager.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registrations: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Register a job. Takes effect at the next [`TaskManager::start`].
    pub fn register(
        &self,
        task: Arc<dyn PeriodicTask>,
        interval: Duration,
        max_run_time: Duration,
    ) {
        self.registrations.lock().push(Registration {
            task,
            interval,
            max_run_time,
        });
    }

    /// Spawn one driver loop per registered job.
    pub fn start(&self) {
        let registrations: Vec<Registration> = self.registrations.lock().drain(..).collect();
        let mut handles = self.handles.lock();

        for registration in registrations {
            let mut shutdown = self.shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                let name = registration.task.name().to_string();
                let mut ticker = tokio::time::interval(registration.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick of tokio's interval fires immediately;
                // consume it so jobs start one interval after startup.
                ticker.tick().await;

                info!(task = %name, interval = ?registration.interval, "Periodic task scheduled");
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            debug!(task = %name, "Periodic task stopping");
                            break;
                        }
                        _ = ticker.tick() => {
                            let run = registration.task.run();
                            if tokio::time::timeout(registration.max_run_time, run)
                                .await
                                .is_err()
                            {
                                warn!(task = %name, limit = ?registration.max_run_time, "Run exceeded max run time");
                            }
                        }
                    }
                }
            }));
        }
    }

    /// Stop all driver loops. In-flight runs are abandoned at their next
    /// suspension point.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
        info!("Task manager stopped");
    }
}
