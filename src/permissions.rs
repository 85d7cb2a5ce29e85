//! Propagation of tier- and role-derived permission nodes to an external
//! authorization service.
//!
//! In synchronous mode every node is applied on the caller's thread, in list
//! order. In asynchronous mode jobs are handed to a bounded pool of tokio
//! workers and the caller returns immediately; a job that does not fit in the
//! queue is spawned as its own task. Nothing reports back when a job finishes
//! or fails.

use std::sync::Arc;

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::config::PermissionSettings;

/// External authorization collaborator.
pub trait PermissionService: Send + Sync {
    fn grant(&self, subject: Uuid, node: &str) -> anyhow::Result<()>;
    fn revoke(&self, subject: Uuid, node: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationMode {
    Sync,
    Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Grant,
    Revoke,
}

#[derive(Debug)]
struct PermissionJob {
    action: Action,
    subject: Uuid,
    nodes: Vec<String>,
}

impl PermissionJob {
    fn apply(&self, service: &dyn PermissionService) {
        for node in self.nodes.iter().filter(|n| !n.is_empty()) {
            let result = match self.action {
                Action::Grant => service.grant(self.subject, node),
                Action::Revoke => service.revoke(self.subject, node),
            };
            if let Err(e) = result {
                warn!(
                    "Permission {:?} of '{}' for {} failed: {}",
                    self.action, node, self.subject, e
                );
            }
        }
    }
}

struct WorkerPool {
    queue: mpsc::Sender<PermissionJob>,
    handle: Handle,
}

pub struct PermissionPropagator {
    service: Arc<dyn PermissionService>,
    pool: Option<WorkerPool>,
}

impl PermissionPropagator {
    /// Propagator that applies every job on the calling thread.
    pub fn synchronous(service: Arc<dyn PermissionService>) -> Self {
        Self {
            service,
            pool: None,
        }
    }

    /// Build from settings. Async mode needs a running tokio runtime; without
    /// one the propagator falls back to synchronous mode.
    pub fn from_settings(service: Arc<dyn PermissionService>, settings: &PermissionSettings) -> Self {
        if !settings.run_async {
            return Self::synchronous(service);
        }
        match Handle::try_current() {
            Ok(handle) => Self::spawn_pool(
                handle,
                service,
                settings.workers.max(1),
                settings.queue_capacity.max(1),
            ),
            Err(_) => {
                warn!("Async permission propagation requested without a tokio runtime; running synchronously");
                Self::synchronous(service)
            }
        }
    }

    fn spawn_pool(
        handle: Handle,
        service: Arc<dyn PermissionService>,
        workers: usize,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<PermissionJob>(capacity);
        let rx = Arc::new(Mutex::new(rx));
        for worker in 0..workers {
            let rx = Arc::clone(&rx);
            let service = Arc::clone(&service);
            handle.spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(job) = next else {
                        debug!("Permission worker {} stopping", worker);
                        break;
                    };
                    job.apply(service.as_ref());
                }
            });
        }
        debug!("Started {} permission workers (queue {})", workers, capacity);
        Self {
            service,
            pool: Some(WorkerPool { queue: tx, handle }),
        }
    }

    pub fn mode(&self) -> PropagationMode {
        if self.pool.is_some() {
            PropagationMode::Async
        } else {
            PropagationMode::Sync
        }
    }

    fn dispatch(&self, job: PermissionJob) {
        let Some(pool) = &self.pool else {
            job.apply(self.service.as_ref());
            return;
        };
        let job = match pool.queue.try_send(job) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(job)) => {
                debug!("Permission queue full; spawning job for {}", job.subject);
                job
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!("Permission workers gone; spawning job for {}", job.subject);
                job
            }
        };
        let service = Arc::clone(&self.service);
        pool.handle.spawn(async move {
            job.apply(service.as_ref());
        });
    }

    /// Grant every non-empty node in `nodes` to `subject`.
    pub fn grant(&self, subject: Uuid, nodes: &[String]) {
        if nodes.is_empty() {
            return;
        }
        self.dispatch(PermissionJob {
            action: Action::Grant,
            subject,
            nodes: nodes.to_vec(),
        });
    }

    /// Revoke every non-empty node in `nodes` from `subject`.
    pub fn revoke(&self, subject: Uuid, nodes: &[String]) {
        if nodes.is_empty() {
            return;
        }
        self.dispatch(PermissionJob {
            action: Action::Revoke,
            subject,
            nodes: nodes.to_vec(),
        });
    }

    /// Grant the same node set to every subject. Empty node sets skip the loop.
    pub fn grant_to_all(&self, subjects: &[Uuid], nodes: &[String]) {
        if nodes.is_empty() {
            return;
        }
        for subject in subjects {
            self.grant(*subject, nodes);
        }
    }

    pub fn revoke_from_all(&self, subjects: &[Uuid], nodes: &[String]) {
        if nodes.is_empty() {
            return;
        }
        for subject in subjects {
            self.revoke(*subject, nodes);
        }
    }
}
