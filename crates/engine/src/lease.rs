//! Build leases: at-most-one concurrent build per (company, role)
//! fingerprint, with waiters subscribing to the winner's outcome.
//!
//! The table is process-local. A lease holder that stops refreshing is
//! reclaimed after the TTL, so a wedged build never blocks the fingerprint
//! forever.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::response::BuildOutcome;

pub type Fingerprint = (String, String);

const OUTCOME_CHANNEL_CAPACITY: usize = 16;

struct ActiveBuild {
    holder: String,
    expires_at: Instant,
    tx: broadcast::Sender<BuildOutcome>,
}

pub struct BuildLeases {
    ttl: Duration,
    active: DashMap<Fingerprint, ActiveBuild>,
}

pub enum Acquire {
    /// Caller owns the build. Complete it via [`LeaseGuard::complete`].
    Acquired(LeaseGuard),
    /// Another build is in flight; await its outcome.
    Held(broadcast::Receiver<BuildOutcome>),
}

impl BuildLeases {
    pub fn new(ttl_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            ttl: Duration::from_secs(ttl_secs),
            active: DashMap::new(),
        })
    }

    pub fn acquire(self: &Arc<Self>, fingerprint: Fingerprint, holder: &str) -> Acquire {
        let entry = self.active.entry(fingerprint.clone());
        match entry {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > Instant::now() {
                    debug!(
                        company = %fingerprint.0,
                        role = %fingerprint.1,
                        holder = %occupied.get().holder,
                        "build in progress; subscribing"
                    );
                    return Acquire::Held(occupied.get().tx.subscribe());
                }
                // Abandoned: the holder stopped refreshing. Oust it.
                warn!(
                    company = %fingerprint.0,
                    role = %fingerprint.1,
                    stale_holder = %occupied.get().holder,
                    "reclaiming abandoned build lease"
                );
                let (tx, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
                occupied.insert(ActiveBuild {
                    holder: holder.to_string(),
                    expires_at: Instant::now() + self.ttl,
                    tx: tx.clone(),
                });
                Acquire::Acquired(LeaseGuard {
                    leases: Arc::clone(self),
                    fingerprint,
                    holder: holder.to_string(),
                    tx,
                    completed: false,
                })
            }
            Entry::Vacant(vacant) => {
                let (tx, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
                vacant.insert(ActiveBuild {
                    holder: holder.to_string(),
                    expires_at: Instant::now() + self.ttl,
                    tx: tx.clone(),
                });
                Acquire::Acquired(LeaseGuard {
                    leases: Arc::clone(self),
                    fingerprint,
                    holder: holder.to_string(),
                    tx,
                    completed: false,
                })
            }
        }
    }

    /// Push the expiry forward; called by the holder's refresh task.
    pub fn refresh(&self, fingerprint: &Fingerprint) {
        if let Some(mut active) = self.active.get_mut(fingerprint) {
            active.expires_at = Instant::now() + self.ttl;
        }
    }

    /// Whether a live (unexpired) build holds the fingerprint.
    pub fn is_building(&self, fingerprint: &Fingerprint) -> bool {
        self.active
            .get(fingerprint)
            .is_some_and(|a| a.expires_at > Instant::now())
    }
}

/// Exclusive permission to build one fingerprint.
pub struct LeaseGuard {
    leases: Arc<BuildLeases>,
    fingerprint: Fingerprint,
    holder: String,
    tx: broadcast::Sender<BuildOutcome>,
    completed: bool,
}

impl LeaseGuard {
    /// A receiver for the holder itself, so the initiating caller awaits the
    /// same channel as every waiter.
    pub fn subscribe(&self) -> broadcast::Receiver<BuildOutcome> {
        self.tx.subscribe()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn refresh(&self) {
        self.leases.refresh(&self.fingerprint);
    }

    /// Publish the outcome to every waiter and release the lease.
    pub fn complete(mut self, outcome: BuildOutcome) {
        self.completed = true;
        self.release();
        // Zero receivers is fine: everyone may have detached.
        let _ = self.tx.send(outcome);
    }

    /// Remove the table entry only if this guard still holds it. A stale
    /// guard whose lease was reclaimed must not evict the new holder.
    fn release(&self) {
        self.leases
            .active
            .remove_if(&self.fingerprint, |_, active| active.holder == self.holder);
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> Fingerprint {
        ("c1".to_string(), "r1".to_string())
    }

    #[tokio::test]
    async fn second_acquire_subscribes_to_the_first() {
        let leases = BuildLeases::new(120);
        let Acquire::Acquired(guard) = leases.acquire(fp(), "h1") else {
            panic!("first acquire must win the lease");
        };
        let Acquire::Held(mut rx) = leases.acquire(fp(), "h2") else {
            panic!("second acquire must wait");
        };

        guard.complete(BuildOutcome::Failure {
            kind: crate::response::FailureKind::Deadline,
            reason: "deadline".to_string(),
            partial: vec![],
        });

        match rx.recv().await.unwrap() {
            BuildOutcome::Failure { reason, .. } => assert_eq!(reason, "deadline"),
            other => panic!("expected the published failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completing_releases_the_fingerprint() {
        let leases = BuildLeases::new(120);
        let Acquire::Acquired(guard) = leases.acquire(fp(), "h1") else {
            panic!("expected acquire");
        };
        assert!(leases.is_building(&fp()));
        guard.complete(BuildOutcome::Failure {
            kind: crate::response::FailureKind::Transient,
            reason: "store down".to_string(),
            partial: vec![],
        });
        assert!(!leases.is_building(&fp()));
        assert!(matches!(leases.acquire(fp(), "h2"), Acquire::Acquired(_)));
    }

    #[tokio::test]
    async fn dropped_guard_releases_without_publishing() {
        let leases = BuildLeases::new(120);
        let Acquire::Acquired(guard) = leases.acquire(fp(), "h1") else {
            panic!("expected acquire");
        };
        drop(guard);
        assert!(matches!(leases.acquire(fp(), "h2"), Acquire::Acquired(_)));
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed() {
        let leases = BuildLeases::new(0);
        let Acquire::Acquired(_guard) = leases.acquire(fp(), "h1") else {
            panic!("expected acquire");
        };
        // TTL zero: the lease is immediately considered abandoned.
        assert!(matches!(leases.acquire(fp(), "h2"), Acquire::Acquired(_)));
    }

    #[tokio::test]
    async fn stale_guard_cannot_evict_the_reclaiming_holder() {
        let leases = BuildLeases::new(0);
        let Acquire::Acquired(stale) = leases.acquire(fp(), "h1") else {
            panic!("expected acquire");
        };
        // TTL zero: h1 is instantly abandoned and h2 reclaims.
        let Acquire::Acquired(_fresh) = leases.acquire(fp(), "h2") else {
            panic!("expected reclaim");
        };
        drop(stale);
        assert!(
            leases.active.contains_key(&fp()),
            "dropping the ousted guard must not evict the new holder"
        );
    }

    #[tokio::test]
    async fn different_fingerprints_do_not_contend() {
        let leases = BuildLeases::new(120);
        let a = leases.acquire(("c1".into(), "r1".into()), "h1");
        let b = leases.acquire(("c1".into(), "r2".into()), "h1");
        assert!(matches!(a, Acquire::Acquired(_)));
        assert!(matches!(b, Acquire::Acquired(_)));
    }
}
