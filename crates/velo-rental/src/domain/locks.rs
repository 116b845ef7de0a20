//! In-process exclusive locks keyed by user and bike id

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::types::{BikeId, UserId};

/// One async mutex per key, created on first use.
///
/// Entries are never evicted; the map grows with the number of distinct
/// users and bikes seen by this process.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.lock_owned().await
    }
}

/// Guards held across one lifecycle operation
#[derive(Debug)]
pub struct LifecycleGuard {
    _user: Option<OwnedMutexGuard<()>>,
    _bike: Option<OwnedMutexGuard<()>>,
}

/// Lock tables shared by the lifecycle manager and the fleet manager.
///
/// Acquisition order is always user before bike.
#[derive(Debug, Default)]
pub struct LifecycleLocks {
    users: KeyedLocks<UserId>,
    bikes: KeyedLocks<BikeId>,
}

impl LifecycleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_then_bike(&self, user_id: UserId, bike_id: BikeId) -> LifecycleGuard {
        let user = self.users.lock(&user_id).await;
        let bike = self.bikes.lock(&bike_id).await;
        LifecycleGuard {
            _user: Some(user),
            _bike: Some(bike),
        }
    }

    pub async fn user(&self, user_id: UserId) -> LifecycleGuard {
        LifecycleGuard {
            _user: Some(self.users.lock(&user_id).await),
            _bike: None,
        }
    }

    pub async fn bike(&self, bike_id: BikeId) -> LifecycleGuard {
        LifecycleGuard {
            _user: None,
            _bike: Some(self.bikes.lock(&bike_id).await),
        }
    }

    /// Take the bike lock while already holding a user-only guard.
    pub async fn extend_with_bike(&self, guard: LifecycleGuard, bike_id: BikeId) -> LifecycleGuard {
        LifecycleGuard {
            _user: guard._user,
            _bike: Some(self.bikes.lock(&bike_id).await),
        }
    }
}
