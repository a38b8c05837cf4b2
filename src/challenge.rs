use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Which flow a pending code belongs to. A code issued for one purpose
/// cannot redeem the other, even for the same email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Register,
    Login,
}

/// Profile fields held back until the registration code is redeemed.
/// Nothing is written to the database before that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub full_name: String,
    pub dob: String,
    pub email: String,
}

/// An outstanding verification: the code that was sent, when it stops
/// being valid, which flow it belongs to, and (for registration) the
/// deferred profile fields.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub purpose: Purpose,
    pub payload: Option<NewAccount>,
}

/// Keyed storage for outstanding challenges, one per email. `put` for
/// an existing key replaces the previous record, which is how a fresh
/// code request invalidates the one before it.
///
/// Implement this to back the workflow with something other than
/// process memory (e.g. a TTL-capable external store).
pub trait ChallengeStore: Send + Sync {
    fn put(&self, email: String, challenge: Challenge);
    fn get(&self, email: &str) -> Option<Challenge>;
    fn remove(&self, email: &str) -> Option<Challenge>;
}

/// In-process store. Starts empty, dies with the process. Cloning
/// shares the underlying map.
///
/// Entries are never swept: an abandoned challenge sits here until the
/// same email requests again or the process exits. Memory therefore
/// grows with the number of distinct emails that request a code and
/// never redeem it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChallengeStore {
    records: Arc<RwLock<HashMap<String, Challenge>>>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding challenges.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

impl ChallengeStore for InMemoryChallengeStore {
    fn put(&self, email: String, challenge: Challenge) {
        self.records.write().unwrap().insert(email, challenge);
    }

    fn get(&self, email: &str) -> Option<Challenge> {
        self.records.read().unwrap().get(email).cloned()
    }

    fn remove(&self, email: &str) -> Option<Challenge> {
        self.records.write().unwrap().remove(email)
    }
}
