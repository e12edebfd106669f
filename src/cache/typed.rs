//! Typed read-through caches in front of the user and student profile lookups.

use std::sync::Arc;
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::ttl::TtlCache;
use crate::domain::{StudentProfile, User};

pub const DEFAULT_USER_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_STUDENT_PROFILE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Users keyed by platform user id.
pub struct UserCache {
    entries: TtlCache<String, User>,
    ttl: Duration,
}

impl UserCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: TtlCache::with_clock(clock),
            ttl,
        }
    }

    /// No-op for a user without a PSID.
    pub fn set(&self, user: &User) {
        if user.psid.is_empty() {
            return;
        }
        self.entries.set(user.psid.clone(), user.clone(), self.ttl);
    }

    pub fn get(&self, psid: &str) -> Option<User> {
        self.entries.get(psid)
    }

    pub fn invalidate(&self, psid: &str) {
        self.entries.delete(psid);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for UserCache {
    fn default() -> Self {
        Self::new(DEFAULT_USER_TTL)
    }
}

/// Student profiles keyed by `student_profile:{school_id}:{student_id}`.
pub struct StudentProfileCache {
    entries: TtlCache<String, StudentProfile>,
    ttl: Duration,
}

impl StudentProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: TtlCache::with_clock(clock),
            ttl,
        }
    }

    fn key(school_id: &str, student_id: &str) -> Option<String> {
        if school_id.is_empty() || student_id.is_empty() {
            return None;
        }
        Some(format!("student_profile:{school_id}:{student_id}"))
    }

    /// No-op when either identifier is empty.
    pub fn set(&self, school_id: &str, student_id: &str, profile: &StudentProfile) {
        if let Some(key) = Self::key(school_id, student_id) {
            self.entries.set(key, profile.clone(), self.ttl);
        }
    }

    pub fn get(&self, school_id: &str, student_id: &str) -> Option<StudentProfile> {
        Self::key(school_id, student_id).and_then(|key| self.entries.get(&key))
    }

    pub fn invalidate(&self, school_id: &str, student_id: &str) {
        if let Some(key) = Self::key(school_id, student_id) {
            self.entries.delete(&key);
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for StudentProfileCache {
    fn default() -> Self {
        Self::new(DEFAULT_STUDENT_PROFILE_TTL)
    }
}
