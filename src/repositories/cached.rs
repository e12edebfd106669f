//! Read-through cache decorators for user and student profile lookups.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::traits::{ProfileRepository, UserRepository};
use crate::cache::{StudentProfileCache, UserCache};
use crate::domain::{NewUser, StudentProfile, User};

pub struct CachedUserRepository {
    inner: Arc<dyn UserRepository>,
    cache: UserCache,
}

impl CachedUserRepository {
    pub fn new(inner: Arc<dyn UserRepository>, cache: UserCache) -> Self {
        Self { inner, cache }
    }

    /// Warm the cache with every active user. Returns how many were loaded.
    pub async fn preload(&self) -> Result<usize> {
        let users = self.inner.active_users().await?;
        for user in &users {
            self.cache.set(user);
        }
        tracing::info!(count = users.len(), "Preloaded active users into cache");
        Ok(users.len())
    }

    pub fn cache(&self) -> &UserCache {
        &self.cache
    }
}

#[async_trait]
impl UserRepository for CachedUserRepository {
    async fn find_by_psid(&self, psid: &str) -> Result<Option<User>> {
        if let Some(user) = self.cache.get(psid) {
            return Ok(Some(user));
        }
        let user = self.inner.find_by_psid(psid).await?;
        if let Some(ref user) = user {
            self.cache.set(user);
        }
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        let created = self.inner.create(user).await?;
        self.cache.set(&created);
        Ok(created)
    }

    async fn reactivate(&self, psid: &str) -> Result<Option<User>> {
        let user = self.inner.reactivate(psid).await?;
        match user {
            Some(ref user) => self.cache.set(user),
            None => self.cache.invalidate(psid),
        }
        Ok(user)
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        self.inner.code_exists(code).await
    }

    async fn active_users(&self) -> Result<Vec<User>> {
        self.inner.active_users().await
    }

    fn name(&self) -> &str {
        "cached"
    }
}

pub struct CachedProfileRepository {
    inner: Arc<dyn ProfileRepository>,
    cache: StudentProfileCache,
}

impl CachedProfileRepository {
    pub fn new(inner: Arc<dyn ProfileRepository>, cache: StudentProfileCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &StudentProfileCache {
        &self.cache
    }
}

#[async_trait]
impl ProfileRepository for CachedProfileRepository {
    async fn student_profile(
        &self,
        school_id: &str,
        student_id: &str,
    ) -> Result<Option<StudentProfile>> {
        if let Some(profile) = self.cache.get(school_id, student_id) {
            return Ok(Some(profile));
        }
        let profile = self.inner.student_profile(school_id, student_id).await?;
        if let Some(ref profile) = profile {
            self.cache.set(school_id, student_id, profile);
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::domain::School;
    use crate::repositories::{Dataset, InMemoryBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingProfiles {
        inner: InMemoryBackend,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProfileRepository for CountingProfiles {
        async fn student_profile(
            &self,
            school_id: &str,
            student_id: &str,
        ) -> Result<Option<StudentProfile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.student_profile(school_id, student_id).await
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            users: vec![User {
                id: 1,
                psid: "p1".into(),
                fb_name: "Ana".into(),
                code: Some("SA-AAAAAA".into()),
                is_active: true,
                last_login_at: None,
            }],
            students: vec![StudentProfile {
                student_id: "s1".into(),
                borrower_id: "B1".into(),
                first_name: "Ana".into(),
                last_name: "Cruz".into(),
                course: "BSIT".into(),
                year_level: "2".into(),
                mobile_number: String::new(),
                school: School {
                    school_id: "cpeu".into(),
                    school_name: "CPEU".into(),
                },
            }],
            ..Dataset::default()
        }
    }

    #[tokio::test]
    async fn preload_fills_user_cache() {
        let backend = Arc::new(InMemoryBackend::from_dataset(dataset()));
        let repo = CachedUserRepository::new(backend, UserCache::default());

        assert_eq!(repo.preload().await.unwrap(), 1);
        assert!(repo.cache().get("p1").is_some());
    }

    #[tokio::test]
    async fn user_lookups_populate_cache_and_misses_do_not() {
        let backend = Arc::new(InMemoryBackend::from_dataset(dataset()));
        let repo = CachedUserRepository::new(backend, UserCache::default());

        assert!(repo.find_by_psid("p1").await.unwrap().is_some());
        assert_eq!(repo.cache().len(), 1);
        assert!(repo.find_by_psid("ghost").await.unwrap().is_none());
        assert_eq!(repo.cache().len(), 1);
    }

    #[tokio::test]
    async fn profile_lookups_hit_backend_once_until_expiry() {
        let clock = Arc::new(ManualClock::default());
        let counting = Arc::new(CountingProfiles {
            inner: InMemoryBackend::from_dataset(dataset()),
            calls: AtomicUsize::new(0),
        });
        let repo = CachedProfileRepository::new(
            counting.clone(),
            StudentProfileCache::with_clock(Duration::from_secs(60), clock.clone()),
        );

        for _ in 0..3 {
            assert!(repo.student_profile("cpeu", "s1").await.unwrap().is_some());
        }
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(61));
        repo.student_profile("cpeu", "s1").await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }
}
