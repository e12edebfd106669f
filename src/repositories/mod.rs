//! Data access: repository traits, the in-memory fixture backend and cache decorators.

pub mod cached;
pub mod in_memory;
pub mod traits;

pub use cached::{CachedProfileRepository, CachedUserRepository};
pub use in_memory::{Dataset, InMemoryBackend};
pub use traits::{
    AttendanceRepository, BulletinRepository, GradeRepository, LinkRepository,
    PayableRepository, PaymentLogRepository, Period, ProfileRepository, SupportRepository,
    UserRepository,
};

use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{StudentProfileCache, UserCache};
use crate::config::Config;
use crate::domain::LinkedProfile;

/// Every repository the conversation handlers read from.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub links: Arc<dyn LinkRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub grades: Arc<dyn GradeRepository>,
    pub bulletins: Arc<dyn BulletinRepository>,
    pub attendance: Arc<dyn AttendanceRepository>,
    pub payables: Arc<dyn PayableRepository>,
    pub payment_logs: Arc<dyn PaymentLogRepository>,
    pub support: Arc<dyn SupportRepository>,
}

impl Repositories {
    /// Serve every repository straight from one backend.
    pub fn from_backend(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            users: backend.clone(),
            links: backend.clone(),
            profiles: backend.clone(),
            grades: backend.clone(),
            bulletins: backend.clone(),
            attendance: backend.clone(),
            payables: backend.clone(),
            payment_logs: backend.clone(),
            support: backend,
        }
    }

    /// Active links joined with their student profiles.
    pub async fn linked_profiles(&self, user_id: i64) -> Result<Vec<LinkedProfile>> {
        let links = self.links.links(user_id).await?;
        let mut joined = Vec::with_capacity(links.len());
        for link in links {
            let student = self
                .profiles
                .student_profile(&link.school_id, &link.student_id)
                .await?;
            joined.push(LinkedProfile { link, student });
        }
        Ok(joined)
    }

    /// The primary link with its student profile, if a primary link is set.
    pub async fn primary_profile(&self, user_id: i64) -> Result<Option<LinkedProfile>> {
        let Some(link) = self.links.primary_link(user_id).await? else {
            return Ok(None);
        };
        let student = self
            .profiles
            .student_profile(&link.school_id, &link.student_id)
            .await?;
        Ok(Some(LinkedProfile { link, student }))
    }
}

/// Build the repository bundle described by the config: fixture backend plus caches.
pub async fn create_repositories(config: &Config) -> Result<Repositories> {
    let dataset = match config.data.resolved_fixture_path() {
        Some(path) => {
            if !path.exists() {
                bail!("Dataset fixture not found: {}", path.display());
            }
            let dataset = Dataset::load(&path).await?;
            tracing::info!(
                path = %path.display(),
                users = dataset.users.len(),
                students = dataset.students.len(),
                "Dataset loaded"
            );
            dataset
        }
        None => {
            tracing::warn!("No dataset fixture configured; starting with an empty backend");
            Dataset::default()
        }
    };

    let backend = Arc::new(InMemoryBackend::from_dataset(dataset));
    let mut repos = Repositories::from_backend(backend.clone());

    let users = Arc::new(CachedUserRepository::new(
        backend.clone(),
        UserCache::new(Duration::from_secs(config.cache.user_ttl_secs)),
    ));
    if config.cache.preload_active_users {
        users.preload().await?;
    }
    repos.users = users;
    repos.profiles = Arc::new(CachedProfileRepository::new(
        backend,
        StudentProfileCache::new(Duration::from_secs(config.cache.student_profile_ttl_secs)),
    ));

    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{School, StudentProfile, UserLink};

    fn student(id: &str) -> StudentProfile {
        StudentProfile {
            student_id: id.into(),
            borrower_id: format!("B-{id}"),
            first_name: "Ana".into(),
            last_name: "Cruz".into(),
            course: "BSIT".into(),
            year_level: "2".into(),
            mobile_number: String::new(),
            school: School {
                school_id: "cpeu".into(),
                school_name: "CPEU".into(),
            },
        }
    }

    #[tokio::test]
    async fn joins_links_with_profiles() {
        let backend = Arc::new(InMemoryBackend::from_dataset(Dataset {
            links: vec![
                UserLink {
                    user_id: 1,
                    student_id: "s1".into(),
                    school_id: "cpeu".into(),
                    is_primary: true,
                    is_active: true,
                },
                UserLink {
                    user_id: 1,
                    student_id: "missing".into(),
                    school_id: "cpeu".into(),
                    is_primary: false,
                    is_active: true,
                },
            ],
            students: vec![student("s1")],
            ..Dataset::default()
        }));
        let repos = Repositories::from_backend(backend);

        let linked = repos.linked_profiles(1).await.unwrap();
        assert_eq!(linked.len(), 2);
        assert!(linked[0].student.is_some());
        assert!(linked[1].student.is_none());

        let primary = repos.primary_profile(1).await.unwrap().unwrap();
        assert_eq!(primary.link.student_id, "s1");
        assert!(repos.primary_profile(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_config_builds_cached_bundle() {
        let mut config = Config::default();
        config.data.fixture_path = None;
        let repos = create_repositories(&config).await.unwrap();
        assert_eq!(repos.users.name(), "cached");
        assert!(repos.users.find_by_psid("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_fixture_is_an_error() {
        let mut config = Config::default();
        config.data.fixture_path = Some("/definitely/not/here.json".into());
        assert!(create_repositories(&config).await.is_err());
    }
}
