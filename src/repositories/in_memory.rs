//! In-memory backend seeded from a JSON dataset.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::traits::{
    AttendanceRepository, BulletinRepository, GradeRepository, LinkRepository,
    PayableRepository, PaymentLogRepository, Period, ProfileRepository, SupportRepository,
    UserRepository,
};
use crate::domain::{
    AttendanceRecord, Bulletin, NewSupportThread, NewUser, PaymentLog, StudentPayable,
    StudentProfile, SubjectGrade, SupportMessage, SupportThread, ThreadStatus, User, UserLink,
};

/// Every record the backend serves. Missing sections default to empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub links: Vec<UserLink>,
    pub students: Vec<StudentProfile>,
    pub grades: Vec<SubjectGrade>,
    pub bulletins: Vec<Bulletin>,
    pub attendance: Vec<AttendanceRecord>,
    pub payables: Vec<StudentPayable>,
    pub payment_logs: Vec<PaymentLog>,
    pub threads: Vec<SupportThread>,
    pub messages: Vec<SupportMessage>,
}

impl Dataset {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))
    }
}

/// One lock around the whole dataset; every repository trait reads through it.
pub struct InMemoryBackend {
    data: RwLock<Dataset>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::from_dataset(Dataset::default())
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            data: RwLock::new(dataset),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Dataset {
        self.data.read().clone()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn same_id(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

#[async_trait]
impl UserRepository for InMemoryBackend {
    async fn find_by_psid(&self, psid: &str) -> Result<Option<User>> {
        Ok(self.data.read().users.iter().find(|u| u.psid == psid).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        let mut data = self.data.write();
        if data.users.iter().any(|u| u.psid == user.psid) {
            bail!("user {} already exists", user.psid);
        }
        let id = data.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let created = User {
            id,
            psid: user.psid,
            fb_name: user.fb_name,
            code: Some(user.code),
            is_active: true,
            last_login_at: Some(Utc::now()),
        };
        data.users.push(created.clone());
        Ok(created)
    }

    async fn reactivate(&self, psid: &str) -> Result<Option<User>> {
        let mut data = self.data.write();
        Ok(data.users.iter_mut().find(|u| u.psid == psid).map(|u| {
            u.is_active = true;
            u.last_login_at = Some(Utc::now());
            u.clone()
        }))
    }

    async fn code_exists(&self, code: &str) -> Result<bool> {
        Ok(self
            .data
            .read()
            .users
            .iter()
            .any(|u| u.code.as_deref() == Some(code)))
    }

    async fn active_users(&self) -> Result<Vec<User>> {
        Ok(self
            .data
            .read()
            .users
            .iter()
            .filter(|u| u.is_active)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

#[async_trait]
impl LinkRepository for InMemoryBackend {
    async fn links(&self, user_id: i64) -> Result<Vec<UserLink>> {
        Ok(self
            .data
            .read()
            .links
            .iter()
            .filter(|l| l.user_id == user_id && l.is_active)
            .cloned()
            .collect())
    }

    async fn primary_link(&self, user_id: i64) -> Result<Option<UserLink>> {
        Ok(self
            .data
            .read()
            .links
            .iter()
            .find(|l| l.user_id == user_id && l.is_active && l.is_primary)
            .cloned())
    }

    async fn set_primary(&self, user_id: i64, student_id: &str, school_id: &str) -> Result<()> {
        let mut data = self.data.write();
        let exists = data.links.iter().any(|l| {
            l.user_id == user_id
                && l.is_active
                && l.student_id == student_id
                && l.school_id == school_id
        });
        if !exists {
            bail!("no active link for user {user_id} to {school_id}/{student_id}");
        }
        for link in data.links.iter_mut().filter(|l| l.user_id == user_id) {
            link.is_primary = link.student_id == student_id && link.school_id == school_id;
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn student_profile(
        &self,
        school_id: &str,
        student_id: &str,
    ) -> Result<Option<StudentProfile>> {
        Ok(self
            .data
            .read()
            .students
            .iter()
            .find(|s| s.student_id == student_id && s.school.school_id == school_id)
            .cloned())
    }
}

#[async_trait]
impl GradeRepository for InMemoryBackend {
    async fn grades(&self, school_id: &str, student_id: &str) -> Result<Vec<SubjectGrade>> {
        let mut grades: Vec<SubjectGrade> = self
            .data
            .read()
            .grades
            .iter()
            .filter(|g| g.school_id == school_id && g.student_id == student_id)
            .cloned()
            .collect();
        grades.sort_by(|a, b| {
            a.semester
                .cmp(&b.semester)
                .then_with(|| a.subject_description.cmp(&b.subject_description))
        });
        Ok(grades)
    }

    async fn grades_by_year(
        &self,
        school_id: &str,
        student_id: &str,
        school_year: &str,
    ) -> Result<Vec<SubjectGrade>> {
        let mut grades: Vec<SubjectGrade> = self
            .data
            .read()
            .grades
            .iter()
            .filter(|g| {
                g.school_id == school_id
                    && g.student_id == student_id
                    && g.school_year == school_year
            })
            .cloned()
            .collect();
        grades.sort_by(|a, b| a.subject_description.cmp(&b.subject_description));
        Ok(grades)
    }
}

impl InMemoryBackend {
    fn active_bulletins(&self, school_id: &str) -> Result<Vec<Bulletin>> {
        if school_id.is_empty() {
            bail!("school ID is required");
        }
        let mut bulletins: Vec<Bulletin> = self
            .data
            .read()
            .bulletins
            .iter()
            .filter(|b| b.school_id == school_id)
            .cloned()
            .collect();
        bulletins.sort_by(|a, b| b.period_start.cmp(&a.period_start));
        Ok(bulletins)
    }

    fn attendance_in(
        &self,
        school_id: &str,
        student_id: &str,
        period: Period,
    ) -> Result<Vec<AttendanceRecord>> {
        if school_id.is_empty() || student_id.is_empty() {
            bail!("school ID and student ID are required");
        }
        let mut records: Vec<AttendanceRecord> = self
            .data
            .read()
            .attendance
            .iter()
            .filter(|r| {
                r.school_id == school_id
                    && r.student_id == student_id
                    && period.contains(r.recorded_at)
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(records)
    }
}

#[async_trait]
impl BulletinRepository for InMemoryBackend {
    async fn active_count(&self, school_id: &str) -> Result<usize> {
        Ok(self.active_bulletins(school_id)?.len())
    }

    async fn active_page(
        &self,
        school_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Bulletin>> {
        Ok(self
            .active_bulletins(school_id)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl AttendanceRepository for InMemoryBackend {
    async fn count(&self, school_id: &str, student_id: &str, period: Period) -> Result<usize> {
        Ok(self.attendance_in(school_id, student_id, period)?.len())
    }

    async fn page(
        &self,
        school_id: &str,
        student_id: &str,
        period: Period,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .attendance_in(school_id, student_id, period)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl PayableRepository for InMemoryBackend {
    async fn active_payables(
        &self,
        school_id: &str,
        student_id: &str,
    ) -> Result<Vec<StudentPayable>> {
        Ok(self
            .data
            .read()
            .payables
            .iter()
            .filter(|p| p.school_id == school_id && p.student_id == student_id && p.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentLogRepository for InMemoryBackend {
    async fn payment_logs(
        &self,
        school_id: &str,
        student_id: &str,
        period: Period,
    ) -> Result<Vec<PaymentLog>> {
        if student_id.is_empty() {
            bail!("student ID cannot be empty");
        }
        let mut logs: Vec<PaymentLog> = self
            .data
            .read()
            .payment_logs
            .iter()
            .filter(|l| {
                l.school_id == school_id && l.student_id == student_id && period.contains(l.paid_at)
            })
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(logs)
    }
}

#[async_trait]
impl SupportRepository for InMemoryBackend {
    async fn create_thread(
        &self,
        school_id: &str,
        thread: NewSupportThread,
    ) -> Result<SupportThread> {
        if school_id.is_empty() {
            bail!("school ID is required");
        }
        let now = Utc::now();
        let mut data = self.data.write();

        let mut thread_id = crate::util::thread_id(now);
        while data.threads.iter().any(|t| t.thread_id == thread_id) {
            let next = thread_id.parse::<u64>().context("thread id is not numeric")? + 1;
            thread_id = next.to_string();
        }

        let created = SupportThread {
            thread_id,
            school_id: school_id.to_string(),
            borrower_id: thread.borrower_id,
            borrower_name: thread.borrower_name,
            mobile_no: thread.mobile_no,
            help_topic: thread.help_topic,
            subject: thread.subject,
            status: ThreadStatus::Open,
            created_at: now,
        };
        data.threads.push(created.clone());
        Ok(created)
    }

    async fn add_message(&self, school_id: &str, message: SupportMessage) -> Result<()> {
        let mut data = self.data.write();
        if !data
            .threads
            .iter()
            .any(|t| t.school_id == school_id && t.thread_id == message.thread_id)
        {
            bail!("support thread {} not found", message.thread_id);
        }
        let mut message = message;
        message.sent_at.get_or_insert_with(Utc::now);
        data.messages.push(message);
        Ok(())
    }

    async fn threads_by_borrower(
        &self,
        school_id: &str,
        borrower_id: &str,
    ) -> Result<Vec<SupportThread>> {
        if school_id.is_empty() || borrower_id.is_empty() {
            bail!("borrower ID and school ID are required");
        }
        let mut threads: Vec<SupportThread> = self
            .data
            .read()
            .threads
            .iter()
            .filter(|t| t.school_id == school_id && same_id(&t.borrower_id, borrower_id))
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(threads)
    }

    async fn thread(&self, school_id: &str, thread_id: &str) -> Result<Option<SupportThread>> {
        Ok(self
            .data
            .read()
            .threads
            .iter()
            .find(|t| t.school_id == school_id && t.thread_id == thread_id)
            .cloned())
    }

    async fn messages(&self, school_id: &str, thread_id: &str) -> Result<Vec<SupportMessage>> {
        let data = self.data.read();
        if !data
            .threads
            .iter()
            .any(|t| t.school_id == school_id && t.thread_id == thread_id)
        {
            return Ok(Vec::new());
        }
        Ok(data
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageAuthor, School};
    use chrono::{DateTime, Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
    }

    fn link(user_id: i64, student_id: &str, primary: bool) -> UserLink {
        UserLink {
            user_id,
            student_id: student_id.to_string(),
            school_id: "cpeu".to_string(),
            is_primary: primary,
            is_active: true,
        }
    }

    fn bulletin(id: i64, day: u32) -> Bulletin {
        Bulletin {
            id,
            school_id: "cpeu".to_string(),
            title: format!("Notice {id}"),
            description: None,
            image_url: None,
            period_start: Some(at(2025, 6, day)),
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids_and_rejects_duplicates() {
        let backend = InMemoryBackend::new();
        let a = backend
            .create(NewUser {
                psid: "p1".into(),
                fb_name: "A".into(),
                code: "SA-AAAAAA".into(),
            })
            .await
            .unwrap();
        let b = backend
            .create(NewUser {
                psid: "p2".into(),
                fb_name: "B".into(),
                code: "SA-BBBBBB".into(),
            })
            .await
            .unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(backend.code_exists("SA-BBBBBB").await.unwrap());

        let dup = backend
            .create(NewUser {
                psid: "p1".into(),
                fb_name: "A".into(),
                code: "SA-CCCCCC".into(),
            })
            .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn reactivate_flips_inactive_user() {
        let backend = InMemoryBackend::from_dataset(Dataset {
            users: vec![User {
                id: 3,
                psid: "p3".into(),
                fb_name: "C".into(),
                code: Some("SA-CCCCCC".into()),
                is_active: false,
                last_login_at: None,
            }],
            ..Dataset::default()
        });
        assert!(backend.active_users().await.unwrap().is_empty());

        let user = backend.reactivate("p3").await.unwrap().unwrap();
        assert!(user.is_active);
        assert_eq!(backend.active_users().await.unwrap().len(), 1);
        assert!(backend.reactivate("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_primary_leaves_exactly_one_primary() {
        let backend = InMemoryBackend::from_dataset(Dataset {
            links: vec![link(1, "s1", true), link(1, "s2", false), link(2, "s1", true)],
            ..Dataset::default()
        });

        backend.set_primary(1, "s2", "cpeu").await.unwrap();
        let primary = backend.primary_link(1).await.unwrap().unwrap();
        assert_eq!(primary.student_id, "s2");
        let primaries = backend
            .links(1)
            .await
            .unwrap()
            .into_iter()
            .filter(|l| l.is_primary)
            .count();
        assert_eq!(primaries, 1);

        // other users are untouched
        assert_eq!(backend.primary_link(2).await.unwrap().unwrap().student_id, "s1");
        assert!(backend.set_primary(1, "nope", "cpeu").await.is_err());
    }

    #[tokio::test]
    async fn bulletins_are_paged_newest_first() {
        let backend = InMemoryBackend::from_dataset(Dataset {
            bulletins: (1..=7).map(|i| bulletin(i, i as u32)).collect(),
            ..Dataset::default()
        });
        assert_eq!(backend.active_count("cpeu").await.unwrap(), 7);

        let page: Vec<i64> = backend
            .active_page("cpeu", 3, 3)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(page, vec![4, 3, 2]);
        assert!(backend.active_count("").await.is_err());
    }

    #[tokio::test]
    async fn attendance_filters_by_period() {
        let record = |d: u32| AttendanceRecord {
            school_id: "cpeu".into(),
            student_id: "s1".into(),
            kind: "IN".into(),
            recorded_at: at(2025, 6, d),
        };
        let backend = InMemoryBackend::from_dataset(Dataset {
            attendance: vec![record(1), record(15), record(30)],
            ..Dataset::default()
        });
        let period = Period {
            start: at(2025, 6, 10),
            end: at(2025, 6, 30),
        };
        assert_eq!(backend.count("cpeu", "s1", period).await.unwrap(), 1);
        assert!(backend.count("cpeu", "", period).await.is_err());
    }

    #[tokio::test]
    async fn support_threads_and_messages() {
        let backend = InMemoryBackend::from_dataset(Dataset {
            students: vec![StudentProfile {
                student_id: "s1".into(),
                borrower_id: "B1".into(),
                first_name: "Ana".into(),
                last_name: "Cruz".into(),
                course: String::new(),
                year_level: String::new(),
                mobile_number: String::new(),
                school: School {
                    school_id: "cpeu".into(),
                    school_name: "CPEU".into(),
                },
            }],
            ..Dataset::default()
        });
        let new_thread = || NewSupportThread {
            borrower_id: "B1".into(),
            borrower_name: "Ana Cruz".into(),
            mobile_no: String::new(),
            help_topic: "General Inquiry".into(),
            subject: Some("From Messenger App".into()),
        };

        let first = backend.create_thread("cpeu", new_thread()).await.unwrap();
        let second = backend.create_thread("cpeu", new_thread()).await.unwrap();
        assert_ne!(first.thread_id, second.thread_id);
        assert_eq!(first.status, ThreadStatus::Open);

        backend
            .add_message(
                "cpeu",
                SupportMessage {
                    thread_id: first.thread_id.clone(),
                    author: MessageAuthor::Student,
                    author_id: "B1".into(),
                    author_name: "Ana Cruz".into(),
                    message: "hello".into(),
                    sent_at: None,
                },
            )
            .await
            .unwrap();

        let messages = backend.messages("cpeu", &first.thread_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].sent_at.is_some());

        let threads = backend.threads_by_borrower("cpeu", " B1 ").await.unwrap();
        assert_eq!(threads.len(), 2);
        assert!(backend.messages("cpeu", "unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn payment_logs_are_newest_first_within_period() {
        let log = |txn: &str, at: DateTime<Utc>| PaymentLog {
            school_id: "cpeu".into(),
            student_id: "s1".into(),
            payment_txn_id: txn.into(),
            soa_id: String::new(),
            amount: 100.0,
            status: "PAID".into(),
            process_id: String::new(),
            payment_type: "GCASH".into(),
            paid_at: at,
        };
        let jan = at(2025, 1, 5);
        let backend = InMemoryBackend::from_dataset(Dataset {
            payment_logs: vec![
                log("a", jan),
                log("b", jan + Duration::days(30)),
                log("old", at(2024, 12, 31)),
            ],
            ..Dataset::default()
        });
        let year = Period {
            start: at(2025, 1, 1) - Duration::hours(8),
            end: at(2026, 1, 1),
        };
        let txns: Vec<String> = backend
            .payment_logs("cpeu", "s1", year)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.payment_txn_id)
            .collect();
        assert_eq!(txns, vec!["b", "a"]);
    }

    #[test]
    fn dataset_sections_default_to_empty() {
        let dataset: Dataset = serde_json::from_str(r#"{"users": []}"#).unwrap();
        assert!(dataset.bulletins.is_empty());
    }
}
