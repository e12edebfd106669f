use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AttendanceRecord, Bulletin, NewSupportThread, NewUser, PaymentLog, StudentPayable,
    StudentProfile, SubjectGrade, SupportMessage, SupportThread, User, UserLink,
};

/// Messaging-platform users known to the assistant.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_psid(&self, psid: &str) -> Result<Option<User>>;

    /// Insert a new, active user. Fails if the PSID is already present.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Mark an existing user active again; `None` when the PSID is unknown.
    async fn reactivate(&self, psid: &str) -> Result<Option<User>>;

    async fn code_exists(&self, code: &str) -> Result<bool>;

    async fn active_users(&self) -> Result<Vec<User>>;

    fn name(&self) -> &str;
}

/// Links between a user and the student records they may act for.
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Active links of a user.
    async fn links(&self, user_id: i64) -> Result<Vec<UserLink>>;

    /// The active primary link, if one is set.
    async fn primary_link(&self, user_id: i64) -> Result<Option<UserLink>>;

    /// Make the given link the user's only primary link.
    async fn set_primary(&self, user_id: i64, student_id: &str, school_id: &str) -> Result<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn student_profile(&self, school_id: &str, student_id: &str)
        -> Result<Option<StudentProfile>>;
}

#[async_trait]
pub trait GradeRepository: Send + Sync {
    /// Every subject grade of a student, ordered by semester then subject.
    async fn grades(&self, school_id: &str, student_id: &str) -> Result<Vec<SubjectGrade>>;

    /// Subject grades for one school year, ordered by subject.
    async fn grades_by_year(
        &self,
        school_id: &str,
        student_id: &str,
        school_year: &str,
    ) -> Result<Vec<SubjectGrade>>;
}

/// Active school announcements, newest first.
#[async_trait]
pub trait BulletinRepository: Send + Sync {
    async fn active_count(&self, school_id: &str) -> Result<usize>;

    async fn active_page(&self, school_id: &str, offset: usize, limit: usize)
        -> Result<Vec<Bulletin>>;
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Daily time records, newest first.
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    async fn count(&self, school_id: &str, student_id: &str, period: Period) -> Result<usize>;

    async fn page(
        &self,
        school_id: &str,
        student_id: &str,
        period: Period,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<AttendanceRecord>>;
}

#[async_trait]
pub trait PayableRepository: Send + Sync {
    async fn active_payables(&self, school_id: &str, student_id: &str)
        -> Result<Vec<StudentPayable>>;
}

#[async_trait]
pub trait PaymentLogRepository: Send + Sync {
    /// Payments made within `period`, newest first.
    async fn payment_logs(&self, school_id: &str, student_id: &str, period: Period)
        -> Result<Vec<PaymentLog>>;
}

#[async_trait]
pub trait SupportRepository: Send + Sync {
    /// Open a new thread and assign its id.
    async fn create_thread(&self, school_id: &str, thread: NewSupportThread)
        -> Result<SupportThread>;

    async fn add_message(&self, school_id: &str, message: SupportMessage) -> Result<()>;

    /// Threads opened by a borrower, newest first.
    async fn threads_by_borrower(&self, school_id: &str, borrower_id: &str)
        -> Result<Vec<SupportThread>>;

    async fn thread(&self, school_id: &str, thread_id: &str) -> Result<Option<SupportThread>>;

    /// Messages of a thread in the order they were written.
    async fn messages(&self, school_id: &str, thread_id: &str) -> Result<Vec<SupportMessage>>;
}
