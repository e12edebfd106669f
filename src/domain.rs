//! Records served by the school data store.
//!
//! These are plain data carriers. Lookups live behind the traits in
//! [`crate::repositories`]; everything here is `Serialize + Deserialize` so the
//! in-memory backend can be seeded from a JSON dataset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A messenger user known to the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    /// Page-scoped id assigned by the messaging platform.
    pub psid: String,
    #[serde(default)]
    pub fb_name: String,
    /// Account code (`SA-XXXXXX`) handed to school admins for linking.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

/// Input for creating a user during registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub psid: String,
    pub fb_name: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct School {
    pub school_id: String,
    pub school_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentProfile {
    pub student_id: String,
    #[serde(default)]
    pub borrower_id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub year_level: String,
    #[serde(default)]
    pub mobile_number: String,
    pub school: School,
}

impl StudentProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Association between a user and one student record at one school.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserLink {
    pub user_id: i64,
    pub student_id: String,
    pub school_id: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A link together with its resolved student profile, if the profile exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProfile {
    pub link: UserLink,
    pub student: Option<StudentProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectGrade {
    pub student_id: String,
    pub school_id: String,
    pub school_year: String,
    pub semester: String,
    #[serde(default)]
    pub exam_term: String,
    #[serde(default)]
    pub subject_id: String,
    pub subject_description: String,
    #[serde(default)]
    pub subject_schedule: String,
    #[serde(default)]
    pub subject_room: String,
    #[serde(default)]
    pub subject_unit: String,
    #[serde(default)]
    pub student_grade: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bulletin {
    pub id: i64,
    pub school_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub period_start: Option<DateTime<Utc>>,
    /// Free-form notes; may embed a `<redirectionlink>...</redirectionlink>` tag.
    #[serde(default)]
    pub notes: Option<String>,
}

/// One tap of a student's RFID card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub school_id: String,
    pub student_id: String,
    /// `IN` / `OUT` as reported by the reader.
    #[serde(rename = "type")]
    pub kind: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentPayable {
    pub school_id: String,
    pub student_id: String,
    pub soa_id: String,
    pub particulars: String,
    pub total_amount_to_pay: f64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub school_year: Option<String>,
    #[serde(default)]
    pub semester: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentLog {
    pub school_id: String,
    pub student_id: String,
    pub payment_txn_id: String,
    #[serde(default)]
    pub soa_id: String,
    pub amount: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub process_id: String,
    #[serde(default)]
    pub payment_type: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreadStatus {
    #[default]
    Open,
    Closed,
}

impl ThreadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupportThread {
    pub thread_id: String,
    pub school_id: String,
    pub borrower_id: String,
    #[serde(default)]
    pub borrower_name: String,
    #[serde(default)]
    pub mobile_no: String,
    #[serde(default)]
    pub help_topic: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for opening a support thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSupportThread {
    pub borrower_id: String,
    pub borrower_name: String,
    pub mobile_no: String,
    pub help_topic: String,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageAuthor {
    Student,
    Support,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupportMessage {
    pub thread_id: String,
    pub author: MessageAuthor,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub author_name: String,
    pub message: String,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_defaults_to_active_when_flag_missing() {
        let user: User = serde_json::from_str(r#"{"id": 1, "psid": "psid-1"}"#).unwrap();
        assert!(user.is_active);
        assert!(user.code.is_none());
    }

    #[test]
    fn full_name_trims_missing_last_name() {
        let profile = StudentProfile {
            student_id: "2024-001".to_string(),
            borrower_id: String::new(),
            first_name: "Ana".to_string(),
            last_name: String::new(),
            course: String::new(),
            year_level: String::new(),
            mobile_number: String::new(),
            school: School {
                school_id: "cpeu".to_string(),
                school_name: "CPEU".to_string(),
            },
        };
        assert_eq!(profile.full_name(), "Ana");
    }

    #[test]
    fn thread_status_uses_uppercase_wire_names() {
        let json = serde_json::to_string(&ThreadStatus::Closed).unwrap();
        assert_eq!(json, "\"CLOSED\"");
        assert_eq!(ThreadStatus::default().as_str(), "OPEN");
    }
}
