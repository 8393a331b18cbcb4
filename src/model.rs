use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::PortalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    /// Where a freshly signed-in user of this role lands.
    pub fn landing(&self) -> &'static str {
        match self {
            Role::Student => "/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(PortalError::Corrupt(format!("unknown role {other:?}"))),
        }
    }
}

/// Who the identity provider says is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
}

/// The portal's record of a user. `role` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub uid: String,
    pub role: Role,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeCategory {
    Academic,
    Exam,
    Cultural,
    Sports,
}

impl NoticeCategory {
    pub const ALL: [NoticeCategory; 4] = [
        NoticeCategory::Academic,
        NoticeCategory::Exam,
        NoticeCategory::Cultural,
        NoticeCategory::Sports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeCategory::Academic => "Academic",
            NoticeCategory::Exam => "Exam",
            NoticeCategory::Cultural => "Cultural",
            NoticeCategory::Sports => "Sports",
        }
    }
}

impl fmt::Display for NoticeCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoticeCategory {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NoticeCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| PortalError::validation("category", format!("unknown category {s:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: NoticeCategory,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotice {
    pub title: String,
    pub description: String,
    pub category: NoticeCategory,
    pub file_url: Option<String>,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<NoticeCategory>,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub description: String,
    pub date: OffsetDateTime,
    pub venue: String,
    pub organizer: String,
    pub file_url: Option<String>,
    /// Ledger of registered student ids, in registration order, no duplicates.
    pub registered_students: Vec<String>,
}

impl Event {
    pub fn is_registered(&self, student_id: &str) -> bool {
        self.registered_students.iter().any(|id| id == student_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub date: OffsetDateTime,
    pub venue: String,
    pub organizer: String,
    pub file_url: Option<String>,
}

/// Fields left as `None` keep their stored value. The ledger is never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<OffsetDateTime>,
    pub venue: Option<String>,
    pub organizer: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    Registered,
    Unregistered,
}

impl RegistrationState {
    pub fn from_membership(present: bool) -> Self {
        if present {
            RegistrationState::Registered
        } else {
            RegistrationState::Unregistered
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationState::Registered)
    }

    pub fn flipped(&self) -> Self {
        match self {
            RegistrationState::Registered => RegistrationState::Unregistered,
            RegistrationState::Unregistered => RegistrationState::Registered,
        }
    }
}

pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(millis: i64) -> Result<OffsetDateTime, PortalError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|err| PortalError::Corrupt(format!("timestamp {millis}: {err}")))
}

/// Current time truncated to the millisecond precision we store.
pub(crate) fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    from_millis(to_millis(now)).unwrap_or(now)
}
