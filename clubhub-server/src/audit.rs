//! Operation audit trail
//!
//! Entries are written after the audited mutation has succeeded, on a
//! detached task. A failed insert is logged and otherwise ignored.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::db::{LogRepo, NewLog, UserIdentity};

/// Kind of audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ActionType {
    ReviewApplication,
    ChangeRole,
    RemoveMember,
    ModifyAttendance,
    PublishAnnouncement,
    ManageActivity,
    ManageClub,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReviewApplication => "review_application",
            Self::ChangeRole => "change_role",
            Self::RemoveMember => "remove_member",
            Self::ModifyAttendance => "modify_attendance",
            Self::PublishAnnouncement => "publish_announcement",
            Self::ManageActivity => "manage_activity",
            Self::ManageClub => "manage_club",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NewLog {
    /// Entry attributed to `operator`. Use club 0 for system-wide actions.
    pub fn by(
        operator: &UserIdentity,
        action_type: ActionType,
        club_id: i64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            operator_id: operator.id,
            operator_name: operator.name.clone(),
            action_type,
            content: content.into(),
            club_id,
        }
    }
}

/// Spawn the insert of one audit entry.
///
/// The handle is only awaited by tests; request handlers drop it.
pub fn record(pool: &SqlitePool, entry: NewLog) -> JoinHandle<()> {
    let pool = pool.clone();
    tokio::spawn(async move {
        match LogRepo::new(&pool).insert(&entry).await {
            Ok(id) => debug!(id, action = %entry.action_type, club_id = entry.club_id, "audit entry written"),
            Err(e) => warn!(
                error = %e,
                action = %entry.action_type,
                operator_id = entry.operator_id,
                "failed to write audit entry"
            ),
        }
    })
}
