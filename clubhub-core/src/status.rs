//! Status and visibility enumerations stored as lowercase text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Implements `Display` and `FromStr` on top of `as_str` / `ALL`.
macro_rules! text_enum {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| CoreError::unknown_variant($kind, s))
            }
        }
    };
}

pub(crate) use text_enum;

/// Review state of a club registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum ClubStatus {
    Pending,
    Approved,
    Rejected,
}

impl ClubStatus {
    pub const ALL: [Self; 3] = [Self::Pending, Self::Approved, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

text_enum!(ClubStatus, "club status");

/// State of a user's membership in a club
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
    Quit,
}

impl MembershipStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Approved, Self::Rejected, Self::Quit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Quit => "quit",
        }
    }

    /// Whether an application may be (re)submitted from this state.
    pub fn can_reapply(&self) -> bool {
        matches!(self, Self::Rejected | Self::Quit)
    }
}

text_enum!(MembershipStatus, "membership status");

/// Activity registration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum ParticipantStatus {
    Confirmed,
    Cancelled,
}

impl ParticipantStatus {
    pub const ALL: [Self; 2] = [Self::Confirmed, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

text_enum!(ParticipantStatus, "participant status");

/// Visibility of announcements and activities.
///
/// `Public` rows are listed anonymously; `Internal` rows only to the club.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum Scope {
    #[default]
    Public,
    Internal,
}

impl Scope {
    pub const ALL: [Self; 2] = [Self::Public, Self::Internal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
        }
    }
}

text_enum!(Scope, "scope");
