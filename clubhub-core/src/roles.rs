//! Role lattice and club-level authorization rules.
//!
//! Two orthogonal role axes exist:
//! - [`SystemRole`]: account-wide, `admin` or `user`
//! - [`ClubRole`]: per membership, `leader` > `advisor` > `member`
//!
//! Authorization decisions are pure functions over a [`Caller`] so handlers
//! only have to look up the caller's membership and map the result.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;
use crate::status::text_enum;

/// Account-wide role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum SystemRole {
    Admin,
    User,
}

impl SystemRole {
    pub const ALL: [Self; 2] = [Self::Admin, Self::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Human readable name stored in the roles table
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Admin => "Administrator",
            Self::User => "User",
        }
    }
}

text_enum!(SystemRole, "system role");

/// Role held inside a single club
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum ClubRole {
    Member,
    Advisor,
    Leader,
}

impl ClubRole {
    pub const ALL: [Self; 3] = [Self::Member, Self::Advisor, Self::Leader];

    /// Managing roles: may review applications, publish content, edit attendance.
    pub const MANAGERS: [Self; 2] = [Self::Leader, Self::Advisor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Advisor => "advisor",
            Self::Leader => "leader",
        }
    }

    /// Privilege level: leader(3) > advisor(2) > member(1)
    pub fn level(&self) -> u8 {
        match self {
            Self::Member => 1,
            Self::Advisor => 2,
            Self::Leader => 3,
        }
    }

    pub fn is_manager(&self) -> bool {
        Self::MANAGERS.contains(self)
    }
}

text_enum!(ClubRole, "club role");

impl PartialOrd for ClubRole {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClubRole {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level().cmp(&other.level())
    }
}

/// Who is asking, relative to one club
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// System administrator; bypasses club-level checks
    Admin,
    /// Approved member of the club with this role
    Member(ClubRole),
    /// No approved membership in the club
    Outsider,
}

impl Caller {
    /// Build a caller from the account role and the (approved) club role, if any.
    pub fn resolve(system: SystemRole, club_role: Option<ClubRole>) -> Self {
        match (system, club_role) {
            (SystemRole::Admin, _) => Self::Admin,
            (SystemRole::User, Some(role)) => Self::Member(role),
            (SystemRole::User, None) => Self::Outsider,
        }
    }

    /// Admin, or an approved leader/advisor.
    pub fn can_manage(&self) -> bool {
        match self {
            Self::Admin => true,
            Self::Member(role) => role.is_manager(),
            Self::Outsider => false,
        }
    }

    /// Admin, or any approved member.
    pub fn can_view_internal(&self) -> bool {
        !matches!(self, Self::Outsider)
    }

    pub fn require_manager(&self) -> Result<(), RoleDenied> {
        if self.can_manage() {
            Ok(())
        } else {
            Err(RoleDenied::NotManager)
        }
    }
}

/// Reason an authorization check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoleDenied {
    #[error("no permission for this club")]
    NotManager,

    #[error("not a member of this club")]
    NotMember,

    #[error("insufficient permission: cannot modify a member at or above your own level")]
    TargetNotBelow,

    #[error("insufficient permission: cannot grant a role above your own")]
    GrantAboveSelf,

    #[error("only administrators can appoint a club leader")]
    LeaderRequiresAdmin,

    #[error("the club leader cannot be removed")]
    LeaderNotRemovable,

    #[error("insufficient permission: can only remove members below your own level")]
    RemoveRequiresHigherLevel,
}

/// Decide whether `caller` may change a membership from `current` to `requested`.
///
/// `is_self` exempts the caller's own membership from the "target below me"
/// rule; the grant ceiling still applies.
pub fn check_role_change(
    caller: Caller,
    current: ClubRole,
    requested: ClubRole,
    is_self: bool,
) -> Result<(), RoleDenied> {
    let mine = match caller {
        Caller::Admin => return Ok(()),
        Caller::Outsider => return Err(RoleDenied::NotMember),
        Caller::Member(role) => role,
    };

    if requested == ClubRole::Leader {
        return Err(RoleDenied::LeaderRequiresAdmin);
    }
    if current >= mine && !is_self {
        return Err(RoleDenied::TargetNotBelow);
    }
    if requested > mine {
        return Err(RoleDenied::GrantAboveSelf);
    }
    Ok(())
}

/// Decide whether `caller` may remove a member holding `target`.
pub fn check_removal(caller: Caller, target: ClubRole) -> Result<(), RoleDenied> {
    if target == ClubRole::Leader {
        return Err(RoleDenied::LeaderNotRemovable);
    }
    match caller {
        Caller::Admin => Ok(()),
        Caller::Outsider => Err(RoleDenied::NotMember),
        Caller::Member(mine) if mine > target => Ok(()),
        Caller::Member(_) => Err(RoleDenied::RemoveRequiresHigherLevel),
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Member(role) => write!(f, "{role}"),
            Self::Outsider => f.write_str("outsider"),
        }
    }
}
