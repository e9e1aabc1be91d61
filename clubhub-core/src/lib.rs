//! Domain core for clubhub: status enums, the in-club role lattice,
//! attendance session math and configuration.
//!
//! Nothing here touches the network or the database; the `sqlx` feature only
//! adds column encoding for the enums.

pub mod attendance;
pub mod config;
pub mod error;
pub mod roles;
pub mod status;

pub use attendance::{close_session, force_close, round_hours, SessionClose};
pub use config::ClubhubConfig;
pub use error::{CoreError, Result};
pub use roles::{check_removal, check_role_change, Caller, ClubRole, RoleDenied, SystemRole};
pub use status::{ClubStatus, MembershipStatus, ParticipantStatus, Scope};
