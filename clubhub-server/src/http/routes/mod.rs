//! Route handlers organized by resource
//!
//! Modules expose `public_routes`, `user_routes` and `admin_routes`; the
//! server decides which authentication layer wraps each group.

pub mod accounts;
pub mod attendance;
pub mod catalog;
pub mod clubs;
pub mod content;
pub mod health;
pub mod logs;
pub mod memberships;
pub mod registrations;
pub mod upload;
