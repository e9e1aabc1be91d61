//! Request models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod account;
pub mod pagination;
pub mod validation;

pub use account::{Account, Password};
pub use pagination::{Page, PageInfo, PageQuery, Pagination};
pub use validation::{optional_text, required_text, ValidationError};
