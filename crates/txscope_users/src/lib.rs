//! # txscope Users
//!
//! A small user data-access layer showing how independently written
//! transactional methods compose into one transaction.
//!
//! - [`UserDao`] methods go through the marked-parameter protocol: each
//!   method's body receives the active resource in a marked argument slot.
//! - [`UserService`] methods wrap several DAO calls; the service call owns the
//!   transaction and the DAO calls join it.
//!
//! ```ignore
//! let db = Arc::new(MemoryDatabase::new());
//! let service = UserService::new(db)?;
//!
//! let user = service.create_and_update_user(&UserContext::new()).await?;
//! assert_eq!(user.name, "user5!");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod dao;
mod error;
mod service;
mod user;

pub use dao::{UserDao, CREATE_USER, GET_USERS, UPDATE_USER};
pub use error::{UserError, UserResult};
pub use service::UserService;
pub use user::{User, UserContext, UserSlot, DEFAULT_USER_NAME};
