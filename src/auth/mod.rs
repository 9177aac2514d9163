//! Session-backed authentication, CSRF protection and route guards.

pub mod authenticator;
pub mod csrf;
pub mod guard;
pub mod password;
pub mod session;

pub use authenticator::Authenticator;
pub use guard::{AdminUser, CurrentUser};
pub use session::{MemorySessionStore, Session, SessionStore, SqlSessionStore};
