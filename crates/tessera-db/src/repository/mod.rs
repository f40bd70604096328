//! SurrealDB repository implementations.

mod session;
mod subscription;
mod tenant;
mod user;

pub use session::SurrealSessionRepository;
pub use subscription::SurrealSubscriptionRepository;
pub use tenant::SurrealTenantRegistry;
pub use user::{SurrealUserRepository, UserTable};
