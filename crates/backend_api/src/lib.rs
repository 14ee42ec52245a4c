pub mod error;
pub mod handlers;
pub mod identity;
pub mod repository;
pub mod router;
pub mod server;

pub use error::{ApiError, Result};
pub use handlers::AppState;
pub use identity::{IdentityProvider, InMemoryIdentity, Session, User};
pub use repository::{JsonFileRepository, StorageRepository};
pub use router::create_router;
pub use server::run_server;
