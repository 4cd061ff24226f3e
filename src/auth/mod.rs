// Authentication module
// Credential storage, bearer token issuance and verification, session revocation

pub mod error;
pub mod handlers;
pub mod memory;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod session;
pub mod token;

// Re-export commonly used types
pub use error::AuthError;
pub use handlers::{
    delete_avatar_handler, delete_me_handler, get_avatar_handler, login_handler, logout_all_handler,
    logout_handler, me_handler, register_handler, update_me_handler, upload_avatar_handler,
};
pub use memory::MemoryUserStore;
pub use middleware::{require_auth, AuthenticatedUser};
pub use models::{AuthResponse, LoginRequest, RegisterRequest, User, UserPatch, UserResponse};
pub use repository::{PgUserStore, UserStore};
pub use service::AuthService;
pub use session::SessionRegistry;
pub use token::TokenService;
