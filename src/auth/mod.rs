//! Authentication: credential storage, auth state and the session manager

pub mod credentials;
pub mod session;
pub mod state;
pub mod validate;

pub use credentials::{CredentialStore, EncryptedFileStore, HybridStore, MemoryStore};
pub use session::{SESSION_KEY, SessionManager};
pub use state::{AuthEvent, AuthHandle, AuthState, AuthStore};
pub use validate::{MIN_PASSWORD_LEN, SignInForm, SignUpForm};
