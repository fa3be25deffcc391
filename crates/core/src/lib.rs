//! Hepatica core types and session state

pub mod error;
pub mod session;
pub mod storage;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use session::{Session, SessionStore};
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage, STORAGE_KEY};
pub use types::{
    AdminMetrics, AuthResponse, AuthTokens, ConsentStatus, Faq, Hospital, LoginRequest,
    Prediction, PredictionRequest, RefreshRequest, RefreshResponse, RegisterRequest, Role, User,
};
