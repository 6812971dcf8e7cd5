pub mod config_service;
pub mod file_history_store;
pub mod identity_service;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::file_history_store::FileHistoryStore;
pub use crate::identity_service::{Identity, IdentityService, IdentitySource};
pub use crate::paths::{DaydreamPaths, PathError};
