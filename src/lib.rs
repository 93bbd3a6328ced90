//! dev2gis Rust Client
//!
//! A Rust client library for the dev2gis UAV imagery processing API:
//! authenticated requests with single-flight token refresh, client-side
//! upload validation, single and batch heightmap jobs.

pub mod api_client;
pub mod config;
pub mod error;
pub mod heightmaps;
pub mod session;
pub mod singleflight;
pub mod token;
pub mod token_store;
pub mod types;
pub mod validators;

pub use api_client::{ApiClient, ApiClientBuilder, MultipartForm, RequestBody, RequestOptions};
pub use config::ClientConfig;
pub use error::{ClientError, RefreshError, Result};
pub use heightmaps::PollOptions;
pub use session::{FnNavigator, Navigator, NoopNavigator};
pub use token_store::{CredentialKey, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{BatchOptions, GenerationMode, MergeMethod, UploadFile, UploadOutcome};
pub use validators::ValidationError;
