// hubspace-api: Async Rust client for the Hubspace identity provider and
// the Afero device cloud behind it.

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::login_page::{LoginForm, LoginPageError};
pub use auth::pkce::CodeVerifier;
pub use auth::{Credential, DEFAULT_TOKEN_VALIDITY, TokenBroker};
pub use client::AferoClient;
pub use endpoints::Endpoints;
pub use error::Error;
pub use models::{MetaDeviceRecord, StateEnvelope, StateRecord};
pub use transport::TransportConfig;
