//! OAuth 2.0 authorization-code flow with dynamic client registration.

mod engine;
mod store;
mod types;

pub use engine::{AccessLookup, OAuthConfig, OAuthEngine};
pub use store::{Expiring, ExpiringStore};
pub use types::{
    AccessToken, AuthorizationCode, AuthorizeRequest, ClientCredentials, ClientRegistration,
    DiscoveryMetadata, OAuthError, PkceMethod, RefreshToken, RegistrationRequest,
    TokenEndpointAuthMethod, TokenRequest, TokenResponse,
};
