//! OAuth 2.0 authorization code flow with PKCE, and token refresh.

pub mod callback;
pub mod lifecycle;
pub mod pkce;
pub mod token_endpoint;

pub use callback::{cancel_on, CallbackListener, CallbackOutcome};
pub use lifecycle::{HandshakeState, PkceHandshake, TokenLifecycle};
pub use pkce::AuthSession;
