//! Boundary to the external authentication provider.
//!
//! The core never talks to a concrete identity service; everything it needs
//! is behind [`AuthProvider`], and failures carry a machine-readable
//! [`AuthErrorCode`] so the session loop can classify them.

use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for authentication provider calls.
pub type AuthResult<T> = Result<T, AuthError>;

/// Provider id reported on classified failures that carry no credential.
pub const PLATFORM_PROVIDER: &str = "platform";

/// Identity of the currently signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id assigned by the provider.
    pub uid: String,
    /// Whether this is an anonymous guest session.
    pub is_anonymous: bool,
    /// Identity provider backing the session (e.g. `google.com`).
    pub provider_id: String,
    /// Display name, when the provider supplies one.
    pub display_name: Option<String>,
}

impl Identity {
    /// Provider id with a trailing `.com` domain suffix stripped.
    pub fn normalized_provider_id(&self) -> &str {
        normalize_provider_id(&self.provider_id)
    }
}

/// Strip the trailing `.com` domain suffix from a provider id.
pub fn normalize_provider_id(raw: &str) -> &str {
    raw.strip_suffix(".com").unwrap_or(raw)
}

/// OAuth credential attached to a failed redirect exchange.
///
/// Signing in directly with this credential recovers the session when the
/// redirect failed because the credential is already bound to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Provider that issued the credential.
    pub provider_id: String,
    /// Opaque provider token backing the credential.
    pub token: String,
}

/// Machine-readable classification of provider failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    /// The credential from the redirect is already bound to another account.
    CredentialAlreadyInUse,
    /// The environment cannot persist auth state (e.g. third-party cookies
    /// disabled).
    WebStorageUnsupported,
    /// The session is already linked with an account from this provider.
    ProviderAlreadyLinked,
    /// Any other provider-reported failure code.
    Other(String),
}

impl AuthErrorCode {
    /// The provider's wire representation of this code.
    pub fn as_str(&self) -> &str {
        match self {
            AuthErrorCode::CredentialAlreadyInUse => "credential-already-in-use",
            AuthErrorCode::WebStorageUnsupported => "web-storage-unsupported",
            AuthErrorCode::ProviderAlreadyLinked => "provider-already-linked",
            AuthErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the authentication provider.
#[derive(Debug, Clone, Error)]
#[error("auth failure `{code}`: {message}")]
pub struct AuthError {
    /// Classified failure code.
    pub code: AuthErrorCode,
    /// Human-readable message from the provider.
    pub message: String,
    /// Credential attached to the failure, when the provider returned one.
    pub credential: Option<Credential>,
}

impl AuthError {
    /// Construct an error from a raw provider code and message.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            credential: None,
        }
    }

    /// Attach the credential the provider returned alongside the failure.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Provider id to report for this failure, falling back to the platform.
    pub fn provider_id(&self) -> &str {
        self.credential
            .as_ref()
            .map(|credential| credential.provider_id.as_str())
            .unwrap_or(PLATFORM_PROVIDER)
    }
}

/// Abstraction over the external authentication service.
///
/// Mirrors the primitive operations the session loop consumes; implementations
/// own token storage and renewal entirely.
pub trait AuthProvider: Send + Sync {
    /// Resolve the current session identity, waiting until one is known.
    fn current_session(&self) -> BoxFuture<'static, AuthResult<Identity>>;

    /// Resolve the outcome of a pending sign-in redirect, if any.
    ///
    /// Completes successfully both when a redirect was consumed and when none
    /// was pending.
    fn redirect_result(&self) -> BoxFuture<'static, AuthResult<()>>;

    /// Sign in directly with a credential recovered from a failed redirect.
    fn sign_in_with_credential(
        &self,
        credential: Credential,
    ) -> BoxFuture<'static, AuthResult<Identity>>;

    /// Begin linking the current session with an additional provider via a
    /// redirect-based flow.
    fn link_with_redirect(&self, provider: &str) -> BoxFuture<'static, AuthResult<()>>;

    /// Whether a session currently exists, without waiting for one.
    fn session_exists(&self) -> BoxFuture<'static, bool>;

    /// Force-refresh the current session token.
    fn force_refresh_token(&self) -> BoxFuture<'static, AuthResult<()>>;
}
