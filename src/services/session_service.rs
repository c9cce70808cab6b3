//! Session maintenance: redirect completion, identity announcement, periodic
//! token refresh, and provider-link requests.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::warn;

use crate::{
    auth::{AuthErrorCode, AuthProvider},
    config::CoreConfig,
    dto::{events::PartyEvent, requests::LinkProviderRequest},
    state::{PartyView, SharedView},
};

/// Music provider whose sign-in is handled by a dedicated flow elsewhere.
const MUSIC_PROVIDER: &str = "spotify";

/// Message shown when the environment cannot persist auth state.
const WEB_STORAGE_MESSAGE: &str =
    "Your browser is not supported or has third party cookies disabled.";

/// Tunables for the periodic refresh loop.
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    /// Interval between forced refreshes.
    pub interval: Duration,
    /// Attempts per interval.
    pub retry_limit: u32,
    /// Linear backoff step between attempts.
    pub backoff_step: Duration,
}

impl From<&CoreConfig> for RefreshSchedule {
    fn from(config: &CoreConfig) -> Self {
        Self {
            interval: config.token_refresh_interval,
            retry_limit: config.refresh_retry_limit,
            backoff_step: config.refresh_backoff_step,
        }
    }
}

/// Run the session maintenance loops for the lifetime of the view.
///
/// The redirect check and identity announcement run once at startup; the
/// refresh loop runs until the embedder tears the task down.
pub async fn run(view: SharedView, auth: Arc<dyn AuthProvider>, schedule: RefreshSchedule) {
    let startup = async {
        complete_redirect(&view, auth.as_ref()).await;
        announce_identity(&view, auth.as_ref()).await;
    };
    tokio::join!(refresh_loop(auth.as_ref(), &schedule), startup);
}

/// Resolve a pending sign-in redirect, recovering classified failures.
pub async fn complete_redirect(view: &PartyView, auth: &dyn AuthProvider) {
    let Err(err) = auth.redirect_result().await else {
        return;
    };

    match err.code {
        AuthErrorCode::CredentialAlreadyInUse => {
            // The credential already belongs to an account; signing in with
            // it directly recovers the session instead of failing the user.
            let Some(credential) = err.credential.clone() else {
                exchange_failed(view, &err);
                return;
            };
            if let Err(sign_in_err) = auth.sign_in_with_credential(credential).await {
                warn!(error = %sign_in_err, "credential recovery sign-in failed");
                exchange_failed(view, &sign_in_err);
            }
        }
        AuthErrorCode::WebStorageUnsupported => {
            view.events().broadcast(PartyEvent::OAuthExchangeFailed {
                provider: err.provider_id().to_string(),
                message: WEB_STORAGE_MESSAGE.to_string(),
            });
        }
        _ => exchange_failed(view, &err),
    }
}

fn exchange_failed(view: &PartyView, err: &crate::auth::AuthError) {
    view.events().broadcast(PartyEvent::OAuthExchangeFailed {
        provider: err.provider_id().to_string(),
        message: format!("Failed to perform OAuth {}: {}", err.code, err.message),
    });
}

/// Confirm the session identity and announce it when non-anonymous.
pub async fn announce_identity(view: &PartyView, auth: &dyn AuthProvider) {
    let identity = match auth.current_session().await {
        Ok(identity) => identity,
        Err(err) => {
            warn!(error = %err, "failed to resolve session identity");
            return;
        }
    };

    view.set_current_uid(identity.uid.clone()).await;
    if identity.is_anonymous {
        return;
    }

    let provider = identity.normalized_provider_id().to_string();
    view.events()
        .broadcast(PartyEvent::AuthStatusKnown { provider, identity });
}

/// Force-refresh the session token on a fixed interval, forever.
///
/// Losing the token mid-party severs the store connection and with it
/// playback, so refreshes happen well inside the token validity window.
pub async fn refresh_loop(auth: &dyn AuthProvider, schedule: &RefreshSchedule) {
    loop {
        sleep(schedule.interval).await;
        if !auth.session_exists().await {
            continue;
        }
        refresh_with_retry(auth, schedule).await;
    }
}

/// Bounded-retry refresh with linearly growing backoff.
///
/// Returns whether an attempt succeeded. Exhausting the retries is not an
/// error; the next interval simply tries again.
pub async fn refresh_with_retry(auth: &dyn AuthProvider, schedule: &RefreshSchedule) -> bool {
    for attempt in 0..schedule.retry_limit {
        match auth.force_refresh_token().await {
            Ok(()) => return true,
            Err(err) => {
                let backoff = schedule.backoff_step * attempt;
                warn!(
                    error = %err,
                    backoff_secs = backoff.as_secs(),
                    "token refresh failed; backing off"
                );
                sleep(backoff).await;
            }
        }
    }
    false
}

/// Link an additional auth provider to the current session.
pub async fn link_provider(
    view: &PartyView,
    auth: &dyn AuthProvider,
    request: &LinkProviderRequest,
) {
    if request.provider == MUSIC_PROVIDER {
        // The music provider has its own dedicated sign-in flow.
        return;
    }

    let result = match auth.current_session().await {
        Ok(_) => auth.link_with_redirect(&request.provider).await,
        Err(err) => Err(err),
    };

    let Err(err) = result else { return };
    let message = if err.code == AuthErrorCode::ProviderAlreadyLinked {
        format!(
            "Failed to start OAuth because the account is already linked with an account from {}.",
            request.provider
        )
    } else {
        format!("Failed to start OAuth with code {}: {}", err.code, err.message)
    };
    view.events().broadcast(PartyEvent::OAuthExchangeFailed {
        provider: request.provider.clone(),
        message,
    });
}
