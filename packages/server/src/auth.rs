//! Bearer-token authentication.
//!
//! Handlers that take an [`Authenticated`] argument reject requests without
//! a valid `Authorization: Bearer <token>` header with 401 before any
//! market data work starts.

use std::collections::BTreeMap;
use std::future::{Ready, ready};
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::http::{StatusCode, header};
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, web};
use realmarket_server_models::ApiError;

use crate::AppState;

/// Caller identity established by an [`IdentityVerifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable name of the caller.
    pub subject: String,
}

/// Authentication failures. All map to 401.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header.
    #[error("Not authenticated")]
    Missing,

    /// The header is not a bearer token.
    #[error("Malformed authentication token")]
    Malformed,

    /// The token was not accepted.
    #[error("Invalid authentication credentials")]
    Invalid,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized()
            .insert_header((header::WWW_AUTHENTICATE, "Bearer"))
            .json(ApiError {
                detail: self.to_string(),
            })
    }
}

/// Maps a bearer token to an identity.
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `token`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Invalid`] if the token is not accepted.
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Accepts a fixed set of tokens, e.g. from `API_TOKENS`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: BTreeMap<String, Identity>,
}

impl StaticTokenVerifier {
    /// Accepts each of `tokens`; the n-th token authenticates as
    /// `client-n`.
    #[must_use]
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        let tokens = tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                (
                    token,
                    Identity {
                        subject: format!("client-{}", i + 1),
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    /// Reads comma-separated tokens from `API_TOKENS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("API_TOKENS").unwrap_or_default())
    }

    /// Parses a comma-separated token list, ignoring blanks.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        )
    }

    /// Whether no token is accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Wraps the verifier for [`AppState`].
    #[must_use]
    pub fn shared(self) -> Arc<dyn IdentityVerifier> {
        Arc::new(self)
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::Invalid)
    }
}

/// Extractor for an authenticated caller.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl FromRequest for Authenticated {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<Authenticated, AuthError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Malformed)?;

    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        log::error!("AppState missing, rejecting request");
        return Err(AuthError::Invalid);
    };
    let identity = state.verifier.verify(token).inspect_err(|_| {
        log::warn!("Rejected bearer token for {}", req.path());
    })?;
    log::debug!("Authenticated {} for {}", identity.subject, req.path());
    Ok(Authenticated(identity))
}
