//! Shared-secret access gate
//!
//! A visitor proves knowledge of the access key once via `?key=`, after which
//! a signed `authorized` cookie keeps them in for a day. The cookie value is
//! `true.<hex HMAC-SHA256 of "authorized=true" keyed by the secret>`, so it
//! cannot be produced without the key. Without a configured key the gate is
//! open.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

pub const COOKIE_NAME: &str = "authorized";
pub const COOKIE_MAX_AGE_SECONDS: u32 = 24 * 60 * 60;
const COOKIE_PAYLOAD: &str = "authorized=true";

const DENIED_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Access restricted</title>
  </head>
  <body style="min-height:100vh;margin:0;display:flex;align-items:center;justify-content:center;background:#020617;font-family:sans-serif">
    <div style="max-width:28rem;padding:2rem;border-radius:1rem;background:#0f172a;border:1px solid #1e293b;text-align:center">
      <h2 style="color:#fff">Access restricted</h2>
      <p style="color:#94a3b8">An access key is required to use this application. Please use the link you were given.</p>
      <code style="color:#475569">?key=YOUR_ACCESS_KEY</code>
    </div>
  </body>
</html>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Let the request through, optionally persisting authorization in a cookie
    Allow { set_cookie: Option<String> },
    Denied,
}

#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

impl AccessGate {
    /// A blank secret counts as unconfigured
    #[must_use]
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|secret| !secret.is_empty()),
        }
    }

    /// Whether `key` would be accepted; always true when unconfigured
    #[must_use]
    pub fn verify_key(&self, key: Option<&str>) -> bool {
        match &self.secret {
            None => true,
            Some(secret) => key == Some(secret.as_str()),
        }
    }

    /// Decide on a request from its `key` query value and cookie headers
    #[must_use]
    pub fn evaluate(&self, query_key: Option<&str>, headers: &HeaderMap) -> GateDecision {
        let Some(secret) = &self.secret else {
            return GateDecision::Allow { set_cookie: None };
        };

        if query_key == Some(secret.as_str()) {
            return GateDecision::Allow {
                set_cookie: Some(authorization_cookie(secret)),
            };
        }

        if has_authorization_cookie(secret, headers) {
            GateDecision::Allow { set_cookie: None }
        } else {
            GateDecision::Denied
        }
    }
}

fn cookie_mac(secret: &str) -> Hmac<Sha256> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(COOKIE_PAYLOAD.as_bytes());
    mac
}

/// Signed cookie value for `secret`
fn cookie_value(secret: &str) -> String {
    format!("true.{}", hex::encode(cookie_mac(secret).finalize().into_bytes()))
}

fn authorization_cookie(secret: &str) -> String {
    format!(
        "{COOKIE_NAME}={}; Path=/; Max-Age={COOKIE_MAX_AGE_SECONDS}; HttpOnly; Secure; SameSite=Strict",
        cookie_value(secret)
    )
}

fn signature_matches(secret: &str, value: &str) -> bool {
    let Some(signature) = value.strip_prefix("true.") else {
        return false;
    };
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };
    cookie_mac(secret).verify_slice(&signature).is_ok()
}

fn has_authorization_cookie(secret: &str, headers: &HeaderMap) -> bool {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, value)| name == COOKIE_NAME && signature_matches(secret, value))
}

/// Axum middleware enforcing the gate
pub async fn require_access(
    State(gate): State<Arc<AccessGate>>,
    request: Request,
    next: Next,
) -> Response {
    let query = Query::<KeyQuery>::try_from_uri(request.uri())
        .map(|Query(query)| query)
        .unwrap_or_default();

    match gate.evaluate(query.key.as_deref(), request.headers()) {
        GateDecision::Allow { set_cookie: None } => next.run(request).await,
        GateDecision::Allow {
            set_cookie: Some(cookie),
        } => {
            debug!("Access key accepted, setting authorization cookie");
            let mut response = next.run(request).await;
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => warn!("Failed to build authorization cookie: {e}"),
            }
            response
        }
        GateDecision::Denied => {
            debug!(path = %request.uri().path(), "Access denied");
            (StatusCode::FORBIDDEN, Html(DENIED_PAGE)).into_response()
        }
    }
}
