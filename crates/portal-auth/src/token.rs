use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use portal_types::{IdentityPayload, Role, SessionClaims};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::TokenError;
use crate::secret::TokenSecret;

/// Claim names the service owns; callers cannot smuggle them in through
/// `IdentityPayload::extra`.
const RESERVED_CLAIMS: [&str; 4] = ["iat", "exp", "userId", "role"];

/// Issues and checks HS256 session tokens.
///
/// Holds no mutable state, so one instance can be shared across every
/// request handler behind an `Arc`.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    has_secret: bool,
}

/// Claims that passed signature and expiry checks.
///
/// Only `TokenService::check`/`verify` can build one. Authorization code
/// should take this type, never `RawClaims`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VerifiedIdentity {
    claims: SessionClaims,
}

/// Payload read from a token without any signature or expiry check.
/// For display and diagnostics only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RawClaims {
    pub algorithm: String,
    pub payload: Map<String, Value>,
}

impl TokenService {
    pub fn new(secret: TokenSecret) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            has_secret: !secret.is_empty(),
        }
    }

    /// Sign `payload` with a 7-day expiry starting now.
    pub fn issue(&self, payload: &IdentityPayload) -> Result<String, TokenError> {
        self.issue_at(payload, Utc::now())
    }

    pub fn issue_at(
        &self,
        payload: &IdentityPayload,
        issuedAt: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if !self.has_secret {
            warn!("refusing to sign session token with an empty secret");
            return Err(TokenError::Signing("empty secret".into()));
        }

        let mut identity = payload.clone();
        for name in RESERVED_CLAIMS {
            identity.extra.remove(name);
        }

        let claims = SessionClaims::starting_at(identity, issuedAt.timestamp());

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                warn!("failed to sign session token: {e}");
                TokenError::Signing(e.to_string())
            })
    }

    /// Accept or reject a token. Every failure collapses to `None`.
    pub fn verify(&self, token: &str) -> Option<VerifiedIdentity> {
        match self.check(token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!(reason = e.kind(), "session token rejected");
                None
            }
        }
    }

    /// Like `verify`, but says why a token was rejected.
    pub fn check(&self, token: &str) -> Result<VerifiedIdentity, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let tokenData =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;

        // jsonwebtoken only rejects `exp < now`; a token is dead from `exp` on.
        if tokenData.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedIdentity {
            claims: tokenData.claims,
        })
    }

    /// Read the payload without checking signature or expiry.
    pub fn decode(&self, token: &str) -> Option<RawClaims> {
        self.inspect(token).ok()
    }

    pub fn inspect(&self, token: &str) -> Result<RawClaims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let tokenData = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret(&[]),
            &unverified_validation(),
        )?;

        Ok(RawClaims {
            algorithm: format!("{:?}", tokenData.header.alg),
            payload: tokenData.claims,
        })
    }
}

fn unverified_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

impl VerifiedIdentity {
    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    pub fn payload(&self) -> &IdentityPayload {
        &self.claims.identity
    }

    pub fn user_id(&self) -> i64 {
        self.claims.identity.user_id
    }

    pub fn role(&self) -> Role {
        self.claims.identity.role
    }

    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role())
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.identity.extra.get(name)
    }

    pub fn issued_at(&self) -> i64 {
        self.claims.iat
    }

    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }
}

impl RawClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.payload.get("userId").and_then(Value::as_i64)
    }

    pub fn role(&self) -> Option<Role> {
        self.payload
            .get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse().ok())
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.payload.get("iat").and_then(Value::as_i64)
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.payload.get("exp").and_then(Value::as_i64)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now.timestamp())
    }
}
