//! # Token Lifecycle
//!
//! Issues, verifies, and rotates access/refresh JWT pairs.
//!
//! Access and refresh tokens carry the same claim shape but are signed with
//! independent secrets. `verify_access_token` only ever holds the access key,
//! so a refresh token presented as an access token fails signature
//! verification. Nothing is stored server-side; validity is signature plus
//! embedded expiry, evaluated against the injected clock.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::account::{Account, CredentialStore};
use super::clock::{Clock, SystemClock};
use super::errors::{AuthError, AuthResult};
use crate::observability::Event;

/// Role label embedded in access tokens
pub const USER_ROLE: &str = "user";

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Longest accepted token lifetime (ten years)
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Claims embedded in both access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID
    pub user_id: i64,

    /// Role label; only set on access tokens
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,

    /// Issued at (Unix epoch seconds)
    pub iat: i64,

    /// Expires at (Unix epoch seconds)
    pub exp: i64,

    /// Username
    pub sub: String,

    /// Per-token nonce so two tokens minted in the same second still differ
    pub jti: String,
}

/// Token configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: "CHANGE_THIS_ACCESS_SECRET_IN_PRODUCTION".to_string(),
            refresh_secret: "CHANGE_THIS_REFRESH_SECRET_IN_PRODUCTION".to_string(),
            access_ttl: Duration::seconds(900),
            refresh_ttl: Duration::seconds(604_800),
        }
    }
}

impl TokenConfig {
    pub fn validate(&self) -> AuthResult<()> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(AuthError::InvalidConfig("token secrets must not be empty".into()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AuthError::InvalidConfig(
                "access and refresh secrets must differ".into(),
            ));
        }
        if self.access_ttl <= Duration::zero() || self.refresh_ttl <= Duration::zero() {
            return Err(AuthError::InvalidConfig("token TTLs must be positive".into()));
        }
        let ceiling = Duration::seconds(MAX_TOKEN_TTL_SECS);
        if self.access_ttl > ceiling || self.refresh_ttl > ceiling {
            return Err(AuthError::InvalidConfig(format!(
                "token TTLs must not exceed {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }
        Ok(())
    }
}

/// Access/refresh pair handed to the client
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl: i64,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Dual-secret token service
#[derive(Clone)]
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: TokenConfig, store: Arc<dyn CredentialStore>) -> AuthResult<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: TokenConfig,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            access: SigningKeys::from_secret(&config.access_secret),
            refresh: SigningKeys::from_secret(&config.refresh_secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            store,
            clock,
        })
    }

    /// Issue a fresh access/refresh pair for an account
    pub fn issue_token_pair(&self, account: &Account) -> AuthResult<TokenPair> {
        let now = self.clock.now();
        let access_exp = now
            .checked_add_signed(self.access_ttl)
            .ok_or(AuthError::TokenIssuance)?;
        let refresh_exp = now
            .checked_add_signed(self.refresh_ttl)
            .ok_or(AuthError::TokenIssuance)?;

        let access_claims = Claims {
            user_id: account.id,
            role: USER_ROLE.to_string(),
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
            sub: account.username.clone(),
            jti: token_nonce(),
        };
        let refresh_claims = Claims {
            user_id: account.id,
            role: String::new(),
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
            sub: account.username.clone(),
            jti: token_nonce(),
        };

        let header = Header::new(ALGORITHM);
        let access_token = encode(&header, &access_claims, &self.access.encoding)
            .map_err(|_| AuthError::TokenIssuance)?;
        let refresh_token = encode(&header, &refresh_claims, &self.refresh.encoding)
            .map_err(|_| AuthError::TokenIssuance)?;

        Event::TokenPairIssued.emit(&[("account_id", &account.id.to_string())]);

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
            refresh_ttl: self.refresh_ttl.num_seconds(),
        })
    }

    /// Verify an access token and return its claims
    pub fn verify_access_token(&self, token: &str) -> AuthResult<Claims> {
        self.verify(token, &self.access.decoding, "access")
    }

    /// Exchange a refresh token for a brand-new pair
    ///
    /// The account is re-read so a deleted account cannot be refreshed.
    pub fn refresh_token_pair(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.verify(refresh_token, &self.refresh.decoding, "refresh")?;

        let account = self
            .store
            .account_by_id(claims.user_id)?
            .ok_or(AuthError::AccountNotFound)?;

        self.issue_token_pair(&account)
    }

    fn verify(&self, token: &str, key: &DecodingKey, kind: &str) -> AuthResult<Claims> {
        match self.decode_claims(token, key) {
            Ok(claims) => Ok(claims),
            Err(err) => {
                let reason = if matches!(err, AuthError::TokenExpired) {
                    "expired"
                } else {
                    "invalid"
                };
                Event::TokenRejected.emit(&[("kind", kind), ("reason", reason)]);
                Err(err)
            }
        }
    }

    fn decode_claims(&self, token: &str, key: &DecodingKey) -> AuthResult<Claims> {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked below against our own clock
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let data = decode::<Claims>(token, key, &validation).map_err(|_| AuthError::TokenInvalid)?;

        if self.clock.now().timestamp() >= data.claims.exp {
            return Err(AuthError::TokenExpired);
        }
        Ok(data.claims)
    }
}

fn token_nonce() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
