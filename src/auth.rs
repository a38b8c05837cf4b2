//! The request-a-code / redeem-a-code workflow for signup and signin.
//!
//! Per email the lifecycle is: no challenge, then a challenge issued by
//! a code request, then either consumed by a successful redemption or
//! abandoned to expire in place. Redemption failures (wrong code, bad
//! purpose) leave the challenge untouched; only success removes it.

use crate::challenge::{Challenge, ChallengeStore, InMemoryChallengeStore, NewAccount, Purpose};
use crate::errors::AuthError;
use crate::mailer::Mailer;
use crate::otp;
use crate::storage::{self, Account};
use crate::token::{SessionClaims, TokenIssuer};
use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;

/// Outcome of a successful redemption: the signed session token plus
/// the claims echoed back in the response body.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub claims: SessionClaims,
}

/// Orchestrates code generation, the pending-challenge store, account
/// persistence, mail delivery and token issuance. The store is injected
/// so deployments can swap the in-memory default for something
/// external.
#[derive(Clone)]
pub struct AuthService<S: ChallengeStore = InMemoryChallengeStore> {
    db: DatabaseConnection,
    store: S,
    issuer: TokenIssuer,
    mailer: Mailer,
    otp_ttl: Duration,
}

impl AuthService {
    pub fn new(
        db: DatabaseConnection,
        issuer: TokenIssuer,
        mailer: Mailer,
        otp_ttl_secs: u64,
    ) -> Self {
        Self::with_store(db, issuer, mailer, InMemoryChallengeStore::new(), otp_ttl_secs)
    }
}

impl<S: ChallengeStore> AuthService<S> {
    pub fn with_store(
        db: DatabaseConnection,
        issuer: TokenIssuer,
        mailer: Mailer,
        store: S,
        otp_ttl_secs: u64,
    ) -> Self {
        Self {
            db,
            store,
            issuer,
            mailer,
            otp_ttl: Duration::seconds(otp_ttl_secs as i64),
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Start a registration: reject if an account already exists, then
    /// store a "register" challenge carrying the profile fields and
    /// mail the code. Returns the normalized email the code went to.
    ///
    /// Overwrites any prior challenge for this email, whatever its
    /// purpose: requesting again invalidates the previous code.
    pub async fn request_signup_code(
        &self,
        full_name: Option<&str>,
        dob: Option<&str>,
        email: Option<&str>,
    ) -> Result<String, AuthError> {
        let (full_name, dob, email) = match (
            none_if_blank(full_name),
            none_if_blank(dob),
            none_if_blank(email),
        ) {
            (Some(f), Some(d), Some(e)) => (f, d, e),
            _ => {
                return Err(AuthError::InvalidRequest(
                    "Full name, Date of Birth, and Email are required.".to_string(),
                ))
            }
        };
        let email = normalize_email(email);

        if storage::find_account_by_email(&self.db, &email)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(
                "User with this email already exists.".to_string(),
            ));
        }

        let code = otp::generate();
        self.store.put(
            email.clone(),
            Challenge {
                code: code.clone(),
                expires_at: Utc::now() + self.otp_ttl,
                purpose: Purpose::Register,
                payload: Some(NewAccount {
                    full_name: full_name.to_string(),
                    dob: dob.to_string(),
                    email: email.clone(),
                }),
            },
        );
        tracing::debug!(%email, "stored signup challenge");
        self.deliver_code(&email, &code, Purpose::Register).await;

        Ok(email)
    }

    /// Redeem a registration code: create the deferred account, consume
    /// the challenge and issue a session.
    pub async fn verify_signup(
        &self,
        email: Option<&str>,
        code: Option<&str>,
    ) -> Result<SignedIn, AuthError> {
        let (email, code) = required_email_and_code(email, code)?;

        let challenge = match self.store.get(&email) {
            Some(c) if c.purpose == Purpose::Register => c,
            _ => {
                return Err(AuthError::InvalidRequest(
                    "No pending signup verification for this email or invalid type.".to_string(),
                ))
            }
        };

        if !otp::verify(&challenge.code, &code, challenge.expires_at) {
            // The challenge stays put; the right code is still usable
            // until it expires.
            return Err(AuthError::Unauthorized(
                "Invalid or expired OTP.".to_string(),
            ));
        }

        let payload = challenge.payload.ok_or_else(|| {
            AuthError::Internal("User data missing for signup completion.".to_string())
        })?;

        let account = match storage::create_account(&self.db, &payload).await {
            Ok(account) => account,
            Err(AuthError::Conflict(_)) => {
                // A concurrent registration for the same email won the
                // insert. The challenge is left in place.
                return Err(AuthError::Conflict(
                    "User with this email already exists after verification.".to_string(),
                ));
            }
            Err(other) => return Err(other),
        };

        if self.store.remove(&email).is_none() {
            // Lost the delete race: someone consumed this challenge
            // between our get and remove.
            return Err(AuthError::InvalidRequest(
                "No pending signup verification for this email or invalid type.".to_string(),
            ));
        }

        tracing::info!(%email, "signup verified, account created");
        self.issue_session(&account)
    }

    /// Start a signin: the account must exist, then a "login" challenge
    /// (no payload) is stored and the code mailed. Returns the
    /// normalized email the code went to.
    pub async fn request_signin_code(&self, email: Option<&str>) -> Result<String, AuthError> {
        let Some(email) = none_if_blank(email) else {
            return Err(AuthError::InvalidRequest("Email is required.".to_string()));
        };
        let email = normalize_email(email);

        if storage::find_account_by_email(&self.db, &email)
            .await?
            .is_none()
        {
            return Err(AuthError::NotFound(
                "User not found. Please sign up first.".to_string(),
            ));
        }

        let code = otp::generate();
        self.store.put(
            email.clone(),
            Challenge {
                code: code.clone(),
                expires_at: Utc::now() + self.otp_ttl,
                purpose: Purpose::Login,
                payload: None,
            },
        );
        tracing::debug!(%email, "stored signin challenge");
        self.deliver_code(&email, &code, Purpose::Login).await;

        Ok(email)
    }

    /// Redeem a login code: consume the challenge and issue a session
    /// for the existing account.
    pub async fn verify_signin(
        &self,
        email: Option<&str>,
        code: Option<&str>,
    ) -> Result<SignedIn, AuthError> {
        let (email, code) = required_email_and_code(email, code)?;

        let challenge = match self.store.get(&email) {
            Some(c) if c.purpose == Purpose::Login => c,
            _ => {
                return Err(AuthError::InvalidRequest(
                    "No pending signin verification for this email or invalid type.".to_string(),
                ))
            }
        };

        if !otp::verify(&challenge.code, &code, challenge.expires_at) {
            return Err(AuthError::Unauthorized(
                "Invalid or expired OTP.".to_string(),
            ));
        }

        let Some(account) = storage::find_account_by_email(&self.db, &email).await? else {
            // Account gone since the code request; the challenge is
            // left in place.
            return Err(AuthError::NotFound(
                "User not found after OTP verification.".to_string(),
            ));
        };

        if self.store.remove(&email).is_none() {
            return Err(AuthError::InvalidRequest(
                "No pending signin verification for this email or invalid type.".to_string(),
            ));
        }

        tracing::info!(%email, "signin verified");
        self.issue_session(&account)
    }

    fn issue_session(&self, account: &Account) -> Result<SignedIn, AuthError> {
        let claims = SessionClaims {
            email: account.email.clone(),
            full_name: account.full_name.clone(),
        };
        let token = self.issuer.issue(&claims)?;
        Ok(SignedIn { token, claims })
    }

    /// Mail the code. Delivery failure is logged, never escalated: the
    /// request that triggered it still succeeds.
    async fn deliver_code(&self, email: &str, code: &str, purpose: Purpose) {
        let (subject, flow) = match purpose {
            Purpose::Register => ("Your Signup OTP", "signup"),
            Purpose::Login => ("Your Signin OTP", "signin"),
        };
        let minutes = self.otp_ttl.num_minutes();
        let text = format!("Your OTP for {flow} is: {code}. It is valid for {minutes} minutes.");

        if let Err(error) = self.mailer.send(email, subject, &text).await {
            tracing::warn!(%email, %flow, %error, "failed to deliver one-time code");
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn none_if_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn required_email_and_code(
    email: Option<&str>,
    code: Option<&str>,
) -> Result<(String, String), AuthError> {
    match (none_if_blank(email), none_if_blank(code)) {
        (Some(e), Some(c)) => Ok((normalize_email(e), c.to_string())),
        _ => Err(AuthError::InvalidRequest(
            "Email and OTP are required.".to_string(),
        )),
    }
}
