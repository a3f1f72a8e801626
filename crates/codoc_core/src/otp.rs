//! crates/codoc_core/src/otp.rs
//!
//! One-time codes for email verification and password reset.
//!
//! Each user has one independent code per [`OtpPurpose`]. A code moves through
//! `NoneIssued -> Active -> Consumed`; issuing again from any state replaces
//! whatever was there. Only an `Active`, unexpired code whose value matches
//! can be consumed.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{OtpPurpose, User};
use crate::error::{ConflictKind, CoreError, CoreResult};
use crate::notifications;
use crate::ports::{DatabaseService, NotificationService};

/// How long a freshly issued code stays valid.
pub fn code_lifetime(purpose: OtpPurpose) -> Duration {
    match purpose {
        OtpPurpose::VerifyEmail => Duration::hours(24),
        OtpPurpose::ResetPassword => Duration::minutes(15),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OneTimeCode {
    #[default]
    NoneIssued,
    Active {
        code: String,
        expires_at: DateTime<Utc>,
    },
    Consumed,
}

impl OneTimeCode {
    /// Draws a 6-digit code, uniform over 000000..=999999.
    pub fn issue<R: Rng + ?Sized>(rng: &mut R, purpose: OtpPurpose, now: DateTime<Utc>) -> Self {
        let value: u32 = rng.gen_range(0..1_000_000);
        OneTimeCode::Active {
            code: format!("{:06}", value),
            expires_at: now + code_lifetime(purpose),
        }
    }

    /// Checks `supplied` against the code without changing state.
    pub fn check(&self, supplied: &str, now: DateTime<Utc>) -> CoreResult<()> {
        match self {
            OneTimeCode::NoneIssued | OneTimeCode::Consumed => Err(CoreError::Mismatch),
            OneTimeCode::Active { expires_at, .. } if now > *expires_at => Err(CoreError::Expired),
            OneTimeCode::Active { code, .. } if code.is_empty() || code != supplied => {
                Err(CoreError::Mismatch)
            }
            OneTimeCode::Active { .. } => Ok(()),
        }
    }

    /// Checks `supplied` and, on a match, moves to `Consumed`.
    pub fn consume(&mut self, supplied: &str, now: DateTime<Utc>) -> CoreResult<()> {
        self.check(supplied, now)?;
        *self = OneTimeCode::Consumed;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        matches!(self, OneTimeCode::Active { .. })
    }
}

//=========================================================================================
// The Verifier Service
//=========================================================================================

/// Issues and checks codes, and applies their effects.
#[derive(Clone)]
pub struct OtpVerifier {
    db: Arc<dyn DatabaseService>,
    notifier: Arc<dyn NotificationService>,
}

impl OtpVerifier {
    pub fn new(db: Arc<dyn DatabaseService>, notifier: Arc<dyn NotificationService>) -> Self {
        Self { db, notifier }
    }

    /// Issues a new code for `user`, replacing any previous one, and mails it.
    pub async fn issue_at(&self, user: &User, purpose: OtpPurpose, now: DateTime<Utc>) -> CoreResult<()> {
        let code = OneTimeCode::issue(&mut rand::thread_rng(), purpose, now);
        self.db.put_one_time_code(user.id, purpose, &code).await?;

        if let OneTimeCode::Active { code, .. } = &code {
            let lifetime = code_lifetime(purpose);
            let message = match purpose {
                OtpPurpose::VerifyEmail => notifications::verification_code(user, code, lifetime),
                OtpPurpose::ResetPassword => notifications::password_reset_code(user, code, lifetime),
            };
            notifications::deliver(self.notifier.as_ref(), message).await;
        }
        info!(user_id = %user.id, purpose = purpose.as_str(), "one-time code issued");
        Ok(())
    }

    /// Consumes the user's code for `purpose` if `supplied` matches.
    pub async fn verify_at(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        supplied: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut code = self.db.get_one_time_code(user_id, purpose).await?;
        code.consume(supplied, now)?;
        self.db.put_one_time_code(user_id, purpose, &code).await?;
        Ok(())
    }

    pub async fn send_verification_code(&self, user_id: Uuid) -> CoreResult<()> {
        let user = self.db.get_user_by_id(user_id).await?;
        if user.is_account_verified {
            return Err(CoreError::Conflict(ConflictKind::AlreadyVerified));
        }
        self.issue_at(&user, OtpPurpose::VerifyEmail, Utc::now()).await
    }

    pub async fn verify_email(&self, user_id: Uuid, supplied: &str) -> CoreResult<()> {
        self.verify_email_at(user_id, supplied, Utc::now()).await
    }

    pub async fn verify_email_at(&self, user_id: Uuid, supplied: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let user = self.db.get_user_by_id(user_id).await?;
        if user.is_account_verified {
            return Err(CoreError::Conflict(ConflictKind::AlreadyVerified));
        }
        self.verify_at(user_id, OtpPurpose::VerifyEmail, supplied, now).await?;
        self.db.mark_account_verified(user_id).await?;
        info!(%user_id, "email verified");
        Ok(())
    }

    /// Unknown emails succeed silently so the endpoint cannot be used to
    /// probe for registered accounts.
    pub async fn send_reset_code(&self, email: &str) -> CoreResult<()> {
        match self.db.find_user_by_email(email).await? {
            Some(user) => self.issue_at(&user, OtpPurpose::ResetPassword, Utc::now()).await,
            None => {
                debug!("password reset requested for an unknown email");
                Ok(())
            }
        }
    }

    pub async fn reset_password(&self, email: &str, supplied: &str, new_password_hash: &str) -> CoreResult<()> {
        self.reset_password_at(email, supplied, new_password_hash, Utc::now()).await
    }

    pub async fn reset_password_at(
        &self,
        email: &str,
        supplied: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let user = self
            .db
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| CoreError::not_found("User not found"))?;
        self.verify_at(user.id, OtpPurpose::ResetPassword, supplied, now).await?;
        self.db.update_password(user.id, new_password_hash).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryDatabase, InMemoryOutbox};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn active(code: &str, expires_at: DateTime<Utc>) -> OneTimeCode {
        OneTimeCode::Active {
            code: code.to_string(),
            expires_at,
        }
    }

    #[test]
    fn issued_codes_are_six_digits_with_the_purpose_lifetime() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            match OneTimeCode::issue(&mut rng, OtpPurpose::ResetPassword, now) {
                OneTimeCode::Active { code, expires_at } => {
                    assert_eq!(code.len(), 6);
                    assert!(code.chars().all(|c| c.is_ascii_digit()));
                    assert_eq!(expires_at, now + Duration::minutes(15));
                }
                other => panic!("expected an active code, got {:?}", other),
            }
        }
        let verify = OneTimeCode::issue(&mut rng, OtpPurpose::VerifyEmail, now);
        assert!(matches!(verify, OneTimeCode::Active { expires_at, .. } if expires_at == now + Duration::hours(24)));
    }

    #[test]
    fn never_issued_and_consumed_codes_mismatch() {
        let now = Utc::now();
        assert!(matches!(OneTimeCode::NoneIssued.check("123456", now), Err(CoreError::Mismatch)));
        assert!(matches!(OneTimeCode::NoneIssued.check("", now), Err(CoreError::Mismatch)));

        let mut code = active("123456", now + Duration::minutes(5));
        code.consume("123456", now).unwrap();
        assert_eq!(code, OneTimeCode::Consumed);
        assert!(matches!(code.consume("123456", now), Err(CoreError::Mismatch)));
    }

    #[test]
    fn expiry_wins_over_a_matching_value() {
        let now = Utc::now();
        let mut code = active("654321", now - Duration::seconds(1));
        assert!(matches!(code.consume("654321", now), Err(CoreError::Expired)));
        assert!(code.is_active());
    }

    #[test]
    fn the_expiry_instant_itself_is_still_valid() {
        let now = Utc::now();
        assert!(active("000042", now).check("000042", now).is_ok());
    }

    #[test]
    fn wrong_or_empty_values_mismatch_without_consuming() {
        let now = Utc::now();
        let mut code = active("111111", now + Duration::minutes(1));
        assert!(matches!(code.consume("111112", now), Err(CoreError::Mismatch)));
        assert!(matches!(code.consume("", now), Err(CoreError::Mismatch)));
        assert!(code.is_active());
    }

    #[test]
    fn an_empty_stored_code_never_matches() {
        let now = Utc::now();
        assert!(matches!(active("", now + Duration::minutes(1)).check("", now), Err(CoreError::Mismatch)));
    }

    async fn setup() -> (Arc<InMemoryDatabase>, Arc<InMemoryOutbox>, OtpVerifier, User) {
        let db = Arc::new(InMemoryDatabase::new());
        let outbox = Arc::new(InMemoryOutbox::new());
        let verifier = OtpVerifier::new(db.clone(), outbox.clone());
        let user = db.create_user("Ada", "ada@example.com", "hash").await.unwrap();
        (db, outbox, verifier, user)
    }

    fn mailed_code(outbox: &InMemoryOutbox) -> String {
        let last = outbox.sent().pop().expect("a code should have been mailed");
        last.body
            .split(|c: char| !c.is_ascii_digit())
            .find(|chunk| chunk.len() == 6)
            .expect("message carries a 6-digit code")
            .to_string()
    }

    #[tokio::test]
    async fn reissuing_invalidates_the_previous_code() {
        let (db, outbox, verifier, user) = setup().await;
        let now = Utc::now();

        // Issued codes are all digits, so this one can never be drawn again.
        let stale = active("stale1", now + Duration::minutes(10));
        db.put_one_time_code(user.id, OtpPurpose::ResetPassword, &stale)
            .await
            .unwrap();
        verifier.issue_at(&user, OtpPurpose::ResetPassword, now).await.unwrap();
        let second = mailed_code(&outbox);

        let err = verifier
            .verify_at(user.id, OtpPurpose::ResetPassword, "stale1", now)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Mismatch));
        verifier
            .verify_at(user.id, OtpPurpose::ResetPassword, &second, now)
            .await
            .unwrap();
        assert_eq!(
            db.get_one_time_code(user.id, OtpPurpose::ResetPassword).await.unwrap(),
            OneTimeCode::Consumed
        );
    }

    #[tokio::test]
    async fn purposes_are_independent() {
        let (_db, outbox, verifier, user) = setup().await;
        let now = Utc::now();

        verifier.issue_at(&user, OtpPurpose::VerifyEmail, now).await.unwrap();
        let code = mailed_code(&outbox);

        let err = verifier
            .verify_at(user.id, OtpPurpose::ResetPassword, &code, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Mismatch));
        verifier.verify_at(user.id, OtpPurpose::VerifyEmail, &code, now).await.unwrap();
    }

    #[tokio::test]
    async fn verifying_email_marks_the_account_and_cannot_replay() {
        let (db, outbox, verifier, user) = setup().await;

        verifier.send_verification_code(user.id).await.unwrap();
        let code = mailed_code(&outbox);
        verifier.verify_email(user.id, &code).await.unwrap();
        assert!(db.get_user_by_id(user.id).await.unwrap().is_account_verified);

        let err = verifier.verify_email(user.id, &code).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictKind::AlreadyVerified)));
        let err = verifier.send_verification_code(user.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ConflictKind::AlreadyVerified)));
    }

    #[tokio::test]
    async fn expired_reset_code_leaves_the_password_alone() {
        let (db, outbox, verifier, user) = setup().await;
        let issued = Utc::now();

        verifier.issue_at(&user, OtpPurpose::ResetPassword, issued).await.unwrap();
        let code = mailed_code(&outbox);

        let later = issued + Duration::minutes(16);
        let err = verifier
            .reset_password_at(&user.email, &code, "new-hash", later)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Expired));
        let creds = db.get_credentials_by_email(&user.email).await.unwrap();
        assert_eq!(creds.hashed_password, "hash");

        verifier
            .reset_password_at(&user.email, &code, "new-hash", issued + Duration::minutes(10))
            .await
            .unwrap();
        let creds = db.get_credentials_by_email(&user.email).await.unwrap();
        assert_eq!(creds.hashed_password, "new-hash");
    }

    #[tokio::test]
    async fn reset_code_for_unknown_email_is_silent() {
        let (_db, outbox, verifier, _user) = setup().await;
        verifier.send_reset_code("nobody@example.com").await.unwrap();
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn mail_failure_does_not_lose_the_code() {
        let db = Arc::new(InMemoryDatabase::new());
        let outbox = Arc::new(InMemoryOutbox::failing());
        let verifier = OtpVerifier::new(db.clone(), outbox.clone());
        let user = db.create_user("Bo", "bo@example.com", "hash").await.unwrap();

        verifier.send_verification_code(user.id).await.unwrap();
        assert!(db
            .get_one_time_code(user.id, OtpPurpose::VerifyEmail)
            .await
            .unwrap()
            .is_active());
    }
}
