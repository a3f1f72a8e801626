//! crates/codoc_core/src/notifications.rs
//!
//! Composes the plain-text messages the core sends, and delivers them with
//! failures isolated from the operation that triggered them.

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Document, User};
use crate::ports::{Notification, NotificationService};

/// Builds the link a grantee follows to open a shared document.
pub fn collaboration_link(base_url: &str, document_id: Uuid, share_token: &str) -> String {
    format!(
        "{}/pdf/collaborate/{}/{}",
        base_url.trim_end_matches('/'),
        document_id,
        share_token
    )
}

pub fn access_granted(grantee: &User, granter: &User, document: &Document, link: &str) -> Notification {
    Notification {
        to: grantee.email.clone(),
        subject: "You've Been Granted Access to a PDF Document".to_string(),
        body: format!(
            "Dear {},\n\n{} has granted you access to the following PDF document:\n\nTitle: {}\n\nOpen it here:\n{}\n\nBest regards,\nTeam CoDoc",
            grantee.name, granter.name, document.metadata.name, link
        ),
    }
}

pub fn access_revoked(grantee: &User, revoker: &User, document: &Document) -> Notification {
    Notification {
        to: grantee.email.clone(),
        subject: "Your Access to a PDF Document Has Been Revoked".to_string(),
        body: format!(
            "Dear {},\n\nYour access to the following PDF document has been removed by {}:\n\nTitle: {}\n\nYou will no longer be able to view or collaborate on this document.\n\nBest regards,\nTeam CoDoc",
            grantee.name, revoker.name, document.metadata.name
        ),
    }
}

pub fn verification_code(user: &User, code: &str, valid_for: Duration) -> Notification {
    Notification {
        to: user.email.clone(),
        subject: "CoDoc Account Verification".to_string(),
        body: format!(
            "Hi {},\n\nUse this code to verify your email address: {}\n\nThe code expires in {}.\n\nTeam CoDoc",
            user.name,
            code,
            describe(valid_for)
        ),
    }
}

pub fn password_reset_code(user: &User, code: &str, valid_for: Duration) -> Notification {
    Notification {
        to: user.email.clone(),
        subject: "Password Reset OTP".to_string(),
        body: format!(
            "Hello {},\n\nYou requested a password reset. Use this code to proceed: {}\n\nThe code is valid for {}. If you didn't request this, you can ignore this email.\n\nTeam CoDoc",
            user.name,
            code,
            describe(valid_for)
        ),
    }
}

pub fn welcome(user: &User) -> Notification {
    Notification {
        to: user.email.clone(),
        subject: "Welcome to CoDoc".to_string(),
        body: format!(
            "Hello {},\n\nThank you for signing up! We have created your account with email id: {}\n\nBest regards,\nTeam CoDoc",
            user.name, user.email
        ),
    }
}

fn describe(duration: Duration) -> String {
    if duration.num_hours() >= 1 && duration.num_minutes() % 60 == 0 {
        format!("{} hours", duration.num_hours())
    } else {
        format!("{} minutes", duration.num_minutes())
    }
}

/// Sends a notification and reports whether it went out. A failure is
/// logged and swallowed; it never undoes data that was already written.
pub async fn deliver(notifier: &dyn NotificationService, notification: Notification) -> bool {
    let to = notification.to.clone();
    let subject = notification.subject.clone();
    match notifier.send(notification).await {
        Ok(()) => {
            info!(%to, %subject, "notification sent");
            true
        }
        Err(e) => {
            warn!(%to, %subject, error = %e, "notification failed; continuing");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaboration_link_tolerates_trailing_slash() {
        let id = Uuid::nil();
        assert_eq!(
            collaboration_link("https://codoc.app/", id, "abc123"),
            format!("https://codoc.app/pdf/collaborate/{}/abc123", id)
        );
        assert_eq!(
            collaboration_link("https://codoc.app", id, "abc123"),
            collaboration_link("https://codoc.app/", id, "abc123")
        );
    }

    #[test]
    fn durations_are_described_in_whole_units() {
        assert_eq!(describe(Duration::hours(24)), "24 hours");
        assert_eq!(describe(Duration::minutes(15)), "15 minutes");
        assert_eq!(describe(Duration::minutes(90)), "90 minutes");
    }
}
