pub mod access;
pub mod comments;
pub mod domain;
pub mod error;
pub mod memory;
pub mod notifications;
pub mod otp;
pub mod ports;
pub mod thread;

pub use access::{AccessDecision, AccessLedger};
pub use comments::{CommentDraft, CommentStore};
pub use domain::{
    AuthSession, Comment, Document, DocumentMetadata, Grantee, NewComment, NewDocument, OtpPurpose,
    User, UserCredentials,
};
pub use error::{ConflictKind, CoreError, CoreResult};
pub use otp::{OneTimeCode, OtpVerifier};
pub use ports::{
    DatabaseService, Notification, NotificationService, PortError, PortResult,
};
pub use thread::{build_thread, ThreadNode};
