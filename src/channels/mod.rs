//! Mailbox I/O.

pub mod email;
pub mod email_types;

pub use email::{EmailClient, EmailConfig, Inbox, Outbox};
pub use email_types::{InboundEmail, OutgoingEmail};
