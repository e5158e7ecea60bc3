//!
//! # Outgoing Mail
//!
//! Types describing a notification email and the `MailTransport` trait that
//! delivers one. The SMTP implementation lives in `smtp`.

pub mod smtp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

pub use smtp::{SmtpMailer, SmtpSettings};

/// One address or an ordered list of addresses.
///
/// Serialized untagged, so a single recipient is a plain JSON string and several
/// recipients are a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            Recipients::One(address) => vec![address.as_str()],
            Recipients::Many(addresses) => addresses.iter().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Recipients::One(_) => 1,
            Recipients::Many(addresses) => addresses.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Recipients::One(address.to_string())
    }
}

impl From<String> for Recipients {
    fn from(address: String) -> Self {
        Recipients::One(address)
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addresses: Vec<String>) -> Self {
        Recipients::Many(addresses)
    }
}

fn validate_recipients(recipients: &Recipients) -> Result<(), ValidationError> {
    if recipients.is_empty() {
        return Err(ValidationError::new("no_recipients"));
    }
    if recipients
        .addresses()
        .iter()
        .any(|address| !validator::validate_email(*address))
    {
        return Err(ValidationError::new("invalid_recipient"));
    }
    Ok(())
}

/// A fully composed notification email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OutgoingMail {
    #[validate(custom = "validate_recipients")]
    pub to: Recipients,
    #[validate(length(min = 1, max = 998))]
    pub subject: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl OutgoingMail {
    pub fn new(to: impl Into<Recipients>, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            html: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

/// Delivery failure reported by a `MailTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        TransportError(msg.into())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Mail transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// Delivers a composed email. Success means the relay accepted the message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipients_deserialize_from_string_or_list() {
        let one: Recipients = serde_json::from_str(r#""a@example.com""#).unwrap();
        assert_eq!(one, Recipients::One("a@example.com".into()));

        let many: Recipients = serde_json::from_str(r#"["a@example.com","b@example.com"]"#).unwrap();
        assert_eq!(many.addresses(), vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_outgoing_mail_validation() {
        let valid = OutgoingMail::new("reader@example.com", "Hello", "Body").with_html("<p>Body</p>");
        assert!(valid.validate().is_ok());

        let no_recipients = OutgoingMail::new(Vec::<String>::new(), "Hello", "Body");
        assert!(no_recipients.validate().is_err());

        let bad_address = OutgoingMail::new(
            vec!["reader@example.com".to_string(), "not-an-address".to_string()],
            "Hello",
            "Body",
        );
        assert!(bad_address.validate().is_err());

        let empty_subject = OutgoingMail::new("reader@example.com", "", "Body");
        assert!(empty_subject.validate().is_err());
    }
}
