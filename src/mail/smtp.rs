use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::debug;
use std::time::Duration;

use super::{MailTransport, OutgoingMail, Recipients, TransportError};

/// Connection settings for the SMTP relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender address placed in the `From` header.
    pub from: String,
    pub timeout: Duration,
}

/// `MailTransport` that hands messages to an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the relay client. Port 465 uses implicit TLS, any other port STARTTLS.
    /// Without credentials the relay is reached unauthenticated and unencrypted,
    /// which only makes sense for a local development relay.
    pub fn from_settings(settings: &SmtpSettings) -> Result<Self, TransportError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| TransportError::new(format!("Invalid sender address: {}", e)))?;

        let builder = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => {
                let builder = if settings.port == 465 {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                }
                .map_err(|e| TransportError::new(format!("Failed to create SMTP relay: {}", e)))?;
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            (None, None) => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
            _ => {
                return Err(TransportError::new(
                    "SMTP username and password must be set together",
                ))
            }
        };

        let transport = builder
            .port(settings.port)
            .timeout(Some(settings.timeout))
            .build();

        Ok(Self { transport, from })
    }
}

/// Renders `mail` as a MIME message. Mail with an HTML body becomes
/// `multipart/alternative` with the text body as the plain part.
///
/// A single recipient goes in `To`. A recipient list is sent as `Bcc` with the
/// sender in `To`, so recipients never see each other's addresses.
pub fn build_message(from: &Mailbox, mail: &OutgoingMail) -> Result<Message, TransportError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(mail.subject.clone());

    let broadcast = matches!(mail.to, Recipients::Many(_));
    if broadcast {
        builder = builder.to(from.clone());
    }
    for address in mail.to.addresses() {
        let mailbox: Mailbox = address
            .parse()
            .map_err(|e| TransportError::new(format!("Invalid recipient {}: {}", address, e)))?;
        builder = if broadcast {
            builder.bcc(mailbox)
        } else {
            builder.to(mailbox)
        };
    }

    let message = match &mail.html {
        Some(html) => {
            builder.multipart(MultiPart::alternative_plain_html(mail.text.clone(), html.clone()))
        }
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(mail.text.clone()),
    };

    message.map_err(|e| TransportError::new(format!("Failed to build message: {}", e)))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let message = build_message(&self.from, mail)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        debug!("SMTP relay accepted message: {:?}", response.code());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Mailbox {
        "Blog <no-reply@example.com>".parse().unwrap()
    }

    #[test]
    fn test_plain_message_has_single_text_part() {
        let mail = OutgoingMail::new("reader@example.com", "Hello", "Plain body");
        let message = build_message(&sender(), &mail).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: reader@example.com"));
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(!raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_html_message_is_multipart_alternative() {
        let mail = OutgoingMail::new(
            vec!["a@example.com".to_string(), "b@example.com".to_string()],
            "New Blog Post",
            "Plain body",
        )
        .with_html("<p>Rich body</p>");
        let message = build_message(&sender(), &mail).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("<p>Rich body</p>"));
    }

    #[test]
    fn test_recipient_list_is_blind_copied() {
        let mail = OutgoingMail::new(
            vec!["a@example.com".to_string(), "b@example.com".to_string()],
            "New Blog Post",
            "Plain body",
        );
        let message = build_message(&sender(), &mail).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: Blog <no-reply@example.com>"));
        assert!(!raw.contains("a@example.com"));
        assert!(!raw.contains("b@example.com"));

        let envelope: Vec<String> = message.envelope().to().iter().map(|a| a.to_string()).collect();
        assert!(envelope.contains(&"a@example.com".to_string()));
        assert!(envelope.contains(&"b@example.com".to_string()));
    }

    #[test]
    fn test_partial_credentials_are_rejected() {
        let settings = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: Some("blog@example.com".to_string()),
            password: None,
            from: "blog@example.com".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(SmtpMailer::from_settings(&settings).is_err());
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let mail = OutgoingMail::new("not an address", "Hello", "Body");
        match build_message(&sender(), &mail) {
            Err(TransportError(msg)) => assert!(msg.contains("Invalid recipient")),
            Ok(_) => panic!("Message with an invalid recipient should not build"),
        }
    }
}
