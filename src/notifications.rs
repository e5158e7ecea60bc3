//! Notification emails sent by the application, and the fire-and-forget helper
//! route handlers use to queue them.

use log::error;

use crate::mail::{OutgoingMail, Recipients};
use crate::outbox::{MessageId, Outbox};

pub fn welcome_mail(email: &str) -> OutgoingMail {
    OutgoingMail::new(
        email,
        "Welcome to Our Blog",
        "Thank you for registering with our blog platform!",
    )
    .with_html("<h1>Welcome to Our Blog</h1><p>Thank you for registering with our blog platform!</p>")
}

pub fn new_post_mail(recipients: Vec<String>, title: &str, author: &str) -> OutgoingMail {
    let text = format!("A new post \"{}\" has been created by {}", title, author);
    let html = format!(
        "<h1>New Blog Post</h1><p>A new post <strong>{}</strong> has been created by {}</p>",
        escape_html(title),
        escape_html(author)
    );
    OutgoingMail::new(Recipients::Many(recipients), "New Blog Post", text).with_html(html)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Queues `mail`, logging instead of failing. Callers continue regardless of the outcome.
pub async fn notify(outbox: &Outbox, mail: OutgoingMail) -> Option<MessageId> {
    match outbox.enqueue(mail).await {
        Ok(id) => Some(id),
        Err(err) => {
            error!("Error adding email to queue: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_welcome_mail() {
        let mail = welcome_mail("reader@example.com");
        assert_eq!(mail.to, Recipients::One("reader@example.com".into()));
        assert_eq!(mail.subject, "Welcome to Our Blog");
        assert!(mail.html.is_some());
        assert!(mail.validate().is_ok());
    }

    #[test]
    fn test_new_post_mail_escapes_html() {
        let mail = new_post_mail(
            vec!["a@example.com".into(), "b@example.com".into()],
            "<script>alert(1)</script>",
            "author@example.com",
        );
        assert_eq!(mail.to.len(), 2);
        assert_eq!(
            mail.text,
            "A new post \"<script>alert(1)</script>\" has been created by author@example.com"
        );
        let html = mail.html.unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
