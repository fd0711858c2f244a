//! Email service for password reset links.
//!
//! Uses SMTP via lettre. When SMTP is not configured the API runs without
//! an `EmailService` and reset links are logged instead (see
//! [`deliver_password_reset`]).

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay can't be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if the message can't be built or delivered.
    pub async fn send_password_reset(&self, to: &str, reset_url: &str) -> Result<(), EmailError> {
        let (text, html) = password_reset_bodies(reset_url);
        self.send_multipart_email(to, "Reset your Vastra password", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Plain text and HTML bodies of the reset email. The URL only contains
/// URL-safe characters, so it is embedded without escaping.
fn password_reset_bodies(reset_url: &str) -> (String, String) {
    let text = format!(
        "We received a request to reset your Vastra password.\n\n\
         Open this link within one hour to choose a new one:\n{reset_url}\n\n\
         If you didn't ask for this, you can ignore this email."
    );
    let html = format!(
        "<p>We received a request to reset your Vastra password.</p>\
         <p><a href=\"{reset_url}\">Choose a new password</a> (valid for one hour).</p>\
         <p>If you didn't ask for this, you can ignore this email.</p>"
    );
    (text, html)
}

/// Deliver a reset link by email, or log it when mail is not configured.
///
/// Delivery failures are logged and swallowed: the forgot-password
/// endpoint answers the same way whether or not the account exists.
pub async fn deliver_password_reset(email: Option<&EmailService>, to: &str, reset_url: &str) {
    match email {
        Some(service) => {
            if let Err(e) = service.send_password_reset(to, reset_url).await {
                let event_id = sentry::capture_error(&e);
                tracing::error!(error = %e, sentry_event_id = %event_id, "Failed to send reset email");
            }
        }
        None => {
            tracing::info!(to = %to, reset_url = %reset_url, "SMTP not configured, password reset link");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_bodies_contain_link() {
        let url = "https://vastra.test/reset-password?token=abc_123";
        let (text, html) = password_reset_bodies(url);
        assert!(text.contains(url));
        assert!(html.contains(&format!("href=\"{url}\"")));
    }
}
