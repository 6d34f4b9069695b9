pub mod templates;

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::models::OverdueCheckout;

/// A rendered-on-send message handed to a [`Notifier`].
#[derive(Debug, Clone)]
pub enum Notification {
    OverdueReport {
        as_of: NaiveDate,
        checkouts: Vec<OverdueCheckout>,
    },
    PasswordReset {
        reset_url: String,
    },
    TemporaryPassword {
        password: String,
    },
    VerifyEmail {
        verify_url: String,
    },
}

impl Notification {
    pub fn template(&self) -> &'static str {
        match self {
            Notification::OverdueReport { .. } => "overdue_report",
            Notification::PasswordReset { .. } => "password_reset",
            Notification::TemporaryPassword { .. } => "temporary_password",
            Notification::VerifyEmail { .. } => "verify_email",
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::OverdueReport { checkouts, .. } => {
                format!("Overdue Books Report ({} overdue)", checkouts.len())
            }
            Notification::PasswordReset { .. } => "Password Reset - Shelfkeeper".to_string(),
            Notification::TemporaryPassword { .. } => "Your Temporary Password - Shelfkeeper".to_string(),
            Notification::VerifyEmail { .. } => "Verify Email - Shelfkeeper".to_string(),
        }
    }

    pub fn render_html(&self) -> Result<String, askama::Error> {
        match self {
            Notification::OverdueReport { as_of, checkouts } => {
                templates::render_overdue_report(*as_of, checkouts)
            }
            Notification::PasswordReset { reset_url } => templates::render_password_reset(reset_url),
            Notification::TemporaryPassword { password } => {
                templates::render_temporary_password(password)
            }
            Notification::VerifyEmail { verify_url } => templates::render_verify_email(verify_url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Outbound delivery of notifications. Failures are reported, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipients: &[String], notification: &Notification) -> Result<(), NotifyError>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, recipients: &[String], notification: &Notification) -> Result<(), NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError("No recipients".to_string()));
        }

        let mut builder = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| NotifyError(format!("Invalid from address: {e}")))?,
            )
            .subject(notification.subject())
            .header(ContentType::TEXT_HTML);

        for to in recipients {
            builder = builder.to(to
                .parse()
                .map_err(|e| NotifyError(format!("Invalid to address '{to}': {e}")))?);
        }

        let message = builder
            .body(
                notification
                    .render_html()
                    .map_err(|e| NotifyError(format!("Failed to render email: {e}")))?,
            )
            .map_err(|e| NotifyError(format!("Failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError(format!("Failed to send email: {e}")))?;

        tracing::info!(
            template = notification.template(),
            recipients = recipients.len(),
            "Email sent"
        );
        Ok(())
    }
}

/// Used when no SMTP relay is configured: the notification is written to the
/// log instead of being delivered.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipients: &[String], notification: &Notification) -> Result<(), NotifyError> {
        tracing::warn!(
            template = notification.template(),
            subject = %notification.subject(),
            recipients = ?recipients,
            "SMTP not configured, notification not delivered"
        );
        match notification.render_html() {
            Ok(body) => tracing::debug!(%body, "Undelivered notification body"),
            Err(e) => tracing::warn!("Failed to render undelivered notification: {e}"),
        }
        Ok(())
    }
}
