use cdc_protocol::ErrorNotification;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Best-effort, fire-and-forget side channel. A `notify()` failure is logged
/// by the implementation and never propagated — a flaky mail relay must
/// never affect listener behavior.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: ErrorNotification) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub notification_email: String,
}

pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, notification: &ErrorNotification) -> Result<Message, Box<dyn std::error::Error>> {
        let subject = format!("Listener Error: {} (ID: {})", notification.client_name, notification.client_id);
        let topic_line = notification.topic_name.as_deref().map(|t| format!("- Topic: {t}\n")).unwrap_or_default();
        let body = format!(
            "A listener has stopped due to an error and is no longer receiving events.\n\n\
             Client Details:\n\
             - Client ID: {}\n\
             - Client Name: {}\n\
             {topic_line}\n\
             Error Message:\n{}\n\n\
             Please check the client configuration and restart the listener once the issue is resolved.\n",
            notification.client_id, notification.client_name, notification.error_message
        );

        Message::builder()
            .from(self.config.from_email.parse::<Mailbox>()?)
            .to(self.config.notification_email.parse::<Mailbox>()?)
            .subject(subject)
            .body(body)
            .map_err(Into::into)
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&self, notification: ErrorNotification) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        let config = self.config.clone();
        Box::pin(async move {
            let message = match (SmtpNotifier { config: config.clone() }).build_message(&notification) {
                Ok(m) => m,
                Err(err) => {
                    tracing::error!(%err, "failed to build notification email");
                    return;
                }
            };

            let creds = Credentials::new(config.username.clone(), config.password.clone());
            let transport = if config.port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            };

            let transport = match transport.map(|t| t.credentials(creds).port(config.port).build()) {
                Ok(t) => t,
                Err(err) => {
                    tracing::error!(%err, "failed to build smtp transport for listener error notification");
                    return;
                }
            };

            match transport.send(message).await {
                Ok(_) => tracing::info!(client_id = notification.client_id, "sent listener error notification email"),
                Err(err) => tracing::error!(client_id = notification.client_id, %err, "failed to send listener error notification email"),
            }
        })
    }
}

/// Used when SMTP settings are absent, matching the source's `EMAIL_ENABLED`
/// gate: notifications are silently skipped rather than the listener
/// treating the missing config as an error.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, notification: ErrorNotification) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
            tracing::warn!(
                client_id = notification.client_id,
                "email notifications are not configured - cannot send notification"
            );
        })
    }
}

pub fn notifier_from_env() -> Box<dyn Notifier> {
    let host = std::env::var("SMTP_HOST").ok();
    let user = std::env::var("SMTP_USER").ok();
    let password = std::env::var("SMTP_PASSWORD").ok();
    let notification_email = std::env::var("NOTIFICATION_EMAIL").ok();

    match (host, user, password, notification_email) {
        (Some(host), Some(user), Some(password), Some(notification_email)) => {
            let port: u16 = std::env::var("SMTP_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(465);
            let from_email = std::env::var("SMTP_FROM_EMAIL").unwrap_or_else(|_| user.clone());
            Box::new(SmtpNotifier::new(SmtpConfig {
                host,
                port,
                username: user,
                password,
                from_email,
                notification_email,
            }))
        }
        _ => Box::new(NullNotifier),
    }
}
