use std::future::Future;

use handlebars::Handlebars;
use lettre::{
    Message, SmtpTransport, Transport,
    message::{SinglePart, header},
    transport::smtp::authentication::Credentials,
};

use crate::config::EmailConfig;

pub type MailError = Box<dyn std::error::Error + Send + Sync>;

/// Outbound email transport
///
/// The notification worker only depends on this trait, so tests can swap
/// SMTP for a recorder.
pub trait Mailer: Send + Sync + 'static {
    fn send(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// Render a Handlebars template against `vars`
///
/// `{{name}}` expressions are HTML-escaped; a variable missing from `vars`
/// is an error rather than an empty string.
pub fn render_template(template: &str, vars: &serde_json::Value) -> Result<String, MailError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars
        .render_template(template, vars)
        .map_err(|e| format!("template render failed: {}", e).into())
}

/// SMTP mailer over a STARTTLS relay
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
        // STARTTLS: starts unencrypted, upgrades to TLS
        let transport = SmtpTransport::starttls_relay(&config.smtp_server)?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        Ok(SmtpMailer {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, to_email: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(header::ContentType::TEXT_HTML)
            .singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_HTML)
                    .body(html_body.to_string()),
            )?;

        // lettre's SmtpTransport is blocking; keep it off the async workers
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&email)).await??;

        Ok(())
    }
}
