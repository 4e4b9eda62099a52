//! Email Service
//!
//! Renders the email-change verification and magic sign-in messages and hands
//! them to a mail transport.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Datelike;
use lettre::{
    message::{header, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::{debug, error, info};
use regex::Regex;
use tera::{Context, Tera};
use url::Url;

use crate::config::EmailConfig;
use crate::models::verification::TOKEN_TTL_HOURS;
use crate::utils::error::{AppError, AppResult};

const VERIFY_EMAIL_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Verify your email</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1>Verify your email</h1>
    <p>Hello {{ user_name }},</p>
    <p>You asked to change the email address on your {{ app_name }} account to this one. Confirm the change by following the link below:</p>
    <p><a href="{{ link }}" style="display: inline-block; padding: 12px 24px; background: #111; color: white; text-decoration: none; border-radius: 4px;">Verify email</a></p>
    <p>The link expires in {{ expires_in_hours }} hours. If you did not ask for this, ignore this email and nothing will change.</p>
    <p style="font-size: 12px; color: #666;">&copy; {{ current_year }} {{ app_name }}</p>
</body>
</html>
"#;

const VERIFY_EMAIL_TEXT: &str = r#"
Verify your email

Hello {{ user_name }},

You asked to change the email address on your {{ app_name }} account to this one. Confirm the change by opening this link:

{{ link }}

The link expires in {{ expires_in_hours }} hours. If you did not ask for this, ignore this email and nothing will change.
"#;

const MAGIC_LINK_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Sign in to {{ app_name }}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1>Sign in to {{ app_name }}</h1>
    <p><a href="{{ link }}" style="display: inline-block; padding: 12px 24px; background: #111; color: white; text-decoration: none; border-radius: 4px;">Sign in</a></p>
    <p>The link can be used once and expires in {{ expires_in_hours }} hours. If you did not request it, you can safely ignore this email.</p>
    <p style="font-size: 12px; color: #666;">&copy; {{ current_year }} {{ app_name }}</p>
</body>
</html>
"#;

const MAGIC_LINK_TEXT: &str = r#"
Sign in to {{ app_name }}

{{ link }}

The link can be used once and expires in {{ expires_in_hours }} hours. If you did not request it, you can safely ignore this email.
"#;

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivers rendered email
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()>;
}

/// SMTP delivery via lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let builder = if config.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host).map_err(|e| {
                AppError::Configuration(format!("Failed to configure SMTP relay: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let transport = builder.port(config.smtp_port).credentials(creds).build();

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid from address: {}", e)))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .to
                .parse()
                .map_err(|e| AppError::BadRequest(format!("Invalid recipient email: {}", e)))?)
            .subject(email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(email.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(email.html),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email message: {}", e)))?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!("Email sent successfully to: {}", email.to);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", email.to, e);
                Err(AppError::ExternalService(format!("Failed to send email: {}", e)))
            }
        }
    }
}

/// Writes messages to the log instead of sending them. Used when SMTP is not
/// configured, e.g. in local development.
pub struct LogMailer;

impl LogMailer {
    /// Message text with every link token masked
    fn redacted(text: &str) -> String {
        static TOKEN_PARAM: OnceLock<Regex> = OnceLock::new();
        let regex = TOKEN_PARAM.get_or_init(|| {
            Regex::new(r"token=[^&\s]+").expect("Failed to compile token regex")
        });

        regex.replace_all(text, "token=[redacted]").into_owned()
    }
}

#[async_trait]
impl MailTransport for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        info!(
            "SMTP not configured; email to {} ({}) not delivered",
            email.to, email.subject
        );
        debug!("Undelivered email text:\n{}", Self::redacted(&email.text));
        Ok(())
    }
}

/// Email service for the messages the application sends
pub struct EmailService {
    transport: Arc<dyn MailTransport>,
    templates: Tera,
    app_name: String,
    app_base_url: String,
}

impl EmailService {
    pub fn new(transport: Arc<dyn MailTransport>, app_base_url: &str) -> AppResult<Self> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates(vec![
                ("verify_email.html", VERIFY_EMAIL_HTML),
                ("verify_email.txt", VERIFY_EMAIL_TEXT),
                ("magic_link.html", MAGIC_LINK_HTML),
                ("magic_link.txt", MAGIC_LINK_TEXT),
            ])
            .map_err(|e| AppError::Configuration(format!("Failed to add email templates: {}", e)))?;

        Ok(Self {
            transport,
            templates,
            app_name: "bookbar".to_string(),
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Link that confirms an email change
    pub fn email_change_link(&self, token: &str) -> AppResult<String> {
        self.link("/auth/verify-email", &[("token", token)])
    }

    /// Link that completes a magic-link sign-in
    pub fn magic_link(&self, email: &str, token: &str) -> AppResult<String> {
        self.link("/auth/callback/email", &[("token", token), ("email", email)])
    }

    /// Send the email-change confirmation link to the new address
    pub async fn send_email_change_verification(
        &self,
        to_email: &str,
        user_name: Option<&str>,
        token: &str,
    ) -> AppResult<()> {
        info!("Sending email change verification to: {}", to_email);

        let mut context = self.base_context(&self.email_change_link(token)?);
        context.insert("user_name", user_name.unwrap_or("there"));

        let email = OutgoingEmail {
            to: to_email.to_string(),
            subject: format!("{} | Verify your email", self.app_name),
            html: self.render("verify_email.html", &context)?,
            text: self.render("verify_email.txt", &context)?,
        };

        self.transport.send(email).await
    }

    /// Send a magic sign-in link
    pub async fn send_magic_link(&self, to_email: &str, token: &str) -> AppResult<()> {
        info!("Sending magic sign-in link to: {}", to_email);

        let context = self.base_context(&self.magic_link(to_email, token)?);

        let email = OutgoingEmail {
            to: to_email.to_string(),
            subject: format!("Sign in to {}", self.app_name),
            html: self.render("magic_link.html", &context)?,
            text: self.render("magic_link.txt", &context)?,
        };

        self.transport.send(email).await
    }

    fn link(&self, path: &str, params: &[(&str, &str)]) -> AppResult<String> {
        Url::parse_with_params(&format!("{}{}", self.app_base_url, path), params)
            .map(String::from)
            .map_err(|e| AppError::Configuration(format!("Invalid app base URL: {}", e)))
    }

    fn base_context(&self, link: &str) -> Context {
        let mut context = Context::new();
        context.insert("link", link);
        context.insert("app_name", &self.app_name);
        context.insert("expires_in_hours", &TOKEN_TTL_HOURS);
        context.insert("current_year", &chrono::Utc::now().year());
        context
    }

    fn render(&self, template: &str, context: &Context) -> AppResult<String> {
        self.templates
            .render(template, context)
            .map_err(|e| AppError::Internal(format!("Failed to render {}: {}", template, e)))
    }
}
