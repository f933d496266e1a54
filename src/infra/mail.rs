//! SMTP delivery through lettre's async tokio transport.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::mail::{MailError, Mailer, OutgoingMail, SuppressedMailer};
use crate::config::MailSettings;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let sender = parse_mailbox(&settings.default_sender)?;

        let mut builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
                .map_err(|err| MailError::Transport(err.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        }
        .port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = build_message(&self.sender, &mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;
        info!(
            target = "storefront::mail",
            to = %mail.to,
            subject = %mail.subject,
            "mail sent"
        );
        Ok(())
    }
}

/// Pick the mailer for the configured delivery mode.
pub fn build_mailer(settings: &MailSettings) -> Result<Arc<dyn Mailer>, MailError> {
    if settings.suppress_send {
        warn!(
            target = "storefront::mail",
            "mail delivery suppressed; messages are only logged"
        );
        return Ok(Arc::new(SuppressedMailer::new()));
    }
    Ok(Arc::new(SmtpMailer::new(settings)?))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|err| MailError::Address {
        address: address.to_string(),
        reason: err.to_string(),
    })
}

fn build_message(sender: &Mailbox, mail: &OutgoingMail) -> Result<Message, MailError> {
    Message::builder()
        .from(sender.clone())
        .to(parse_mailbox(&mail.to)?)
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|err| MailError::Build(err.to_string()))
}
