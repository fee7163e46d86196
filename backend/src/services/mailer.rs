use anyhow::Result;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::{config::SmtpConfig, models::invite::Invitation};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InviteMailer: Send + Sync {
    async fn send_invite(&self, invite: &Invitation, to: &Mailbox, base_url: &str) -> Result<()>;
}

/// Returns the mailbox only for addresses that parse.
pub fn parse_recipient(email: &str, name: &str) -> Option<Mailbox> {
    let address = email.trim().parse().ok()?;
    let name = (!name.trim().is_empty()).then(|| name.trim().to_string());
    Some(Mailbox::new(name, address))
}

pub struct SmtpInviteMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpInviteMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
                .credentials(Credentials::new(user.clone(), pass.clone())),
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };
        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        Ok(Self {
            transport: builder.build(),
            from: config
                .from
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid MAIL_FROM {:?}: {}", config.from, e))?,
        })
    }
}

pub fn invite_body(invite: &Invitation, base_url: &str) -> String {
    let greeting = if invite.receiver_name.is_empty() {
        "Hi,".to_string()
    } else {
        format!("Hi {},", invite.receiver_name)
    };
    format!(
        "{}\n\nYou have been invited to create an account.\n\n{}{}\n\nThis link expires at {}.\n",
        greeting,
        base_url.trim_end_matches('/'),
        invite.path,
        invite.expires_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

#[async_trait]
impl InviteMailer for SmtpInviteMailer {
    async fn send_invite(&self, invite: &Invitation, to: &Mailbox, base_url: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject("You're invited")
            .header(ContentType::TEXT_PLAIN)
            .body(invite_body(invite, base_url))?;

        self.transport.send(email).await?;
        tracing::info!(to = %to.email, path = %invite.path, "invite email sent");
        Ok(())
    }
}
