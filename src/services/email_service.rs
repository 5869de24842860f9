//! services/email_service.rs

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{
        header::{ContentDisposition, ContentType},
        Body, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;

use crate::config::app_config::SmtpConfig;
use crate::models::email_model::OutgoingEmail;

const SMTP_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Proveedor de envío de correo transaccional. Devuelve el id de mensaje
/// asignado por el proveedor.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<String>;

    /// `false` si no hay transporte configurado: la cola no se procesa.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Envío por SMTP con TLS obligatorio.
pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    message_domain: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig, from_address: &str, from_name: &str) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", from_name, from_address)
            .parse()
            .context("Invalid from address")?;

        let tls_params = TlsParameters::new(config.host.clone())?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .tls(Tls::Required(tls_params))
            .build();

        let message_domain = from_address
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_string())
            .unwrap_or_else(|| config.host.clone());

        Ok(Self {
            mailer,
            from,
            message_domain,
        })
    }

    fn build_message(&self, email: &OutgoingEmail, message_id: &str) -> Result<Message> {
        if email.to.is_empty() {
            return Err(anyhow!("El email no tiene destinatarios"));
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(&email.subject)
            .message_id(Some(message_id.to_string()));

        for recip_str in &email.to {
            let to: Mailbox = recip_str
                .parse()
                .with_context(|| format!("Invalid recipient address: {recip_str}"))?;
            builder = builder.to(to);
        }
        for cc_str in &email.cc {
            let cc: Mailbox = cc_str
                .parse()
                .with_context(|| format!("Invalid cc address: {cc_str}"))?;
            builder = builder.cc(cc);
        }

        // Construir cuerpo en HTML
        let html_part = SinglePart::builder()
            .header(ContentType::parse("text/html; charset=utf-8")?)
            .body(email.html_body.clone());

        let mut multipart = MultiPart::mixed().singlepart(html_part);

        for attach in &email.attachments {
            let body = Body::new(attach.data.clone());
            let part = SinglePart::builder()
                .header(ContentType::parse(attach.content_type.as_str())?)
                .header(ContentDisposition::attachment(&attach.filename))
                .body(body);
            multipart = multipart.singlepart(part);
        }

        Ok(builder.multipart(multipart)?)
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.message_domain);
        let message = self.build_message(email, &message_id)?;

        tokio::time::timeout(SMTP_SEND_TIMEOUT, self.mailer.send(message))
            .await
            .context("Timeout enviando por SMTP")?
            .context("El servidor SMTP rechazó el envío")?;

        Ok(message_id)
    }
}

/// Se usa cuando no hay SMTP configurado. `is_enabled` es false, así que el
/// procesador deja la cola intacta; un envío directo falla.
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn send(&self, _email: &OutgoingEmail) -> Result<String> {
        Err(anyhow!("SMTP no configurado"))
    }
}
