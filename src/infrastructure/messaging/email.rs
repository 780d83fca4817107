use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message as MimeMessage, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tracing::info;

use super::{Transmitter, merge_params, write_summary};
use crate::{
    application::services::{
        messenger::{Deliver, Message},
        profiles::ProfileLookup,
    },
    domain::{
        errors::MessageError,
        models::{ChannelKind, MessageFields, MessagePart, preview},
        repositories::ProfileRepository,
    },
};

const CHANNEL: ChannelKind = ChannelKind::Email;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Implicit TLS, usually port 465.
    Tls,
    /// STARTTLS upgrade, usually port 587.
    StartTls,
    /// Plain connection; only for local relays.
    None,
}

impl Security {
    fn parse(value: Option<String>) -> Result<Self, MessageError> {
        match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("tls") | Some("ssl") => Ok(Security::Tls),
            Some("starttls") => Ok(Security::StartTls),
            Some("none") | Some("plain") => Ok(Security::None),
            Some(other) => Err(MessageError::invalid(
                CHANNEL,
                "security",
                format!("'{other}' is not one of tls, starttls, none"),
            )),
        }
    }

    fn default_port(&self) -> u16 {
        match self {
            Security::Tls => 465,
            Security::StartTls => 587,
            Security::None => 25,
        }
    }
}

/// Parsed addresses, produced by [`Email::construct`].
struct Envelope {
    from: Mailbox,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
}

/// Email sent over SMTP.
///
/// Attachments are local file paths embedded in the same message, so an
/// email is always a single SMTP transaction. Server settings come from the
/// `server`, `port`, `security` and `username` params or profile fields.
pub struct Email {
    server: String,
    port: u16,
    security: Security,
    username: String,
    password: SecretString,
    from: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: Option<String>,
    body: String,
    attachments: Vec<String>,
    params: Map<String, Value>,
    verbose: bool,
    envelope: Option<Envelope>,
    message: Map<String, Value>,
}

impl Email {
    pub fn new(
        mut fields: MessageFields,
        profiles: &dyn ProfileRepository,
    ) -> Result<Self, MessageError> {
        let profile = fields.profile().to_string();
        let lookup = ProfileLookup::new(profiles, CHANNEL, &profile);

        let password = lookup.secret(fields.credentials.take(), "credentials")?;
        let server = lookup.required(fields.take_param("server"), "server")?;
        let security = Security::parse(lookup.value(fields.take_param("security"), "security"))?;
        let port = match lookup.value(fields.take_param("port"), "port") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|err| MessageError::invalid(CHANNEL, "port", err))?,
            None => security.default_port(),
        };
        let username_param = fields.take_param("username");
        let from = lookup.required(fields.from, "from")?;
        let username = lookup.value(username_param, "username").unwrap_or_else(|| from.clone());
        let to = lookup.list(fields.to, "to");
        if to.is_empty() {
            return Err(MessageError::missing(CHANNEL, "to"));
        }

        Ok(Self {
            server,
            port,
            security,
            username,
            password,
            from,
            to,
            cc: lookup.list(fields.cc, "cc"),
            bcc: lookup.list(fields.bcc, "bcc"),
            subject: fields.subject,
            body: fields.body,
            attachments: fields.attachments,
            params: fields.params,
            verbose: fields.verbose,
            envelope: None,
            message: Map::new(),
        })
    }

    fn mailbox(field: &str, address: &str) -> Result<Mailbox, MessageError> {
        address
            .parse::<Mailbox>()
            .map_err(|err| MessageError::invalid(CHANNEL, field, format!("{address}: {err}")))
    }

    fn mailboxes(field: &str, addresses: &[String]) -> Result<Vec<Mailbox>, MessageError> {
        addresses
            .iter()
            .map(|address| Self::mailbox(field, address))
            .collect()
    }

    /// Builds the MIME message from the constructed envelope.
    fn mime(&self, attachments: Vec<(String, Vec<u8>)>) -> Result<MimeMessage, MessageError> {
        let envelope = self
            .envelope
            .as_ref()
            .ok_or_else(|| MessageError::missing(CHANNEL, "envelope"))?;

        let mut builder = MimeMessage::builder()
            .from(envelope.from.clone())
            .subject(self.subject.clone().unwrap_or_default());
        for mailbox in &envelope.to {
            builder = builder.to(mailbox.clone());
        }
        for mailbox in &envelope.cc {
            builder = builder.cc(mailbox.clone());
        }
        for mailbox in &envelope.bcc {
            builder = builder.bcc(mailbox.clone());
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        for (name, bytes) in attachments {
            let content_type = ContentType::parse("application/octet-stream")
                .map_err(|err| MessageError::invalid(CHANNEL, "attachments", err))?;
            parts = parts.singlepart(Attachment::new(name).body(bytes, content_type));
        }

        builder
            .multipart(parts)
            .map_err(|err| MessageError::invalid(CHANNEL, "message", err))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, MessageError> {
        let builder = match self.security {
            Security::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.server)
                .map_err(|err| MessageError::invalid(CHANNEL, "server", err))?,
            Security::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server)
                .map_err(|err| MessageError::invalid(CHANNEL, "server", err))?,
            Security::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.server),
        };
        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(
                self.username.clone(),
                self.password.expose_secret().to_string(),
            ))
            .build())
    }

    /// Reads attachment files; unreadable ones are reported and skipped.
    async fn read_attachments(&self, tx: &Transmitter) -> Vec<(String, Vec<u8>)> {
        let mut loaded = Vec::with_capacity(self.attachments.len());
        for reference in &self.attachments {
            match load_attachment(reference).await {
                Ok(file) => loaded.push(file),
                Err(err) => tx.report(&MessagePart::Attachment(reference.clone()), Err(err)),
            }
        }
        loaded
    }
}

/// File name and contents of a local attachment.
async fn load_attachment(reference: &str) -> Result<(String, Vec<u8>), MessageError> {
    let bytes = tokio::fs::read(reference).await?;
    let name = Path::new(reference)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| reference.to_string());
    Ok((name, bytes))
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(
            f,
            &[
                ("Server", format!("{}:{}", self.server, self.port)),
                ("Username", self.username.clone()),
                ("Password", "****".to_string()),
                ("From", self.from.clone()),
                ("To", self.to.join(", ")),
                ("Cc", self.cc.join(", ")),
                ("Bcc", self.bcc.join(", ")),
                ("Subject", self.subject.clone().unwrap_or_default()),
                ("Body", format!("{}...", preview(&self.body, 40))),
                ("Attachments", format!("{:?}", self.attachments)),
            ],
        )
    }
}

impl Message for Email {
    fn channel(&self) -> ChannelKind {
        CHANNEL
    }

    fn construct(&mut self) -> Result<(), MessageError> {
        self.envelope = Some(Envelope {
            from: Self::mailbox("from", &self.from)?,
            to: Self::mailboxes("to", &self.to)?,
            cc: Self::mailboxes("cc", &self.cc)?,
            bcc: Self::mailboxes("bcc", &self.bcc)?,
        });

        self.message = Map::from_iter([
            ("from".to_string(), json!(self.from)),
            ("to".to_string(), json!(self.to)),
            ("cc".to_string(), json!(self.cc)),
            ("bcc".to_string(), json!(self.bcc)),
            ("subject".to_string(), json!(self.subject)),
            ("text".to_string(), json!(self.body)),
            ("attachments".to_string(), json!(self.attachments)),
        ]);
        merge_params(&mut self.message, &self.params);
        Ok(())
    }

    fn payload(&self) -> Value {
        if self.message.is_empty() {
            Value::Null
        } else {
            Value::Object(self.message.clone())
        }
    }

    fn into_deliverable(self: Box<Self>) -> Option<Box<dyn Deliver>> {
        Some(self)
    }
}

#[async_trait]
impl Deliver for Email {
    async fn send(&mut self) -> Result<(), MessageError> {
        let tx = Transmitter::new(CHANNEL, self.verbose);
        self.construct()?;
        let transport = self.transport()?;
        tx.note("Message created.");

        let attachments = self.read_attachments(&tx).await;
        let mime = self.mime(attachments)?;

        let part = MessagePart::Body;
        let outcome = transport
            .send(mime)
            .await
            .map(|response| response.code().to_string())
            .map_err(|err| tx.failure(&part, err));
        tx.report(&part, outcome);

        tx.summary(&*self);
        info!(channel = "email", recipients = self.to.len(), "message sent");
        Ok(())
    }
}
