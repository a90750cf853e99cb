//! Email I/O: IMAP polling for inbound applications, SMTP via lettre for replies.
//!
//! IMAP is spoken directly over rustls on a blocking socket; every call is
//! moved onto the blocking pool with `spawn_blocking`.

use std::io::{Read, Write as IoWrite};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use rustls_pki_types::ServerName;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::channels::email_types::{InboundEmail, OutgoingEmail};
use crate::config::{Lookup, non_empty, parse_or, split_list, string_or};
use crate::error::{ConfigError, EmailError};

const IMAP_TIMEOUT: Duration = Duration::from_secs(30);
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub from_name: String,
    /// Optional sender allowlist. Empty means every sender is screened.
    pub allowed_senders: Vec<String>,
}

impl EmailConfig {
    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let imap_host = string_or(lookup, "EMAIL_IMAP_HOST", "imap.gmail.com");
        let imap_port: u16 = parse_or(lookup, "EMAIL_IMAP_PORT", 993)?;
        let smtp_host = non_empty(lookup, "EMAIL_SMTP_HOST")
            .unwrap_or_else(|| imap_host.replace("imap", "smtp"));
        let smtp_port: u16 = parse_or(lookup, "EMAIL_SMTP_PORT", 587)?;

        let username = non_empty(lookup, "EMAIL_USERNAME").unwrap_or_default();
        let password = SecretString::from(non_empty(lookup, "EMAIL_PASSWORD").unwrap_or_default());
        let from_address = non_empty(lookup, "EMAIL_FROM_ADDRESS").unwrap_or_else(|| username.clone());
        let from_name = string_or(lookup, "EMAIL_FROM_NAME", "Hiring Team");

        let allowed_senders = non_empty(lookup, "EMAIL_ALLOWED_SENDERS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            from_name,
            allowed_senders,
        })
    }
}

// ── Traits ──────────────────────────────────────────────────────────

/// Source of unseen application emails.
#[async_trait]
pub trait Inbox: Send + Sync {
    /// Fetch up to `limit` unseen messages, oldest first, without marking them \Seen.
    async fn fetch_unseen(&self, limit: usize) -> Result<Vec<InboundEmail>, EmailError>;

    /// Mark processed messages as \Seen.
    async fn mark_seen(&self, uids: &[String]) -> Result<(), EmailError>;

    async fn health_check(&self) -> Result<(), EmailError>;
}

/// Sink for acceptance / rejection replies.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;

    async fn health_check(&self) -> Result<(), EmailError>;
}

// ── Client ──────────────────────────────────────────────────────────

/// IMAP (inbound) + SMTP (outbound) client.
pub struct EmailClient {
    config: EmailConfig,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Inbox for EmailClient {
    async fn fetch_unseen(&self, limit: usize) -> Result<Vec<InboundEmail>, EmailError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unseen_imap(&cfg, limit))
            .await
            .map_err(|e| EmailError::Task(e.to_string()))?
    }

    async fn mark_seen(&self, uids: &[String]) -> Result<(), EmailError> {
        if uids.is_empty() {
            return Ok(());
        }
        let cfg = self.config.clone();
        let uids = uids.to_vec();
        tokio::task::spawn_blocking(move || mark_seen_imap(&cfg, &uids))
            .await
            .map_err(|e| EmailError::Task(e.to_string()))?
    }

    async fn health_check(&self) -> Result<(), EmailError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = ImapSession::connect(&cfg)?;
            session.login(&cfg)?;
            session.logout();
            Ok(())
        })
        .await
        .map_err(|e| EmailError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Outbox for EmailClient {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let cfg = self.config.clone();
        let email = email.clone();
        tokio::task::spawn_blocking(move || send_smtp(&cfg, &email))
            .await
            .map_err(|e| EmailError::Task(e.to_string()))?
    }

    async fn health_check(&self) -> Result<(), EmailError> {
        let cfg = self.config.clone();
        let ok = tokio::task::spawn_blocking(move || {
            smtp_transport(&cfg)
                .and_then(|t| {
                    t.test_connection().map_err(|e| EmailError::Connect {
                        host: cfg.smtp_host.clone(),
                        port: cfg.smtp_port,
                        reason: e.to_string(),
                    })
                })
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false);

        if ok {
            Ok(())
        } else {
            Err(EmailError::HealthCheckFailed {
                name: "smtp".into(),
            })
        }
    }
}

// ── SMTP ────────────────────────────────────────────────────────────

/// Port 465 speaks implicit TLS; anything else upgrades with STARTTLS.
fn smtp_transport(config: &EmailConfig) -> Result<SmtpTransport, EmailError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    let builder = if config.smtp_port == 465 {
        SmtpTransport::relay(&config.smtp_host)
    } else {
        SmtpTransport::starttls_relay(&config.smtp_host)
    }
    .map_err(|e| EmailError::Connect {
        host: config.smtp_host.clone(),
        port: config.smtp_port,
        reason: format!("SMTP relay error: {e}"),
    })?;

    Ok(builder
        .port(config.smtp_port)
        .credentials(creds)
        .timeout(Some(SMTP_TIMEOUT))
        .build())
}

fn parse_address(address: &str) -> Result<Address, EmailError> {
    address.parse().map_err(|e| EmailError::InvalidAddress {
        address: address.to_string(),
        reason: format!("{e}"),
    })
}

/// Build the RFC 5322 message for an outgoing reply.
pub fn build_message(config: &EmailConfig, email: &OutgoingEmail) -> Result<Message, EmailError> {
    let from = Mailbox::new(
        Some(config.from_name.clone()),
        parse_address(&config.from_address)?,
    );
    let to = Mailbox::new(email.to_name.clone(), parse_address(&email.to)?);

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| EmailError::SendFailed {
            to: email.to.clone(),
            reason: format!("Failed to build email: {e}"),
        })
}

fn send_smtp(config: &EmailConfig, email: &OutgoingEmail) -> Result<(), EmailError> {
    let message = build_message(config, email)?;
    let transport = smtp_transport(config)?;

    transport.send(&message).map_err(|e| EmailError::SendFailed {
        to: email.to.clone(),
        reason: format!("SMTP send failed: {e}"),
    })?;

    info!(to = %email.to, subject = %email.subject, "Email sent");
    Ok(())
}

// ── IMAP ────────────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Untagged lines and literals collected for one tagged command.
#[derive(Debug, Default)]
struct ImapResponse {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
}

/// A blocking IMAP4rev1 session over TLS.
struct ImapSession {
    stream: TlsStream,
    next_tag: u32,
}

impl ImapSession {
    fn connect(config: &EmailConfig) -> Result<Self, EmailError> {
        let connect_err = |reason: String| EmailError::Connect {
            host: config.imap_host.clone(),
            port: config.imap_port,
            reason,
        };

        let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port))
            .map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(Some(IMAP_TIMEOUT))
            .map_err(|e| connect_err(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = ServerName::try_from(config.imap_host.clone())
            .map_err(|e| connect_err(format!("invalid server name: {e}")))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| connect_err(format!("TLS setup failed: {e}")))?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            next_tag: 1,
        };

        let greeting = session.read_line()?;
        if !(greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH")) {
            return Err(connect_err(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, EmailError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => {
                    return Err(EmailError::Imap {
                        command: "read".into(),
                        reason: "connection closed".into(),
                    });
                }
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
                Err(e) => {
                    return Err(EmailError::Imap {
                        command: "read".into(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Send a tagged command and collect its response. `NO` / `BAD` become errors.
    fn command(&mut self, cmd: &str) -> Result<ImapResponse, EmailError> {
        let tag = format!("A{:04}", self.next_tag);
        self.next_tag += 1;
        let verb = cmd.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
        let io_err = |e: std::io::Error| EmailError::Imap {
            command: verb.clone(),
            reason: e.to_string(),
        };

        self.stream
            .write_all(format!("{tag} {cmd}\r\n").as_bytes())
            .map_err(io_err)?;
        self.stream.flush().map_err(io_err)?;

        let mut response = ImapResponse::default();
        let tag_prefix = format!("{tag} ");
        loop {
            let line = self.read_line()?;

            if let Some(len) = parse_literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal).map_err(io_err)?;
                response.lines.push(line);
                response.literals.push(literal);
                continue;
            }

            if let Some(status) = line.strip_prefix(&tag_prefix) {
                let status = status.trim_end();
                if status.starts_with("OK") {
                    return Ok(response);
                }
                return Err(EmailError::Imap {
                    command: verb.clone(),
                    reason: status.to_string(),
                });
            }

            response.lines.push(line);
        }
    }

    fn login(&mut self, config: &EmailConfig) -> Result<(), EmailError> {
        let cmd = format!(
            "LOGIN {} {}",
            imap_quote(&config.username),
            imap_quote(config.password.expose_secret())
        );
        self.command(&cmd).map(|_| ()).map_err(|e| match e {
            EmailError::Imap { .. } => EmailError::AuthFailed {
                username: config.username.clone(),
            },
            other => other,
        })
    }

    fn logout(mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!("IMAP logout failed: {e}");
        }
    }
}

/// Fetch unseen messages (blocking, call from spawn_blocking).
///
/// Uses `BODY.PEEK[]` so the server does not set \Seen; the orchestrator
/// marks messages only after they were recorded.
fn fetch_unseen_imap(config: &EmailConfig, limit: usize) -> Result<Vec<InboundEmail>, EmailError> {
    let mut session = ImapSession::connect(config)?;
    session.login(config)?;
    session.command("SELECT \"INBOX\"")?;

    let search = session.command("UID SEARCH UNSEEN")?;
    let mut uids = parse_search_uids(&search.lines);
    uids.sort_by_key(|uid| uid.parse::<u64>().unwrap_or(u64::MAX));
    uids.truncate(limit);

    debug!(count = uids.len(), "Unseen messages selected for fetch");

    let mut fetched = Vec::with_capacity(uids.len());
    for uid in uids {
        let response = session.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
        match response.literals.into_iter().next() {
            Some(raw) => fetched.push((uid, raw)),
            None => warn!(uid = %uid, "FETCH returned no message body"),
        }
    }

    let (results, undecodable) = decode_fetched(fetched);
    if !undecodable.is_empty() {
        // Nothing can be done with them; left unseen they would fill every batch.
        match session.command(&store_seen_command(&undecodable)) {
            Ok(_) => info!(uids = ?undecodable, "Marked undecodable messages as seen"),
            Err(e) => warn!(uids = ?undecodable, error = %e, "Failed to mark undecodable messages as seen"),
        }
    }

    session.logout();
    Ok(results)
}

/// Decode fetched `(uid, raw)` bodies, returning the UIDs that could not be used.
pub fn decode_fetched(fetched: Vec<(String, Vec<u8>)>) -> (Vec<InboundEmail>, Vec<String>) {
    let mut emails = Vec::with_capacity(fetched.len());
    let mut undecodable = Vec::new();
    for (uid, raw) in fetched {
        match InboundEmail::from_raw(&uid, &raw) {
            Some(email) => emails.push(email),
            None => {
                warn!(uid = %uid, "Could not parse message or find its sender");
                undecodable.push(uid);
            }
        }
    }
    (emails, undecodable)
}

fn store_seen_command(uids: &[String]) -> String {
    format!("UID STORE {} +FLAGS (\\Seen)", uids.join(","))
}

/// Set \Seen on the given UIDs (blocking, call from spawn_blocking).
fn mark_seen_imap(config: &EmailConfig, uids: &[String]) -> Result<(), EmailError> {
    let mut session = ImapSession::connect(config)?;
    session.login(config)?;
    session.command("SELECT \"INBOX\"")?;
    session.command(&store_seen_command(uids))?;
    session.logout();
    debug!(count = uids.len(), "Marked messages as seen");
    Ok(())
}

// ── Helpers (public for testing) ────────────────────────────────────

/// Check if a sender email is in the allowlist.
///
/// - `*` → allow all
/// - `@domain.com` or `domain.com` → domain match
/// - `user@domain.com` → exact email match
pub fn is_sender_allowed(allowed: &[String], email: &str) -> bool {
    if allowed.iter().any(|a| a == "*") {
        return true;
    }
    let email_lower = email.to_lowercase();
    allowed.iter().any(|a| {
        if a.starts_with('@') {
            email_lower.ends_with(&a.to_lowercase())
        } else if a.contains('@') {
            a.eq_ignore_ascii_case(email)
        } else {
            email_lower.ends_with(&format!("@{}", a.to_lowercase()))
        }
    })
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Quote a string as an IMAP quoted-string.
pub fn imap_quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Collect UIDs from `* SEARCH` response lines.
pub fn parse_search_uids(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace())
        .filter(|tok| tok.chars().all(|c| c.is_ascii_digit()))
        .map(String::from)
        .collect()
}

/// Length of a literal announced at the end of a response line (`... {123}\r\n`).
pub fn parse_literal_len(line: &str) -> Option<usize> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let inner = trimmed.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].parse().ok()
}

// ── Tests ───────────────────────────────────────────────────────────
