//! Telegram alert delivery
//!
//! The credentials file holds the bot token on its first non-blank line and
//! one chat id per following line. Every chat receives its own
//! `sendMessage` call; one failing chat does not stop the others.

use crate::http::{HttpConfig, HttpConnector, HttpError};
use crate::ConnectorError;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// Bot token and recipients
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    token: String,
    chat_ids: Vec<String>,
}

impl TelegramCredentials {
    pub fn parse(text: &str) -> Result<Self, ConnectorError> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let token = lines
            .next()
            .ok_or_else(|| ConnectorError::ConfigError("credentials file is empty".into()))?
            .to_string();
        Ok(Self {
            token,
            chat_ids: lines.map(String::from).collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConnectorError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConnectorError::ConfigError(format!("{}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn chat_ids(&self) -> &[String] {
        &self.chat_ids
    }
}

impl fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("token", &"<redacted>")
            .field("chat_ids", &self.chat_ids)
            .finish()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Markdown notifier for every configured chat
#[derive(Clone)]
pub struct TelegramNotifier {
    http: HttpConnector,
    credentials: TelegramCredentials,
}

impl TelegramNotifier {
    pub fn new(credentials: TelegramCredentials) -> Result<Self, HttpError> {
        Self::with_base_url(credentials, TELEGRAM_API)
    }

    /// Point at another API host
    pub fn with_base_url(credentials: TelegramCredentials, base_url: &str) -> Result<Self, HttpError> {
        let http = HttpConnector::new(HttpConfig::new(base_url).timeout_secs(15).max_retries(1))?;
        Ok(Self { http, credentials })
    }

    /// Send `text` to every chat; returns how many accepted it
    pub fn notify(&self, text: &str) -> usize {
        let path = format!("/bot{}/sendMessage", self.credentials.token);
        let mut delivered = 0;
        for chat_id in &self.credentials.chat_ids {
            let body = SendMessage {
                chat_id,
                text,
                parse_mode: "Markdown",
            };
            match self.http.post(&path, &body) {
                Ok(_) => {
                    info!("Telegram alert sent to {chat_id}");
                    delivered += 1;
                }
                Err(e) => warn!("Telegram alert to {chat_id} failed: {e}"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials() {
        let credentials = TelegramCredentials::parse("  123:abc \n\n1001\n 1002 \n").unwrap();
        assert_eq!(credentials.token, "123:abc");
        assert_eq!(credentials.chat_ids(), ["1001", "1002"]);
        assert!(!format!("{credentials:?}").contains("abc"));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(matches!(
            TelegramCredentials::parse(" \n"),
            Err(ConnectorError::ConfigError(_))
        ));
    }

    #[test]
    fn test_no_chats_sends_nothing() {
        let credentials = TelegramCredentials::parse("123:abc").unwrap();
        let notifier = TelegramNotifier::with_base_url(credentials, "http://127.0.0.1:9").unwrap();
        assert_eq!(notifier.notify("hello"), 0);
    }
}
