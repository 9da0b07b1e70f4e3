//! telegram.rs — Bot API transport adapter.
//!
//! Long-polls `getUpdates` and exposes the two outbound calls the bot needs,
//! `sendMessage` and `sendPhoto`. The photo upload is a hand-built
//! multipart/form-data body; the Bot API wants nothing fancier.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::viewport::UserId;

/// Long-poll window passed to getUpdates, seconds. The agent's read timeout
/// stays above it so an idle poll is not mistaken for a dead connection.
const POLL_SECS: u32 = 25;

pub struct Telegram {
    agent: ureq::Agent,
    base: String,
}

impl Telegram {
    pub fn new(token: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(u64::from(POLL_SECS) + 10))
            .build();
        Self {
            agent,
            base: format!("https://api.telegram.org/bot{token}"),
        }
    }

    /// One long-poll round. Returns the pending updates; the caller advances
    /// the offset past the last one it has seen.
    pub fn poll(&self, offset: i64) -> Result<Vec<Update>> {
        let resp = self
            .agent
            .get(&format!("{}/getUpdates", self.base))
            .query("timeout", &POLL_SECS.to_string())
            .query("offset", &offset.to_string())
            .call()
            .context("getUpdates request")?;
        let parsed: ApiReply<Vec<Update>> =
            serde_json::from_reader(resp.into_reader()).context("getUpdates response")?;
        if !parsed.ok {
            bail!("getUpdates refused: {}", parsed.description.unwrap_or_default());
        }
        Ok(parsed.result.unwrap_or_default())
    }

    pub fn send_text(&self, user: UserId, text: &str) -> Result<()> {
        let chat_id = user.to_string();
        self.agent
            .post(&format!("{}/sendMessage", self.base))
            .send_form(&[("chat_id", chat_id.as_str()), ("text", text)])
            .context("sendMessage request")?;
        Ok(())
    }

    pub fn send_image(&self, user: UserId, png: &[u8], filename: &str) -> Result<()> {
        let boundary = multipart_boundary();
        let body = multipart_photo(&boundary, user, png, filename);
        self.agent
            .post(&format!("{}/sendPhoto", self.base))
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body)
            .context("sendPhoto request")?;
        Ok(())
    }
}

impl crate::app::Messenger for Telegram {
    fn send_text(&self, user: UserId, text: &str) -> Result<()> {
        Telegram::send_text(self, user, text)
    }

    fn send_image(&self, user: UserId, png: &[u8], filename: &str) -> Result<()> {
        Telegram::send_image(self, user, png, filename)
    }
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("----WiFiSpotBot{nanos:x}")
}

/// multipart/form-data body with a `chat_id` field and a `photo` file part.
fn multipart_photo(boundary: &str, user: UserId, png: &[u8], filename: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(png.len() + 512);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"chat_id\"\r\n\r\n");
    body.extend_from_slice(format!("{user}\r\n").as_bytes());
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"photo\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(png);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

/// One inbound event. Only `message` updates matter to the bot; edits,
/// callbacks and the rest deserialize with `message: None` and are skipped.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub from: Option<User>,
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_update_parses() {
        let raw = r#"{
            "ok": true,
            "result": [{
                "update_id": 7,
                "message": {
                    "message_id": 1,
                    "from": {"id": 99, "first_name": "Ada", "last_name": "L"},
                    "date": 1700000000,
                    "text": "g 10 20"
                }
            }]
        }"#;
        let parsed: ApiReply<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(parsed.ok);
        let updates = parsed.result.unwrap();
        assert_eq!(updates[0].update_id, 7);
        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(msg.from.as_ref().unwrap().id, 99);
        assert_eq!(msg.text.as_deref(), Some("g 10 20"));
        assert!(msg.location.is_none());
    }

    #[test]
    fn location_update_parses() {
        let raw = r#"{
            "update_id": 8,
            "message": {
                "from": {"id": 99, "first_name": "Ada"},
                "date": 1700000001,
                "location": {"latitude": 55.5, "longitude": 37.0}
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let loc = update.message.unwrap().location.unwrap();
        assert_eq!((loc.latitude, loc.longitude), (55.5, 37.0));
    }

    #[test]
    fn unknown_update_kinds_are_tolerated() {
        let raw = r#"{"update_id": 9, "edited_message": {"text": "x"}}"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert!(update.message.is_none());
    }

    #[test]
    fn multipart_body_contains_both_parts() {
        let body = multipart_photo("XYZ", 42, b"\x89PNG", "a.png");
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("--XYZ\r\n"));
        assert!(text.contains("name=\"chat_id\"\r\n\r\n42\r\n"));
        assert!(text.contains("filename=\"a.png\""));
        assert!(text.ends_with("--XYZ--\r\n"));
    }
}
