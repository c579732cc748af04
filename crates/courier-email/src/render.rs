//! Render gateway
//!
//! Rebuilds the body of a queued message from its stored parameters. Access
//! is gated by a capability key derived from the message id, so the body of a
//! message is only reachable by whoever was given its key (the delivery
//! worker, and the recipient through the "view in browser" link).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::EmailModule;
use crate::prelude::*;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, data: &[u8]) -> ClResult<HmacSha256> {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
		.map_err(|e| Error::Internal(format!("HMAC key error: {}", e)))?;
	mac.update(data);
	Ok(mac)
}

fn sign(secret: &str, data: &[u8]) -> ClResult<String> {
	Ok(URL_SAFE_NO_PAD.encode(mac(secret, data)?.finalize().into_bytes()))
}

/// Constant-time check of a base64url signature
fn verify(secret: &str, data: &[u8], key: &str) -> bool {
	let Ok(signature) = URL_SAFE_NO_PAD.decode(key) else {
		return false;
	};
	mac(secret, data).is_ok_and(|mac| mac.verify_slice(&signature).is_ok())
}

/// Capability key granting access to the rendered body of message `id`
pub fn render_key(secret: &str, id: MsgId) -> ClResult<String> {
	sign(secret, id.to_string().as_bytes())
}

pub fn verify_render_key(secret: &str, id: MsgId, key: &str) -> bool {
	verify(secret, id.to_string().as_bytes(), key)
}

/// Key of the unsubscribe link of `email`, independent of address case
pub fn unsubscribe_key(secret: &str, email: &str) -> ClResult<String> {
	sign(secret, email.trim().to_lowercase().as_bytes())
}

pub fn verify_unsubscribe_key(secret: &str, email: &str, key: &str) -> bool {
	verify(secret, email.trim().to_lowercase().as_bytes(), key)
}

fn encode(value: &str) -> String {
	url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn unsubscribe_url(app_url: &str, email: &str, key: &str) -> String {
	format!("{}unsubscribe?email={}&key={}", app_url, encode(email), encode(key))
}

pub fn browser_url(app_url: &str, id: MsgId, key: &str) -> String {
	format!("{}api/mailer/{}?render_key={}", app_url, id, encode(key))
}

/// A rendered message body
#[derive(Debug)]
pub struct RenderedMail {
	pub subject: Option<String>,
	pub html: String,
}

/// Render message `id` if `key` is its capability key
///
/// A wrong key and an unknown id both give [`Error::NotFound`].
pub async fn render(app: &App, id: MsgId, key: &str) -> ClResult<RenderedMail> {
	if !verify_render_key(&app.opts.render_secret, id, key) {
		debug!(msg_id = %id, "Render denied: capability mismatch");
		return Err(Error::NotFound);
	}
	let msg = app.queue_adapter.read(id).await?;
	let module = app.ext::<EmailModule>()?;

	let recipient = msg.recipient.as_ref();
	let unsubscribe_key = unsubscribe_key(&app.opts.unsubscribe_secret, recipient)?;

	let mut globals = serde_json::Map::new();
	globals.insert("title".into(), msg.subject.as_ref().into());
	globals.insert("app_name".into(), app.opts.app_name.as_ref().into());
	globals.insert("app_url".into(), app.opts.app_url.as_ref().into());
	globals.insert(
		"unsubscribe_url".into(),
		unsubscribe_url(&app.opts.app_url, recipient, &unsubscribe_key).into(),
	);
	globals.insert("unsubscribe_email".into(), recipient.into());
	globals.insert("unsubscribe_key".into(), unsubscribe_key.into());
	globals.insert("browser_url".into(), browser_url(&app.opts.app_url, id, key).into());
	globals.insert("browser_id".into(), id.0.into());
	globals.insert("browser_key".into(), key.into());

	let res = module.template_engine.render(&msg.template, &msg.params, &globals)?;
	Ok(RenderedMail { subject: res.subject, html: res.html_body })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_render_key() {
		let key = render_key("secret", MsgId(42)).unwrap();
		assert_eq!(key.len(), 43);
		assert!(!key.contains('='));
		assert!(verify_render_key("secret", MsgId(42), &key));
		assert!(!verify_render_key("secret", MsgId(43), &key));
		assert!(!verify_render_key("other", MsgId(42), &key));
		assert!(!verify_render_key("secret", MsgId(42), "not base64!"));
		assert!(!verify_render_key("secret", MsgId(42), ""));
	}

	#[test]
	fn test_unsubscribe_key_ignores_case() {
		let key = unsubscribe_key("salt", "Alice@Example.com").unwrap();
		assert_eq!(key, unsubscribe_key("salt", "alice@example.com").unwrap());
		assert!(verify_unsubscribe_key("salt", "ALICE@example.com", &key));
		assert!(!verify_unsubscribe_key("salt", "bob@example.com", &key));
	}

	#[test]
	fn test_urls() {
		assert_eq!(
			unsubscribe_url("https://app.example/", "a+b@example.com", "k-_"),
			"https://app.example/unsubscribe?email=a%2Bb%40example.com&key=k-_"
		);
		assert_eq!(
			browser_url("https://app.example/", MsgId(7), "abc"),
			"https://app.example/api/mailer/7?render_key=abc"
		);
	}
}

// vim: ts=4
