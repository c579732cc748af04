//! Adapter that manages the durable mail queue
//!
//! The queue table is the system of record for delivery state. Every row is
//! in exactly one of three states:
//!
//! - pending: `sent_at` and `error` are both unset
//! - sent: `sent_at` is set
//! - failed: `error` is set
//!
//! A row leaves the pending state at most once. Implementations must hand out
//! a pending row to at most one [`ClaimedMessage`] at a time, and the claim
//! must hold a transactional row lock until it is resolved. Dropping a claim
//! without resolving it rolls the transaction back and leaves the row pending.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::params::TemplateParams;
use crate::prelude::*;

/// Delivery state derived from `sent_at` / `error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
	Pending,
	Sent,
	Failed,
}

impl MessageState {
	pub fn as_str(&self) -> &'static str {
		match self {
			MessageState::Pending => "pending",
			MessageState::Sent => "sent",
			MessageState::Failed => "failed",
		}
	}
}

impl std::fmt::Display for MessageState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for MessageState {
	type Err = Error;

	fn from_str(s: &str) -> ClResult<Self> {
		match s {
			"pending" => Ok(MessageState::Pending),
			"sent" => Ok(MessageState::Sent),
			"failed" => Ok(MessageState::Failed),
			_ => Err(Error::ValidationError(format!("unknown message state: {}", s))),
		}
	}
}

/// Data for a new queue row
#[derive(Debug, Clone)]
pub struct NewMessage {
	pub sender: Box<str>,
	pub recipient: Box<str>,
	pub subject: Box<str>,
	pub template: Box<str>,
	pub params: TemplateParams,
	pub bcc: Vec<Box<str>>,
}

/// A row of the mail queue
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
	pub id: MsgId,
	pub sender: Box<str>,
	pub recipient: Box<str>,
	pub subject: Box<str>,
	pub template: Box<str>,
	pub params: TemplateParams,
	pub bcc: Vec<Box<str>>,
	pub created_at: Timestamp,
	pub sent_at: Option<Timestamp>,
	pub error: Option<Box<str>>,
}

impl QueuedMessage {
	pub fn state(&self) -> MessageState {
		if self.sent_at.is_some() {
			MessageState::Sent
		} else if self.error.is_some() {
			MessageState::Failed
		} else {
			MessageState::Pending
		}
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMessageOptions {
	pub state: Option<MessageState>,
	pub limit: Option<u32>,
}

/// A pending row locked for delivery
///
/// The outcome is staged inside the claim's transaction and committed
/// together with the lock release.
#[async_trait]
pub trait ClaimedMessage: Send {
	fn message(&self) -> &QueuedMessage;

	/// Set `sent_at` and commit
	async fn mark_sent(self: Box<Self>, sent_at: Timestamp) -> ClResult<()>;

	/// Set `error` and commit
	async fn mark_failed(self: Box<Self>, error: &str) -> ClResult<()>;

	/// Roll back, leaving the row pending
	async fn release(self: Box<Self>) -> ClResult<()>;
}

#[async_trait]
pub trait MailQueueAdapter: Debug + Send + Sync {
	/// Insert a pending row and return its id
	async fn enqueue(&self, msg: &NewMessage) -> ClResult<MsgId>;

	async fn read(&self, id: MsgId) -> ClResult<QueuedMessage>;

	/// List rows newest first
	async fn list(&self, opts: &ListMessageOptions) -> ClResult<Vec<QueuedMessage>>;

	/// Lock the oldest pending row with an id greater than `after`
	///
	/// Rows locked by another claim are skipped. Returns `None` when no row
	/// can be claimed right now.
	async fn claim_next(&self, after: Option<MsgId>) -> ClResult<Option<Box<dyn ClaimedMessage>>>;

	/// Copy an existing row into a new pending row, leaving the original as is
	async fn requeue(&self, id: MsgId) -> ClResult<MsgId>;
}


// vim: ts=4
