//! Cooldown policies of the mail-triggering flows

use courier_types::cooldown_adapter::CooldownLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
	pub purpose: &'static str,
	pub limits: CooldownLimits,
}

impl CooldownPolicy {
	pub const fn new(purpose: &'static str, limits: CooldownLimits) -> Self {
		Self { purpose, limits }
	}

	/// Password reset requests per IP address
	pub const FORGOT_PASSWD_IP: CooldownPolicy =
		CooldownPolicy::new("forgot_passwd_ip", CooldownLimits::new(5, 60, 600));
	/// Password reset mails per e-mail address
	pub const FORGOT_PASSWD_EMAIL: CooldownPolicy =
		CooldownPolicy::new("forgot_passwd_email", CooldownLimits::new(1, 300, 300));
	/// Confirmation resend requests per IP address
	pub const RESEND_IP: CooldownPolicy =
		CooldownPolicy::new("resend_ip", CooldownLimits::new(5, 60, 600));
	/// Confirmation resend mails per account
	pub const RESEND_UID: CooldownPolicy =
		CooldownPolicy::new("resend_uid", CooldownLimits::new(1, 300, 300));
	/// E-mail address changes per account and day
	pub const UPDATE_EMAIL: CooldownPolicy =
		CooldownPolicy::new("update_email", CooldownLimits::new(2, 86_400, 86_400));
}

// vim: ts=4
