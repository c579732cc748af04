//! Cooldown subjects
//!
//! A subject is what a counter is kept for. IP addresses are normalized so
//! that one client maps to one counter: IPv4 addresses are used whole, IPv6
//! addresses are truncated to their /64 subnet since a single host usually
//! owns the whole subnet.

use std::net::IpAddr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CooldownSubject<'a> {
	Ip(IpAddr),
	Email(&'a str),
	User(i64),
}

impl CooldownSubject<'_> {
	/// Key-safe rendering of the subject
	pub fn slug(&self) -> String {
		match self {
			CooldownSubject::Ip(IpAddr::V4(ip)) => ip.to_string().replace('.', "_"),
			CooldownSubject::Ip(IpAddr::V6(ip)) => {
				let segments = ip.segments();
				format!("{:x}_{:x}_{:x}_{:x}", segments[0], segments[1], segments[2], segments[3])
			}
			CooldownSubject::Email(email) => slugify(&email.trim().to_lowercase()),
			CooldownSubject::User(id) => id.to_string(),
		}
	}
}

fn slugify(value: &str) -> String {
	value.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Store key of a counter
pub(crate) fn cooldown_key(purpose: &str, subject: &str) -> String {
	format!("cooldown:{}:{}", purpose, subject)
}


// vim: ts=4
