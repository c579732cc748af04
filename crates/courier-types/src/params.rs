//! Typed template parameters
//!
//! Queued messages carry their template variables as a closed set of value
//! kinds instead of free-form JSON. Anything outside the set (floats, nulls)
//! is rejected when the message is enqueued.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ClResult, Error};

/// A single template variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
	Bool(bool),
	Number(i64),
	Text(String),
	List(Vec<ParamValue>),
	Map(BTreeMap<String, ParamValue>),
}

/// Template variables of a queued message
pub type TemplateParams = BTreeMap<String, ParamValue>;

/// Kind of a template variable, as declared in template frontmatter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
	Text,
	Number,
	Bool,
	List,
	Map,
}

impl ParamValue {
	pub fn kind(&self) -> ParamKind {
		match self {
			ParamValue::Bool(_) => ParamKind::Bool,
			ParamValue::Number(_) => ParamKind::Number,
			ParamValue::Text(_) => ParamKind::Text,
			ParamValue::List(_) => ParamKind::List,
			ParamValue::Map(_) => ParamKind::Map,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			ParamValue::Text(s) => Some(s),
			_ => None,
		}
	}
}

impl std::fmt::Display for ParamKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			ParamKind::Text => "text",
			ParamKind::Number => "number",
			ParamKind::Bool => "bool",
			ParamKind::List => "list",
			ParamKind::Map => "map",
		})
	}
}

impl std::str::FromStr for ParamKind {
	type Err = Error;

	fn from_str(s: &str) -> ClResult<Self> {
		match s {
			"text" => Ok(ParamKind::Text),
			"number" => Ok(ParamKind::Number),
			"bool" => Ok(ParamKind::Bool),
			"list" => Ok(ParamKind::List),
			"map" => Ok(ParamKind::Map),
			_ => Err(Error::ValidationError(format!("unknown parameter kind: {}", s))),
		}
	}
}

impl From<&str> for ParamValue {
	fn from(value: &str) -> Self {
		ParamValue::Text(value.to_string())
	}
}

impl From<String> for ParamValue {
	fn from(value: String) -> Self {
		ParamValue::Text(value)
	}
}

impl From<i64> for ParamValue {
	fn from(value: i64) -> Self {
		ParamValue::Number(value)
	}
}

impl From<bool> for ParamValue {
	fn from(value: bool) -> Self {
		ParamValue::Bool(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse_params(json: &str) -> serde_json::Result<TemplateParams> {
		serde_json::from_str(json)
	}

	#[test]
	fn test_untagged_roundtrip_shape() {
		let params = parse_params(r#"{"name":"Alice","count":3,"vip":true,"tags":["a","b"],"cta":{"title":"Go","link":"https://x"}}"#).unwrap();
		assert_eq!(params["name"], ParamValue::Text("Alice".into()));
		assert_eq!(params["count"], ParamValue::Number(3));
		assert_eq!(params["vip"], ParamValue::Bool(true));
		assert_eq!(params["tags"].kind(), ParamKind::List);
		assert_eq!(params["cta"].kind(), ParamKind::Map);

		let json = serde_json::to_value(&params).unwrap();
		assert_eq!(json["cta"]["title"], "Go");
	}

	#[test]
	fn test_rejects_null_and_float() {
		assert!(parse_params(r#"{"x":null}"#).is_err());
		assert!(parse_params(r#"{"x":1.5}"#).is_err());
		assert!(parse_params(r#"["not","a","map"]"#).is_err());
	}

	#[test]
	fn test_kind_parse() {
		assert_eq!("text".parse::<ParamKind>().unwrap(), ParamKind::Text);
		assert!("float".parse::<ParamKind>().is_err());
	}
}

// vim: ts=4
