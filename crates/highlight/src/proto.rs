use serde::{Deserialize, Serialize};
use spectro_markup::SyntaxLine;

/// Message sent from the coordinator to one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
	/// Load the highlighting engine from this URL. Sent to every worker
	/// before any highlight request reaches it.
	Init { url: String },
	/// Highlight `code` as `language`.
	Highlight { language: String, code: String },
}

/// Message sent from a worker back to the coordinator.
///
/// Absence of `error` signals success. An init acknowledgment is a success
/// with empty `ranges`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub ranges: Vec<SyntaxLine>,
}

impl WorkerResponse {
	/// Success carrying reconstructed ranges (empty for an init acknowledgment).
	pub fn success(ranges: Vec<SyntaxLine>) -> Self {
		Self { error: None, ranges }
	}

	/// Failure carrying the error as data.
	pub fn failure(message: impl Into<String>) -> Self {
		Self {
			error: Some(message.into()),
			ranges: Vec::new(),
		}
	}
}
