use std::path::PathBuf;

/// Everything that can go wrong during one interaction.
///
/// Only [Error::Config] is fatal, and only at startup. The rest are rendered to the user and the session carries on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("config error: {0}")]
	Config(String),

	#[error("io error at {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to decode {}: {reason}", .path.display())]
	Decode { path: PathBuf, reason: String },

	#[error("Unable to submit request because it has a mimeType parameter with value {mime_type}, which is not supported. Update the mimeType and try again.")]
	UnsupportedType { mime_type: String },

	#[error("failed to generate response: {0}")]
	Remote(String),

	/// Worth retrying: timeouts and overloaded upstream.
	#[error("request did not complete, try again: {0}")]
	Transient(String),
}

impl Error {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io { path: path.into(), source }
	}

	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transient(_))
	}
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
