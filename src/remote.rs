use std::future::Future;

use crate::{Message, Role, error::Result};

/// The one remote operation this crate needs: turn ordered `contents` into reply text.
pub trait Generate {
	fn generate(&self, model: &str, contents: &[Message]) -> impl Future<Output = Result<String>> + Send;
}

/// Canned offline replies. Lets the whole flow run without a key or a network.
#[derive(Clone, Debug, Default)]
pub struct StubBackend;

impl Generate for StubBackend {
	fn generate(&self, model: &str, contents: &[Message]) -> impl Future<Output = Result<String>> + Send {
		let last = contents.iter().rev().find(|m| m.role == Role::User).map(Message::joined_text).unwrap_or_default();
		let attachments = contents.iter().flat_map(|m| &m.parts).filter(|p| p.as_text().is_none()).count();
		let reply = format!("[{model} stub] {} turn(s) of context, {attachments} attachment(s). You said: {last}", contents.len());
		async move { Ok(reply) }
	}
}
