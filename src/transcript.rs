use crate::{Message, Role};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
	pub role: Role,
	pub text: String,
}

/// Append-only record of a conversation, kept in two parallel shapes.
///
/// `display_log` is what gets printed; `api_log` is what gets sent back as history. Both always have the same length, and the
/// same role at every index. Nothing is ever evicted: every prior turn is resent on every call.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
	display_log: Vec<Turn>,
	api_log: Vec<Message>,
}

impl Transcript {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn append_turn<T: Into<String>>(&mut self, role: Role, text: T) {
		let text = text.into();
		self.api_log.push(Message::text(role, text.clone()));
		self.display_log.push(Turn { role, text });
	}

	pub fn display_log(&self) -> &[Turn] {
		&self.display_log
	}

	/// Full, unbounded history in request shape.
	pub fn current_history(&self) -> &[Message] {
		&self.api_log
	}

	pub fn len(&self) -> usize {
		self.display_log.len()
	}

	pub fn is_empty(&self) -> bool {
		self.display_log.is_empty()
	}

	pub fn last(&self) -> Option<&Turn> {
		self.display_log.last()
	}

	/// `role : text`, one line per turn.
	pub fn render(&self) -> String {
		self.display_log.iter().map(|t| format!("{} : {}", t.role.label(), t.text)).collect::<Vec<_>>().join("\n")
	}
}
