use llm_core::ConversationTurn;

/// Conversation history sent with every `ask`. Only completed turns are kept.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// History as it would be sent for a new user message.
    pub fn with_user(&self, text: &str) -> Vec<ConversationTurn> {
        let mut messages = self.turns.clone();
        messages.push(ConversationTurn::user(text));
        messages
    }

    /// Record a completed exchange.
    pub fn commit(&mut self, user: &str, assistant: &str) {
        self.turns.push(ConversationTurn::user(user));
        self.turns.push(ConversationTurn::assistant(assistant));
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
