use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "Student"),
            Self::Assistant => write!(f, "Tutor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Full chat history for one session. Only the most recent `render_window`
/// turns are rendered into prompts; older turns are kept for persistence.
///
/// Owned by the session. Turns for one session must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    turns: Vec<ConversationTurn>,
    render_window: usize,
}

impl ConversationWindow {
    pub const fn new(render_window: usize) -> Self {
        Self {
            turns: Vec::new(),
            render_window,
        }
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Records a successful exchange.
    pub fn record_exchange(&mut self, message: impl Into<String>, reply: impl Into<String>) {
        self.append(ConversationTurn::user(message));
        self.append(ConversationTurn::assistant(reply));
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn render(&self) -> String {
        self.render_before(self.turns.len())
    }

    /// Renders the window over the turns strictly before `index`.
    pub fn render_before(&self, index: usize) -> String {
        let end = index.min(self.turns.len());
        let start = end.saturating_sub(self.render_window);
        self.turns[start..end]
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Index of the user turn the last assistant reply answered.
    pub fn last_user_index(&self) -> Option<usize> {
        self.turns.iter().rposition(|turn| turn.role == Role::User)
    }

    /// Replaces everything after the user turn at `user_index` with `reply`.
    /// Returns false when `user_index` is not a user turn.
    pub fn accept_regenerated(&mut self, user_index: usize, reply: impl Into<String>) -> bool {
        if self.turns.get(user_index).map(|turn| turn.role) != Some(Role::User) {
            return false;
        }
        self.turns.truncate(user_index + 1);
        self.append(ConversationTurn::assistant(reply));
        true
    }
}

impl From<&ConversationWindow> for String {
    fn from(value: &ConversationWindow) -> Self {
        value.render()
    }
}
