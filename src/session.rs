/// One completed round: what the operator asked and exactly what the backend said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    prompt: String,
    raw_response: String,
}

impl Turn {
    pub fn new(prompt: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            raw_response: raw_response.into(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }
}

/// Conversation state for one process run. History is append-only and kept in round order.
#[derive(Debug, Clone, Default)]
pub struct Session {
    environment_context: String,
    turns: Vec<Turn>,
}

impl Session {
    pub fn new(environment_context: impl Into<String>) -> Self {
        Self {
            environment_context: environment_context.into(),
            turns: Vec::new(),
        }
    }

    pub fn environment_context(&self) -> &str {
        &self.environment_context
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn record_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The turns replayed into the next conversation. `None` replays everything.
    pub fn replay_window(&self, depth: Option<usize>) -> &[Turn] {
        match depth {
            Some(depth) => {
                let start = self.turns.len().saturating_sub(depth);
                &self.turns[start..]
            }
            None => &self.turns,
        }
    }
}
