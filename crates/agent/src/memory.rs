use std::collections::VecDeque;

pub const EMPTY_HISTORY: &str = "No previous conversation.";
pub const DEFAULT_MAX_TURNS: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub user_utterance: String,
    pub agent_response: String,
}

/// Ordered log of completed turns, oldest first. Holds at most `max_turns` entries and
/// drops the oldest on overflow.
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns.max(1);
        Self { turns: VecDeque::with_capacity(max_turns), max_turns }
    }

    pub fn append(&mut self, user_utterance: impl Into<String>, agent_response: impl Into<String>) {
        if self.turns.len() == self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            user_utterance: user_utterance.into(),
            agent_response: agent_response.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> + '_ {
        self.turns.iter()
    }

    pub fn last_response(&self) -> Option<&str> {
        self.turns.back().map(|turn| turn.agent_response.as_str())
    }

    /// `User:` / `Agent:` line pairs in chronological order. Each call starts over.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.turns.iter().flat_map(|turn| {
            [format!("User: {}", turn.user_utterance), format!("Agent: {}", turn.agent_response)]
        })
    }

    pub fn render(&self) -> String {
        if self.turns.is_empty() {
            return EMPTY_HISTORY.to_string();
        }
        self.lines().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationMemory, EMPTY_HISTORY};

    #[test]
    fn empty_memory_renders_sentinel() {
        let memory = ConversationMemory::default();
        assert_eq!(memory.render(), EMPTY_HISTORY);
        assert_eq!(memory.last_response(), None);
    }

    #[test]
    fn render_lists_turns_in_order() {
        let mut memory = ConversationMemory::default();
        memory.append("flight to Paris", "✈️ 5 flights found");
        memory.append("yes", "🏨 hotels too?");

        assert_eq!(
            memory.render(),
            "User: flight to Paris\nAgent: ✈️ 5 flights found\nUser: yes\nAgent: 🏨 hotels too?"
        );
        assert_eq!(memory.last_response(), Some("🏨 hotels too?"));
    }

    #[test]
    fn lines_can_be_iterated_repeatedly() {
        let mut memory = ConversationMemory::default();
        memory.append("a", "b");

        let first: Vec<_> = memory.lines().collect();
        let second: Vec<_> = memory.lines().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn oldest_turn_is_evicted_at_capacity() {
        let mut memory = ConversationMemory::new(2);
        memory.append("one", "1");
        memory.append("two", "2");
        memory.append("three", "3");

        assert_eq!(memory.len(), 2);
        let utterances: Vec<_> = memory.turns().map(|turn| turn.user_utterance.as_str()).collect();
        assert_eq!(utterances, vec!["two", "three"]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut memory = ConversationMemory::new(0);
        memory.append("one", "1");
        memory.append("two", "2");
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.render(), "User: two\nAgent: 2");
    }

    #[test]
    fn empty_strings_are_stored_verbatim() {
        let mut memory = ConversationMemory::default();
        memory.append("", "");
        assert_eq!(memory.render(), "User: \nAgent: ");
    }
}
