use std::collections::HashSet;

/// The slice of a conversation that delivery needs: who takes part in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub public_id: String,
    /// Participant user ids in join order.
    pub participants: Vec<i64>,
    pub last_message_id: Option<i64>,
    pub updated_at: String,
}

impl Conversation {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }

    /// Participants other than `sender_id`, first occurrence wins.
    pub fn recipients_for(&self, sender_id: i64) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.participants
            .iter()
            .copied()
            .filter(|user_id| *user_id != sender_id)
            .filter(|user_id| seen.insert(*user_id))
            .collect()
    }
}
