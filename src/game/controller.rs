//! Player controllers: the session side of a player

use uuid::Uuid;

use crate::replication::protocol::{ControllerSnapshot, PlayerInfo};

/// Longest display name accepted from a client
pub const MAX_NAME_LEN: usize = 10;

/// Session-scoped player state. Outlives the characters it possesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerController {
    pub user_id: Uuid,
    pub display_name: String,
    pub kills: u32,
    pub deaths: u32,
    /// Possessed character, if any
    pub character: Option<Uuid>,
    /// Highest intent sequence number accepted so far
    pub last_intent_seq: u32,
}

impl PlayerController {
    pub fn new(user_id: Uuid, requested_name: Option<&str>) -> Self {
        Self {
            user_id,
            display_name: display_name_for(user_id, requested_name),
            kills: 0,
            deaths: 0,
            character: None,
            last_intent_seq: 0,
        }
    }

    /// Accept `seq` if it is newer than everything seen so far.
    /// Redelivered and out-of-date intents are refused.
    pub fn accept_sequence(&mut self, seq: u32) -> bool {
        if seq <= self.last_intent_seq {
            return false;
        }
        self.last_intent_seq = seq;
        true
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
        }
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
            kills: self.kills,
            deaths: self.deaths,
            character_id: self.character,
        }
    }
}

/// Use the requested name unless it is empty, numeric or too long
pub fn display_name_for(user_id: Uuid, requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(name) if is_valid_name(name) => name.to_string(),
        _ => format!("Player_{}", &user_id.simple().to_string()[..8]),
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !is_numeric(name) && name.chars().count() <= MAX_NAME_LEN
}

/// Optional sign, then only digits with at most one decimal point
fn is_numeric(name: &str) -> bool {
    let unsigned = name.strip_prefix(['+', '-']).unwrap_or(name);
    let mut seen_dot = false;
    unsigned.chars().all(|c| match c {
        '.' if !seen_dot => {
            seen_dot = true;
            true
        }
        c => c.is_ascii_digit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_game_mode_rule() {
        let id = Uuid::new_v4();
        assert_eq!(display_name_for(id, Some("Ripley")), "Ripley");
        assert_eq!(display_name_for(id, Some(" Ripley ")), "Ripley");

        for rejected in ["12345", "3.5", "", "ElevenChars"] {
            let name = display_name_for(id, Some(rejected));
            assert!(name.starts_with("Player_"), "{rejected} should be replaced");
        }
        assert_eq!(display_name_for(id, None).len(), "Player_".len() + 8);
    }

    #[test]
    fn only_plain_decimal_numbers_count_as_numeric() {
        let id = Uuid::new_v4();
        for kept in ["inf", "NaN", "Infinity", "1e5", "1.2.3", "x42"] {
            assert_eq!(display_name_for(id, Some(kept)), kept);
        }
        for numeric in ["-7", "+0.5", "42."] {
            assert!(is_numeric(numeric), "{numeric} is numeric");
        }
    }

    #[test]
    fn sequence_numbers_are_idempotent() {
        let mut controller = PlayerController::new(Uuid::new_v4(), None);
        assert!(controller.accept_sequence(1));
        assert!(!controller.accept_sequence(1));
        assert!(controller.accept_sequence(5));
        assert!(!controller.accept_sequence(3));
        assert_eq!(controller.last_intent_seq, 5);
    }
}
