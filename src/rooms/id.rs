use crate::{error::ChatError, model::RoomId};

const SEPARATOR: char = '_';

/// Room shared by two participants; the same whichever side asks.
pub fn resolve_room_id(a: &str, b: &str) -> Result<RoomId, ChatError> {
    if a.is_empty() || b.is_empty() {
        return Err(ChatError::invalid("room participants must have non-empty ids"));
    }

    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    Ok(RoomId(format!("{first}{SEPARATOR}{second}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alice_and_bob() {
        assert_eq!(resolve_room_id("alice", "bob").unwrap().as_str(), "alice_bob");
        assert_eq!(resolve_room_id("bob", "alice").unwrap().as_str(), "alice_bob");
    }

    #[test]
    fn order_independent() {
        let pairs = [
            ("x", "y"),
            ("Zed", "abe"),
            ("uid-9", "uid-10"),
            ("same", "same"),
            ("ñandú", "nandu"),
        ];
        for (a, b) in pairs {
            assert_eq!(resolve_room_id(a, b).unwrap(), resolve_room_id(b, a).unwrap());
        }
    }

    #[test]
    fn empty_ids_are_rejected() {
        assert!(matches!(resolve_room_id("", "bob"), Err(ChatError::InvalidArgument(_))));
        assert!(matches!(resolve_room_id("alice", ""), Err(ChatError::InvalidArgument(_))));
    }
}
