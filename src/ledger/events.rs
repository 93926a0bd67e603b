use serde::{Deserialize, Serialize};

/// Game-flow events that deposit a fixed score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreEvent {
    GameStarted,
    Verified,
    Expired,
}

impl ScoreEvent {
    pub fn points(self) -> i64 {
        match self {
            ScoreEvent::GameStarted => 5,
            ScoreEvent::Verified => 10,
            ScoreEvent::Expired => -2,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ScoreEvent::GameStarted => "Game Started Score",
            ScoreEvent::Verified => "Verification Successful",
            ScoreEvent::Expired => "Challenge Expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ScoreEvent;

    #[test]
    fn events_parse_from_snake_case() {
        let e: ScoreEvent = serde_json::from_str("\"game_started\"").unwrap();
        assert_eq!(e, ScoreEvent::GameStarted);
        assert_eq!(e.points(), 5);
        assert_eq!(ScoreEvent::Expired.points(), -2);
        assert!(serde_json::from_str::<ScoreEvent>("\"cheated\"").is_err());
    }
}
