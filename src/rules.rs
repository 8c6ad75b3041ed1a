use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Tunable constants of a match. Any field missing from a JSON override keeps its default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub starting_coins: u32,
    /// Coins in circulation: bank plus every purse always sums to this.
    pub bank: u32,
    pub max_players: usize,
    /// How long others may block or call before a blockable action resolves on its own.
    #[serde(with = "seconds")]
    pub response_window: Duration,
    pub coup_cost: u32,
    pub assassinate_cost: u32,
    pub steal_amount: u32,
    pub exchange_peek: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            starting_coins: 2,
            bank: 50,
            max_players: 6,
            response_window: Duration::from_secs(10),
            coup_cost: 7,
            assassinate_cost: 3,
            steal_amount: 2,
            exchange_peek: 2,
        }
    }
}

impl Rules {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

mod seconds {
    use std::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
