pub mod action;
pub mod card;
pub mod error;
pub mod game;
pub mod player;
pub mod rules;
pub mod snapshot;
pub mod table;
pub mod turn;

pub use action::ActionType;
pub use card::{Card, CardState, CardType, Deck};
pub use error::CoupError;
pub use game::{Game, GameState};
pub use player::Player;
pub use rules::Rules;
pub use snapshot::Snapshot;
pub use table::Table;
pub use turn::{Turn, TurnState};
