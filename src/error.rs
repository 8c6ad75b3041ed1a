use crate::action::ActionType;
use crate::card::CardType;

/// Every way a game operation can be rejected. Nothing is mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoupError {
    #[error("missing or unknown client id {0:?}")]
    InvalidClient(String),
    #[error("a player named {0:?} is already seated")]
    NameTaken(String),
    #[error("client {0:?} is not the seat allowed to do this")]
    OutOfTurn(String),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("not enough coins: need {needed}, have {available}")]
    InsufficientFunds { needed: u32, available: u32 },
    #[error("{0} cannot be blocked")]
    NotBlockable(ActionType),
    #[error("{0} cannot be called")]
    NotCallable(ActionType),
    #[error("a player cannot block or call themselves")]
    SelfTargetForbidden,
    #[error("player holds no alive {0}")]
    CardNotFound(CardType),
    #[error("table is full")]
    TableFull,
    #[error("no players are seated")]
    NotEnoughPlayers,
    #[error("invalid target for {0}")]
    InvalidTarget(ActionType),
    #[error("client {0:?} is out of the game")]
    Eliminated(String),
    #[error("deck is empty")]
    DeckEmpty,
    #[error("stacked deck asks for more {0} cards than exist")]
    InvalidDeck(CardType),
}
