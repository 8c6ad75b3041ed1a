use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use crate::card::{CardType, CARD_TYPES};
use crate::rules::Rules;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Block,
    Call,
    Coup,
    Duke,
    Steal,
    ForeignAid,
    Assassinate,
    Ambassador,
    TakeOne,
}

impl ActionType {
    /// Whether other players get a response window to block or call this action.
    pub fn blockable(self) -> bool {
        !matches!(self, ActionType::Call | ActionType::Block | ActionType::TakeOne | ActionType::Coup)
    }

    /// Whether some card claim backs this action, making it challengeable.
    pub fn callable(self) -> bool {
        self.blockable() && CARD_TYPES.iter().any(|card| card.can_perform(self))
    }

    pub fn needs_target(self) -> bool {
        matches!(self, ActionType::Coup | ActionType::Assassinate | ActionType::Steal)
    }

    /// Coins the actor pays when declaring.
    pub fn cost(self, rules: &Rules) -> u32 {
        match self {
            ActionType::Coup => rules.coup_cost,
            ActionType::Assassinate => rules.assassinate_cost,
            _ => 0,
        }
    }

    /// Only meaningful as turn declarations; Block and Call are responses.
    pub fn declarable(self) -> bool {
        !matches!(self, ActionType::Block | ActionType::Call)
    }
}

pub fn blockable(action: ActionType) -> bool {
    action.blockable()
}

pub fn can_block(card: CardType, action: ActionType) -> bool {
    card.can_block(action)
}

pub fn can_perform(card: CardType, action: ActionType) -> bool {
    card.can_perform(action)
}

impl Display for ActionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Block => f.write_str("Block"),
            ActionType::Call => f.write_str("Call"),
            ActionType::Coup => f.write_str("Coup"),
            ActionType::Duke => f.write_str("Duke"),
            ActionType::Steal => f.write_str("Steal"),
            ActionType::ForeignAid => f.write_str("ForeignAid"),
            ActionType::Assassinate => f.write_str("Assassinate"),
            ActionType::Ambassador => f.write_str("Ambassador"),
            ActionType::TakeOne => f.write_str("TakeOne"),
        }
    }
}
