use serde::{Deserialize, Serialize};
use crate::action::ActionType;
use crate::card::CardType;
use crate::game::{Game, GameState};
use crate::turn::TurnState;

/// Public view of a game for broadcasting to clients: dead cards are face up, live ones hidden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: GameState,
    pub bank: u32,
    pub deck: usize,
    pub players: Vec<SeatView>,
    pub turn: Option<TurnView>,
    pub winner: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub name: String,
    pub coins: u32,
    pub hidden: usize,
    pub revealed: Vec<CardType>,
    pub out: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnView {
    pub number: usize,
    pub actor: String,
    pub action: Option<ActionType>,
    pub target: Option<String>,
    pub state: TurnState,
    pub blocker: Option<String>,
    pub blocked_with: Option<CardType>,
    pub caller: Option<String>,
    pub remaining_ms: Option<u64>,
}

impl Snapshot {
    pub fn of(game: &Game) -> Self {
        let name = |seat: usize| game.player(seat).map(|p| p.name().to_string()).unwrap_or_default();

        let players = game.players()
            .iter()
            .map(|p| SeatView {
                name: p.name().to_string(),
                coins: p.coins(),
                hidden: p.alive_cards().count(),
                revealed: p.cards().iter().filter(|c| !c.is_alive()).map(|c| c.kind()).collect(),
                out: p.is_out(),
            })
            .collect();

        let turn = game.current_turn().map(|t| TurnView {
            number: t.number(),
            actor: name(t.actor()),
            action: t.action(),
            target: t.target().map(name),
            state: t.state(),
            blocker: t.blocker().map(name),
            blocked_with: t.blocked_with(),
            caller: t.caller().map(name),
            remaining_ms: t.window().map(|w| w.remaining().as_millis() as u64),
        });

        Self {
            state: game.state(),
            bank: game.bank(),
            deck: game.deck().len(),
            players,
            turn,
            winner: game.winner().map(|p| p.name().to_string()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
