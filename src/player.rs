use serde::{Deserialize, Serialize};
use crate::action::ActionType;
use crate::card::{Card, CardType};
use crate::error::CoupError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    name: String,
    client_id: String,
    coins: u32,
    cards: Vec<Card>,
    // peeked deck cards during an exchange
    traded: Vec<CardType>,
    out_of_game: bool,
}

impl Player {
    pub fn new(name: impl Into<String>, client_id: impl Into<String>, coins: u32) -> Self {
        Self {
            name: name.into(),
            client_id: client_id.into(),
            coins,
            cards: Vec::with_capacity(3),
            traded: Vec::new(),
            out_of_game: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn coins(&self) -> u32 {
        self.coins
    }

    /// Every card owned, alive and dead.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn traded(&self) -> &[CardType] {
        &self.traded
    }

    pub fn is_out(&self) -> bool {
        self.out_of_game
    }

    pub fn alive_cards(&self) -> impl Iterator<Item = &Card> + '_ {
        self.cards.iter().filter(|c| c.is_alive())
    }

    pub fn has_card(&self, kind: CardType) -> bool {
        self.alive_card(kind).is_some()
    }

    pub fn alive_card(&self, kind: CardType) -> Option<&Card> {
        self.alive_cards().find(|c| c.kind() == kind)
    }

    /// First alive card that entitles this player to `action`.
    pub fn card_for_action(&self, action: ActionType) -> Option<&Card> {
        self.alive_cards().find(|c| c.kind().can_perform(action))
    }

    pub fn kill_card(&mut self, kind: CardType) -> Result<(), CoupError> {
        let card = self.cards
            .iter_mut()
            .find(|c| c.is_alive() && c.kind() == kind)
            .ok_or(CoupError::CardNotFound(kind))?;
        card.kill();
        if self.alive_cards().next().is_none() {
            self.out_of_game = true;
        }
        Ok(())
    }

    /// Takes the first alive card of `kind` out of the hand. Callers must handle `None`.
    pub fn remove_card(&mut self, kind: CardType) -> Option<Card> {
        let idx = self.cards.iter().position(|c| c.is_alive() && c.kind() == kind)?;
        Some(self.cards.remove(idx))
    }

    pub(crate) fn add_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub(crate) fn credit(&mut self, amount: u32) {
        self.coins += amount;
    }

    /// Takes up to `amount`, returning what was actually taken.
    pub(crate) fn debit(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.coins);
        self.coins -= taken;
        taken
    }

    pub(crate) fn set_traded(&mut self, traded: Vec<CardType>) {
        self.traded = traded;
    }

    pub(crate) fn clear_traded(&mut self) {
        self.traded.clear();
    }
}
