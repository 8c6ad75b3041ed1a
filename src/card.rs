use std::fmt::{Display, Formatter};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use crate::action::ActionType;
use crate::error::CoupError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Ambassador,
    Assassin,
    Captain,
    Contessa,
    Duke,
}

pub static CARD_TYPES: [CardType; 5] = [
    CardType::Ambassador,
    CardType::Assassin,
    CardType::Captain,
    CardType::Contessa,
    CardType::Duke,
];

pub const COPIES_PER_TYPE: usize = 3;
pub const DECK_SIZE: usize = CARD_TYPES.len() * COPIES_PER_TYPE;

impl CardType {
    /// True if holding this card entitles a player to block `action`.
    pub fn can_block(self, action: ActionType) -> bool {
        match action {
            ActionType::Ambassador => self == CardType::Ambassador,
            ActionType::Assassinate => self == CardType::Contessa,
            ActionType::ForeignAid => self == CardType::Duke,
            ActionType::Steal => self == CardType::Captain,
            _ => false,
        }
    }

    /// True if holding this card entitles a player to declare `action`.
    pub fn can_perform(self, action: ActionType) -> bool {
        match action {
            ActionType::Ambassador => self == CardType::Ambassador,
            ActionType::Assassinate => self == CardType::Assassin,
            ActionType::Duke => self == CardType::Duke,
            ActionType::Steal => self == CardType::Captain,
            _ => false,
        }
    }
}

impl Display for CardType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardState {
    Alive,
    Dead,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    kind: CardType,
    state: CardState,
}

impl Card {
    pub fn new(kind: CardType) -> Self {
        Self { kind, state: CardState::Alive }
    }

    pub fn kind(&self) -> CardType {
        self.kind
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == CardState::Alive
    }

    pub(crate) fn kill(&mut self) {
        self.state = CardState::Dead;
    }

    pub(crate) fn revive(&mut self) {
        self.state = CardState::Alive;
    }
}

/// The court deck. Cards leave from the front and are shuffled back in on return.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: Vec<Card>,
    rng: Pcg64,
}

impl Deck {
    /// A full, shuffled deck.
    pub fn new() -> Self {
        Self::shuffled(Pcg64::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::shuffled(Pcg64::seed_from_u64(seed))
    }

    fn shuffled(rng: Pcg64) -> Self {
        let mut deck = Self { cards: full_set(), rng };
        deck.shuffle();
        deck
    }

    /// A full deck with `top` on top in the given order and the remaining cards below it, unshuffled.
    /// Later returns still reshuffle using `seed`.
    pub fn stacked(top: &[CardType], seed: u64) -> Result<Self, CoupError> {
        let mut rest: Vec<CardType> = full_set().iter().map(Card::kind).collect();
        let mut cards = Vec::with_capacity(DECK_SIZE);

        for &kind in top {
            let idx = rest.iter().position(|&k| k == kind).ok_or(CoupError::InvalidDeck(kind))?;
            rest.remove(idx);
            cards.push(Card::new(kind));
        }
        cards.extend(rest.into_iter().map(Card::new));

        Ok(Self { cards, rng: Pcg64::seed_from_u64(seed) })
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Removes and returns the top card.
    pub fn draw(&mut self) -> Result<Card, CoupError> {
        if self.cards.is_empty() {
            return Err(CoupError::DeckEmpty);
        }
        Ok(self.cards.remove(0))
    }

    /// Removes the first card of `kind` among the top `depth` cards.
    pub(crate) fn take_from_top(&mut self, kind: CardType, depth: usize) -> Option<Card> {
        let idx = self.cards.iter().take(depth).position(|c| c.kind() == kind)?;
        Some(self.cards.remove(idx))
    }

    /// Puts a card back as alive and reshuffles the whole deck.
    pub fn return_card(&mut self, mut card: Card) {
        card.revive();
        self.cards.push(card);
        self.shuffle();
    }

    pub fn peek_top(&self, n: usize) -> Vec<CardType> {
        self.cards.iter().take(n).map(Card::kind).collect()
    }

    fn shuffle(&mut self) {
        self.cards.shuffle(&mut self.rng);
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

fn full_set() -> Vec<Card> {
    CARD_TYPES.iter()
        .flat_map(|&kind| std::iter::repeat(kind).take(COPIES_PER_TYPE))
        .map(Card::new)
        .collect()
}
