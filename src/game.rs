use std::fmt::{Debug, Formatter};
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use crate::action::ActionType;
use crate::card::{CardType, Deck};
use crate::error::CoupError;
use crate::player::Player;
use crate::rules::Rules;
use crate::snapshot::Snapshot;
use crate::turn::{Turn, TurnState};

const CARDS_PER_PLAYER: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Pending,
    Playing,
    Finished,
}

/// One match: seating, deck, bank and the turn being resolved.
///
/// Every operation validates fully before it mutates anything, so a rejected
/// call leaves the game exactly as it was.
pub struct Game {
    rules: Rules,
    state: GameState,
    players: Vec<Player>,
    bank: u32,
    deck: Deck,
    current_turn: Option<Turn>,
    turns: Vec<Turn>,
    winner: Option<usize>,
}

impl Debug for Game {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.current_turn {
            Some(turn) => writeln!(f, "T {} | P {} | {:?} {:?}", turn.number(), turn.actor(), turn.action(), turn.state())?,
            None => writeln!(f, "{:?}", self.state)?,
        }
        for (seat, player) in self.players.iter().enumerate() {
            let cards: Vec<String> = player.cards().iter().map(|c| format!("{:?}/{:?}", c.kind(), c.state())).collect();
            writeln!(f, "\tP {seat}: ${} | {}", player.coins(), cards.join(", "))?;
        }
        Ok(())
    }
}

impl Game {
    pub fn new(rules: Rules) -> Self {
        Self::with_deck(rules, Deck::new())
    }

    pub fn with_deck(rules: Rules, deck: Deck) -> Self {
        Self {
            bank: rules.bank,
            players: Vec::with_capacity(rules.max_players),
            state: GameState::Pending,
            current_turn: None,
            turns: Vec::new(),
            winner: None,
            rules,
            deck,
        }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, seat: usize) -> Option<&Player> {
        self.players.get(seat)
    }

    pub fn bank(&self) -> u32 {
        self.bank
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn current_turn(&self) -> Option<&Turn> {
        self.current_turn.as_ref()
    }

    /// Retired turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn winner(&self) -> Option<&Player> {
        self.winner.and_then(|seat| self.players.get(seat))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::of(self)
    }

    pub fn add_player(&mut self, name: &str, client_id: &str) -> Result<(), CoupError> {
        if self.state != GameState::Pending {
            return Err(CoupError::InvalidState("players can only join before the game starts"));
        }
        if client_id.is_empty() || self.players.iter().any(|p| p.client_id() == client_id) {
            return Err(CoupError::InvalidClient(client_id.to_string()));
        }
        if self.players.iter().any(|p| p.name() == name) {
            return Err(CoupError::NameTaken(name.to_string()));
        }
        if self.players.len() >= self.rules.max_players {
            return Err(CoupError::TableFull);
        }

        let coins = self.withdraw(self.rules.starting_coins);
        self.players.push(Player::new(name, client_id, coins));
        log::info!("[game] {} sits at seat {}", name, self.players.len() - 1);
        Ok(())
    }

    pub fn start_game(&mut self) -> Result<(), CoupError> {
        if self.state != GameState::Pending {
            return Err(CoupError::InvalidState("game has already started"));
        }
        if self.players.is_empty() {
            return Err(CoupError::NotEnoughPlayers);
        }
        if self.deck.len() < self.players.len() * CARDS_PER_PLAYER {
            return Err(CoupError::DeckEmpty);
        }

        for seat in 0..self.players.len() {
            for _ in 0..CARDS_PER_PLAYER {
                let card = self.deck.draw()?;
                self.players[seat].add_card(card);
            }
        }

        self.current_turn = Some(Turn::new(0, 0));
        self.state = GameState::Playing;
        log::info!("[game] started with {} players, {} is up", self.players.len(), self.players[0].name());
        Ok(())
    }

    /// Declares the current seat's action. Blockable actions open a response window;
    /// everything else takes effect immediately.
    pub fn turn(&mut self, client_id: &str, action: ActionType, target: Option<&str>) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if seat != turn.actor() {
            return Err(CoupError::OutOfTurn(client_id.to_string()));
        }
        if turn.state() != TurnState::Pending {
            return Err(CoupError::InvalidState("turn has already been submitted"));
        }
        if !action.declarable() {
            return Err(CoupError::InvalidState("block and call are responses, not turns"));
        }

        let target = if action.needs_target() {
            Some(self.target_seat(seat, action, target)?)
        } else {
            None
        };

        let cost = action.cost(&self.rules);
        let available = self.players[seat].coins();
        if available < cost {
            return Err(CoupError::InsufficientFunds { needed: cost, available });
        }

        self.players[seat].debit(cost);
        self.bank += cost;

        let window = self.rules.response_window;
        let turn = self.turn_mut()?;
        turn.submit(action, target);

        match target {
            Some(target) => log::info!("[game] {} declares {} on {}", self.players[seat].name(), action, self.players[target].name()),
            None => log::info!("[game] {} declares {}", self.players[seat].name(), action),
        }

        if action.blockable() {
            self.turn_mut()?.open_window(window);
            log::debug!("[game] response window open for {:?}", window);
        } else {
            self.take_effect();
        }
        Ok(())
    }

    pub fn block_turn(&mut self, client_id: &str, claimed: CardType) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if turn.state() != TurnState::Submitted {
            return Err(CoupError::InvalidState("turn can only be blocked while submitted"));
        }
        Self::window_still_open(turn)?;
        let action = turn.action().ok_or(CoupError::InvalidState("turn has no action"))?;
        if !action.blockable() {
            return Err(CoupError::NotBlockable(action));
        }
        if seat == turn.actor() {
            return Err(CoupError::SelfTargetForbidden);
        }
        if !claimed.can_block(action) {
            return Err(CoupError::NotBlockable(action));
        }

        let window = self.rules.response_window;
        let turn = self.turn_mut()?;
        turn.close_window();
        turn.block(seat, claimed);
        turn.open_window(window);
        log::info!("[game] {} blocks {} claiming {}", self.players[seat].name(), action, claimed);
        Ok(())
    }

    pub fn call_block(&mut self, client_id: &str) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if turn.state() != TurnState::Blocking {
            return Err(CoupError::InvalidState("there is no block to call"));
        }
        let (blocker, claimed, action) = match (turn.blocker(), turn.blocked_with(), turn.action()) {
            (Some(blocker), Some(claimed), Some(action)) => (blocker, claimed, action),
            _ => return Err(CoupError::InvalidState("block is incomplete")),
        };
        Self::window_still_open(turn)?;
        if seat == blocker {
            return Err(CoupError::SelfTargetForbidden);
        }

        let honest = self.players[blocker].has_card(claimed) && claimed.can_block(action);
        let turn = self.turn_mut()?;
        turn.close_window();
        turn.set_caller(seat);
        if honest {
            turn.set_state(TurnState::Blocked);
            log::info!("[game] {} calls the block but {} holds {}", self.players[seat].name(), self.players[blocker].name(), claimed);
        } else {
            turn.set_state(TurnState::BlockFailed);
            log::info!("[game] {} exposes {}'s block", self.players[seat].name(), self.players[blocker].name());
        }
        Ok(())
    }

    pub fn call_turn(&mut self, client_id: &str) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if turn.state() != TurnState::Submitted {
            return Err(CoupError::InvalidState("turn can only be called while submitted"));
        }
        Self::window_still_open(turn)?;
        let action = turn.action().ok_or(CoupError::InvalidState("turn has no action"))?;
        if !action.callable() {
            return Err(CoupError::NotCallable(action));
        }
        let actor = turn.actor();
        if seat == actor {
            return Err(CoupError::SelfTargetForbidden);
        }

        let revealed = self.players[actor].card_for_action(action).map(|c| c.kind());
        let turn = self.turn_mut()?;
        turn.close_window();
        turn.set_caller(seat);

        match revealed {
            Some(kind) => {
                turn.set_state(TurnState::CallFailed);
                if let Some(card) = self.players[actor].remove_card(kind) {
                    self.deck.return_card(card);
                }
                log::info!("[game] {} calls {} but {} reveals {}", self.players[seat].name(), action, self.players[actor].name(), kind);
            }
            None => {
                turn.set_state(TurnState::Called);
                log::info!("[game] {} catches {} bluffing {}", self.players[seat].name(), self.players[actor].name(), action);
            }
        }
        Ok(())
    }

    /// Finishes an exchange: the actor keeps one of the peeked cards and gives one of theirs back.
    /// Keeping nothing, or keeping the same type that is returned, leaves the hand as it is.
    pub fn resolve_ambassador(&mut self, client_id: &str, keep: Option<CardType>, give_back: CardType) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if seat != turn.actor() {
            return Err(CoupError::OutOfTurn(client_id.to_string()));
        }
        if turn.action() != Some(ActionType::Ambassador) || turn.state() != TurnState::AwaitingTarget {
            return Err(CoupError::InvalidState("no exchange is waiting to be resolved"));
        }

        if let Some(keep) = keep.filter(|&k| k != give_back) {
            if !self.players[seat].traded().contains(&keep) {
                return Err(CoupError::CardNotFound(keep));
            }
            if !self.players[seat].has_card(give_back) {
                return Err(CoupError::CardNotFound(give_back));
            }

            let kept = self.deck
                .take_from_top(keep, self.rules.exchange_peek)
                .ok_or(CoupError::CardNotFound(keep))?;
            self.players[seat].add_card(kept);
            if let Some(card) = self.players[seat].remove_card(give_back) {
                self.deck.return_card(card);
            }
            log::info!("[game] {} exchanges a card", self.players[seat].name());
        }

        self.complete_turn();
        Ok(())
    }

    /// The caller of a truthful action forfeits a card; the actor replaces the card they revealed
    /// and the action then goes through.
    pub fn resolve_failed_call(&mut self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if turn.state() != TurnState::CallFailed {
            return Err(CoupError::InvalidState("there is no failed call to resolve"));
        }
        if turn.caller() != Some(seat) {
            return Err(CoupError::OutOfTurn(client_id.to_string()));
        }
        let actor = turn.actor();

        self.lose_card(seat, lose)?;
        let replacement = self.deck.draw()?;
        self.players[actor].add_card(replacement);

        if self.state == GameState::Finished {
            self.complete_turn();
        } else {
            self.take_effect();
        }
        Ok(())
    }

    /// The actor was caught bluffing: they forfeit a card and the action is void.
    pub fn resolve_called(&mut self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if turn.state() != TurnState::Called {
            return Err(CoupError::InvalidState("there is no upheld call to resolve"));
        }
        if seat != turn.actor() {
            return Err(CoupError::OutOfTurn(client_id.to_string()));
        }

        self.lose_card(seat, lose)?;
        self.complete_turn();
        Ok(())
    }

    /// The block was honest: its caller forfeits a card, the blocker swaps the revealed card
    /// for a fresh one and the action is void.
    pub fn resolve_blocked(&mut self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if turn.state() != TurnState::Blocked {
            return Err(CoupError::InvalidState("there is no upheld block to resolve"));
        }
        if turn.caller() != Some(seat) {
            return Err(CoupError::OutOfTurn(client_id.to_string()));
        }
        let (blocker, claimed) = match (turn.blocker(), turn.blocked_with()) {
            (Some(blocker), Some(claimed)) => (blocker, claimed),
            _ => return Err(CoupError::InvalidState("block is incomplete")),
        };

        self.lose_card(seat, lose)?;
        if let Some(card) = self.players[blocker].remove_card(claimed) {
            self.deck.return_card(card);
            let replacement = self.deck.draw()?;
            self.players[blocker].add_card(replacement);
        }
        self.complete_turn();
        Ok(())
    }

    /// The blocker was bluffing: they forfeit a card and the action goes through.
    pub fn resolve_block_failed(&mut self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if turn.state() != TurnState::BlockFailed {
            return Err(CoupError::InvalidState("there is no failed block to resolve"));
        }
        if turn.blocker() != Some(seat) {
            return Err(CoupError::OutOfTurn(client_id.to_string()));
        }

        self.lose_card(seat, lose)?;
        if self.state == GameState::Finished {
            self.complete_turn();
        } else {
            self.take_effect();
        }
        Ok(())
    }

    /// The target of a coup or assassination picks the card they lose.
    pub fn resolve_target(&mut self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        let seat = self.seat_of(client_id)?;
        let turn = self.live_turn()?;

        if turn.state() != TurnState::AwaitingTarget
            || !matches!(turn.action(), Some(ActionType::Coup | ActionType::Assassinate))
        {
            return Err(CoupError::InvalidState("no target is waiting to lose a card"));
        }
        if turn.target() != Some(seat) {
            return Err(CoupError::OutOfTurn(client_id.to_string()));
        }

        self.lose_card(seat, lose)?;
        self.complete_turn();
        Ok(())
    }

    /// Called when the response window of turn `number` runs out. A submitted action goes through
    /// and a standing block wins. Returns false if the wake-up is stale.
    pub fn expire(&mut self, number: usize) -> bool {
        let Some(turn) = self.current_turn.as_mut() else {
            return false;
        };
        if turn.number() != number {
            log::trace!("[game] ignoring timer for retired turn {}", number);
            return false;
        }
        match turn.window() {
            Some(window) if window.expired() => {}
            _ => {
                log::trace!("[game] ignoring timer for turn {}, window closed or still open", number);
                return false;
            }
        }
        turn.close_window();

        match turn.state() {
            TurnState::Submitted => {
                log::debug!("[game] turn {} went unanswered", number);
                self.take_effect();
                true
            }
            TurnState::Blocking => {
                log::info!("[game] block on turn {} stands", number);
                self.complete_turn();
                true
            }
            _ => false,
        }
    }

    /// Deadline of the current turn's window if nothing is scheduled to expire it yet.
    pub fn unarmed_window(&self) -> Option<(usize, Instant)> {
        let turn = self.current_turn.as_ref()?;
        let window = turn.window()?;
        if window.armed() {
            None
        } else {
            Some((turn.number(), window.deadline()))
        }
    }

    /// Hands the expiry task of turn `number` to the turn so a block or call can abort it.
    pub fn arm(&mut self, number: usize, task: AbortHandle) -> bool {
        match self.current_turn.as_mut() {
            Some(turn) if turn.number() == number => turn.arm(task),
            _ => {
                task.abort();
                false
            }
        }
    }
}

impl Game {
    fn seat_of(&self, client_id: &str) -> Result<usize, CoupError> {
        let seat = self.players
            .iter()
            .position(|p| !client_id.is_empty() && p.client_id() == client_id)
            .ok_or_else(|| CoupError::InvalidClient(client_id.to_string()))?;
        if self.players[seat].is_out() {
            return Err(CoupError::Eliminated(client_id.to_string()));
        }
        Ok(seat)
    }

    fn target_seat(&self, actor: usize, action: ActionType, name: Option<&str>) -> Result<usize, CoupError> {
        let name = name.ok_or(CoupError::InvalidTarget(action))?;
        self.players
            .iter()
            .position(|p| p.name() == name)
            .filter(|&seat| seat != actor && !self.players[seat].is_out())
            .ok_or(CoupError::InvalidTarget(action))
    }

    fn live_turn(&self) -> Result<&Turn, CoupError> {
        if self.state != GameState::Playing {
            return Err(CoupError::InvalidState("game is not being played"));
        }
        self.current_turn.as_ref().ok_or(CoupError::InvalidState("no turn is open"))
    }

    fn turn_mut(&mut self) -> Result<&mut Turn, CoupError> {
        self.current_turn.as_mut().ok_or(CoupError::InvalidState("no turn is open"))
    }

    fn window_still_open(turn: &Turn) -> Result<(), CoupError> {
        match turn.window() {
            Some(window) if window.expired() => Err(CoupError::InvalidState("response window has closed")),
            _ => Ok(()),
        }
    }

    /// Pays out of the bank, as much as it holds.
    fn withdraw(&mut self, amount: u32) -> u32 {
        let paid = amount.min(self.bank);
        self.bank -= paid;
        paid
    }

    fn pay(&mut self, seat: usize, amount: u32) {
        let paid = self.withdraw(amount);
        self.players[seat].credit(paid);
    }

    fn lose_card(&mut self, seat: usize, kind: CardType) -> Result<(), CoupError> {
        self.players[seat].kill_card(kind)?;
        log::info!("[game] {} loses {}", self.players[seat].name(), kind);

        if self.players[seat].is_out() {
            log::info!("[game] {} is out", self.players[seat].name());
            let mut living = self.players.iter().enumerate().filter(|(_, p)| !p.is_out());
            if let (Some((winner, player)), None) = (living.next(), living.next()) {
                log::info!("[game] {} wins", player.name());
                self.winner = Some(winner);
                self.state = GameState::Finished;
            }
        }
        Ok(())
    }

    /// Applies the declared action of the current turn.
    fn take_effect(&mut self) {
        let Some(turn) = self.current_turn.as_ref() else {
            return;
        };
        let (actor, target) = (turn.actor(), turn.target());
        let Some(action) = turn.action() else {
            return;
        };

        let next = match (action, target) {
            (ActionType::TakeOne, _) => {
                self.pay(actor, 1);
                TurnState::Complete
            }
            (ActionType::ForeignAid, _) => {
                self.pay(actor, 2);
                TurnState::Complete
            }
            (ActionType::Duke, _) => {
                self.pay(actor, 3);
                TurnState::Complete
            }
            (ActionType::Steal, Some(target)) => {
                let taken = self.players[target].debit(self.rules.steal_amount);
                self.players[actor].credit(taken);
                log::info!("[game] {} takes {} from {}", self.players[actor].name(), taken, self.players[target].name());
                TurnState::Complete
            }
            (ActionType::Coup | ActionType::Assassinate, Some(target)) => {
                // target may already be out after losing a challenge
                if self.players[target].is_out() {
                    TurnState::Complete
                } else {
                    TurnState::AwaitingTarget
                }
            }
            (ActionType::Ambassador, _) => {
                let peeked = self.deck.peek_top(self.rules.exchange_peek);
                self.players[actor].set_traded(peeked);
                TurnState::AwaitingTarget
            }
            _ => TurnState::Complete,
        };

        if next == TurnState::Complete {
            self.complete_turn();
        } else if let Some(turn) = self.current_turn.as_mut() {
            turn.set_state(next);
        }
    }

    fn complete_turn(&mut self) {
        let Some(mut turn) = self.current_turn.take() else {
            return;
        };
        turn.close_window();
        turn.set_state(TurnState::Complete);
        self.players[turn.actor()].clear_traded();

        let next = self.advance_to_next_seat(turn.actor());
        self.turns.push(turn);

        if self.state == GameState::Playing {
            self.current_turn = Some(Turn::new(self.turns.len(), next));
            log::info!("[game] it is {}'s turn", self.players[next].name());
        }
    }

    /// Next living seat after `seat`, wrapping to the front.
    fn advance_to_next_seat(&self, seat: usize) -> usize {
        let n = self.players.len();
        (1..=n)
            .map(|step| (seat + step) % n)
            .find(|&idx| !self.players[idx].is_out())
            .unwrap_or(seat)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;
    use crate::card::{Card, CARD_TYPES, DECK_SIZE};
    use crate::card::CardType::{Ambassador, Assassin, Captain, Contessa, Duke};
    use super::*;

    const NAMES: [&str; 6] = ["Michael", "John", "Alex", "Eddy", "Ana", "Bo"];
    const CLIENTS: [&str; 6] = ["1", "2", "3", "4", "5", "6"];

    fn game_with(rules: Rules, hands: &[[CardType; 2]]) -> Game {
        let top: Vec<CardType> = hands.iter().flatten().copied().collect();
        let mut game = Game::with_deck(rules, Deck::stacked(&top, 42).unwrap());
        for seat in 0..hands.len() {
            game.add_player(NAMES[seat], CLIENTS[seat]).unwrap();
        }
        game.start_game().unwrap();
        game
    }

    fn game(hands: &[[CardType; 2]]) -> Game {
        game_with(Rules::default(), hands)
    }

    // windows that are already over when opened, so `expire` can run synchronously
    fn instant_game(hands: &[[CardType; 2]]) -> Game {
        game_with(Rules { response_window: Duration::ZERO, ..Rules::default() }, hands)
    }

    fn expire(game: &mut Game) {
        let number = game.current_turn().unwrap().number();
        assert!(game.expire(number));
    }

    fn turn_state(game: &Game) -> TurnState {
        game.current_turn().unwrap().state()
    }

    fn actor(game: &Game) -> usize {
        game.current_turn().unwrap().actor()
    }

    fn coins(game: &Game, seat: usize) -> u32 {
        game.players()[seat].coins()
    }

    fn alive(game: &Game, seat: usize) -> Vec<CardType> {
        game.players()[seat].alive_cards().map(Card::kind).collect()
    }

    fn assert_conserved(game: &Game) {
        let mut counts: HashMap<CardType, usize> = HashMap::new();
        let hands = game.players().iter().flat_map(|p| p.cards());
        for card in game.deck().cards().iter().chain(hands) {
            *counts.entry(card.kind()).or_default() += 1;
        }
        assert_eq!(counts.values().sum::<usize>(), DECK_SIZE);
        for kind in CARD_TYPES {
            assert_eq!(counts[&kind], 3, "{kind} count");
        }

        let purses: u32 = game.players().iter().map(Player::coins).sum();
        assert_eq!(game.bank() + purses, game.rules().bank);
    }

    const FOUR: [[CardType; 2]; 4] = [
        [Ambassador, Duke],
        [Captain, Contessa],
        [Duke, Assassin],
        [Captain, Contessa],
    ];

    #[test]
    fn seating() {
        let mut game = Game::new(Rules::default());
        game.add_player("Michael", "1").unwrap();
        assert_eq!(game.add_player("Again", "1"), Err(CoupError::InvalidClient("1".into())));
        assert_eq!(game.add_player("Nobody", ""), Err(CoupError::InvalidClient("".into())));
        assert_eq!(game.add_player("Michael", "9"), Err(CoupError::NameTaken("Michael".into())));
        assert_eq!(game.players().len(), 1);
        assert_eq!(game.bank(), 50 - 2);
        for seat in 1..6 {
            game.add_player(NAMES[seat], CLIENTS[seat]).unwrap();
        }
        assert_eq!(game.add_player("Seven", "7"), Err(CoupError::TableFull));
        assert_eq!(game.players()[0].coins(), 2);
        assert_eq!(game.bank(), 50 - 12);

        game.start_game().unwrap();
        assert_eq!(game.add_player("Late", "8"), Err(CoupError::InvalidState("players can only join before the game starts")));
        assert_eq!(game.start_game(), Err(CoupError::InvalidState("game has already started")));
    }

    #[test]
    fn start_requires_players() {
        let mut game = Game::new(Rules::default());
        assert_eq!(game.start_game(), Err(CoupError::NotEnoughPlayers));
        assert_eq!(game.state(), GameState::Pending);
        assert!(game.current_turn().is_none());
    }

    #[test]
    fn start_deals_two_each() {
        let game = game(&FOUR);
        assert_eq!(game.state(), GameState::Playing);
        assert_eq!(game.deck().len(), 7);
        assert_eq!(alive(&game, 2), vec![Duke, Assassin]);
        assert_eq!(actor(&game), 0);
        assert_eq!(turn_state(&game), TurnState::Pending);
        assert_conserved(&game);
    }

    #[test]
    fn reference_match() {
        let mut game = game(&FOUR);

        // Michael exchanges: a blockable action that resolves itself when nobody answers
        game.rules.response_window = Duration::ZERO;
        game.turn("1", ActionType::Ambassador, None).unwrap();
        assert_eq!(turn_state(&game), TurnState::Submitted);
        assert!(game.current_turn().unwrap().window().is_some());
        expire(&mut game);
        assert_eq!(turn_state(&game), TurnState::AwaitingTarget);

        let peeked = game.players()[0].traded().to_vec();
        assert_eq!(peeked.len(), 2);
        assert_eq!(peeked, game.deck().peek_top(2));

        game.resolve_ambassador("1", Some(peeked[0]), Duke).unwrap();
        assert_eq!(game.players()[0].cards().len(), 2);
        assert!(game.players()[0].traded().is_empty());
        assert_eq!(actor(&game), 1);
        assert_eq!(game.turns().len(), 1);
        assert_conserved(&game);

        game.rules.response_window = Duration::from_secs(10);

        // John takes one, no window
        game.turn("2", ActionType::TakeOne, None).unwrap();
        assert_eq!(coins(&game, 1), 3);
        assert_eq!(actor(&game), 2);
        assert!(game.turns().iter().all(|t| t.state() == TurnState::Complete));

        // Alex claims Duke, Eddy calls it, Alex has it
        game.turn("3", ActionType::Duke, None).unwrap();
        game.call_turn("4").unwrap();
        assert_eq!(turn_state(&game), TurnState::CallFailed);
        assert_eq!(game.players()[2].cards().len(), 1);
        assert_eq!(game.deck().len(), 8);
        assert_eq!(coins(&game, 2), 2);
        assert_conserved(&game);

        assert_eq!(game.resolve_failed_call("2", Captain), Err(CoupError::OutOfTurn("2".into())));
        assert_eq!(game.resolve_failed_call("4", Duke), Err(CoupError::CardNotFound(Duke)));
        assert_eq!(turn_state(&game), TurnState::CallFailed);

        game.resolve_failed_call("4", Contessa).unwrap();
        assert_eq!(alive(&game, 3), vec![Captain]);
        assert_eq!(game.players()[2].cards().len(), 2);
        assert_eq!(coins(&game, 2), 5);
        assert_eq!(actor(&game), 3);
        assert_conserved(&game);
    }

    #[test]
    fn rejected_calls_change_nothing() {
        let mut game = game(&FOUR);
        let before = format!("{:?}", game);

        assert_eq!(game.turn("", ActionType::TakeOne, None), Err(CoupError::InvalidClient("".into())));
        assert_eq!(game.turn("9", ActionType::TakeOne, None), Err(CoupError::InvalidClient("9".into())));
        assert_eq!(game.turn("2", ActionType::TakeOne, None), Err(CoupError::OutOfTurn("2".into())));
        assert_eq!(game.turn("1", ActionType::Block, None), Err(CoupError::InvalidState("block and call are responses, not turns")));
        assert_eq!(game.turn("1", ActionType::Coup, Some("John")), Err(CoupError::InsufficientFunds { needed: 7, available: 2 }));
        assert_eq!(game.turn("1", ActionType::Steal, None), Err(CoupError::InvalidTarget(ActionType::Steal)));
        assert_eq!(game.turn("1", ActionType::Steal, Some("Michael")), Err(CoupError::InvalidTarget(ActionType::Steal)));
        assert_eq!(game.turn("1", ActionType::Steal, Some("Nobody")), Err(CoupError::InvalidTarget(ActionType::Steal)));
        assert_eq!(game.block_turn("2", Duke), Err(CoupError::InvalidState("turn can only be blocked while submitted")));
        assert_eq!(game.call_turn("2"), Err(CoupError::InvalidState("turn can only be called while submitted")));

        assert_eq!(format!("{:?}", game), before);
        assert_eq!(turn_state(&game), TurnState::Pending);
    }

    #[test]
    fn resubmission_is_rejected() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::Duke, None).unwrap();
        assert_eq!(game.turn("1", ActionType::TakeOne, None), Err(CoupError::InvalidState("turn has already been submitted")));
        assert_eq!(game.current_turn().unwrap().action(), Some(ActionType::Duke));
    }

    #[test]
    fn take_one_resolves_immediately() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::TakeOne, None).unwrap();
        assert_eq!(coins(&game, 0), 3);
        assert_eq!(actor(&game), 1);
        assert!(game.turns()[0].window().is_none());
        assert_eq!(game.bank(), 50 - 8 - 1);
    }

    #[test]
    fn rotation_wraps_to_first_seat() {
        let mut game = game(&FOUR);
        for client in CLIENTS.iter().take(4) {
            game.turn(client, ActionType::TakeOne, None).unwrap();
        }
        assert_eq!(actor(&game), 0);
        assert_eq!(game.turns().len(), 4);
        assert_eq!(game.turns()[3].actor(), 3);
    }

    #[test]
    fn foreign_aid_and_duke_payouts() {
        let mut game = instant_game(&FOUR);
        game.turn("1", ActionType::ForeignAid, None).unwrap();
        expire(&mut game);
        assert_eq!(coins(&game, 0), 4);

        game.turn("2", ActionType::Duke, None).unwrap();
        expire(&mut game);
        assert_eq!(coins(&game, 1), 5);
        assert_conserved(&game);
    }

    #[test]
    fn steal_never_takes_more_than_the_target_has() {
        let mut game = instant_game(&[[Captain, Duke], [Contessa, Assassin]]);

        game.turn("1", ActionType::Steal, Some("John")).unwrap();
        expire(&mut game);
        assert_eq!((coins(&game, 0), coins(&game, 1)), (4, 0));

        game.turn("2", ActionType::TakeOne, None).unwrap();

        game.turn("1", ActionType::Steal, Some("John")).unwrap();
        expire(&mut game);
        assert_eq!((coins(&game, 0), coins(&game, 1)), (5, 0));
        assert_conserved(&game);
    }

    #[test]
    fn honest_block_stands_when_called() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::ForeignAid, None).unwrap();

        assert_eq!(game.block_turn("1", Duke), Err(CoupError::SelfTargetForbidden));
        assert_eq!(game.block_turn("2", Captain), Err(CoupError::NotBlockable(ActionType::ForeignAid)));

        game.block_turn("3", Duke).unwrap();
        assert_eq!(turn_state(&game), TurnState::Blocking);
        assert_eq!(game.block_turn("2", Duke), Err(CoupError::InvalidState("turn can only be blocked while submitted")));
        assert_eq!(game.call_block("3"), Err(CoupError::SelfTargetForbidden));

        game.call_block("2").unwrap();
        assert_eq!(turn_state(&game), TurnState::Blocked);

        assert_eq!(game.resolve_blocked("3", Duke), Err(CoupError::OutOfTurn("3".into())));
        game.resolve_blocked("2", Captain).unwrap();
        assert_eq!(alive(&game, 1), vec![Contessa]);
        assert_eq!(game.players()[2].alive_cards().count(), 2);
        assert_eq!(coins(&game, 0), 2);
        assert_eq!(actor(&game), 1);
        assert_conserved(&game);
    }

    #[test]
    fn bluffed_block_lets_the_action_through() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::ForeignAid, None).unwrap();
        game.block_turn("2", Duke).unwrap();
        game.call_block("4").unwrap();
        assert_eq!(turn_state(&game), TurnState::BlockFailed);

        assert_eq!(game.resolve_block_failed("4", Captain), Err(CoupError::OutOfTurn("4".into())));
        game.resolve_block_failed("2", Contessa).unwrap();
        assert_eq!(alive(&game, 1), vec![Captain]);
        assert_eq!(coins(&game, 0), 4);
        assert_eq!(actor(&game), 1);
        assert_conserved(&game);
    }

    #[test]
    fn duke_can_be_called_but_not_blocked() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::Duke, None).unwrap();
        for kind in CARD_TYPES {
            assert_eq!(game.block_turn("2", kind), Err(CoupError::NotBlockable(ActionType::Duke)));
        }
        assert_eq!(turn_state(&game), TurnState::Submitted);
    }

    #[test]
    fn foreign_aid_cannot_be_called() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::ForeignAid, None).unwrap();
        assert_eq!(game.call_turn("2"), Err(CoupError::NotCallable(ActionType::ForeignAid)));
    }

    #[test]
    fn caught_bluff_costs_a_card() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::Steal, Some("John")).unwrap();
        assert_eq!(game.call_turn("1"), Err(CoupError::SelfTargetForbidden));
        game.call_turn("3").unwrap();
        assert_eq!(turn_state(&game), TurnState::Called);

        assert_eq!(game.resolve_called("3", Duke), Err(CoupError::OutOfTurn("3".into())));
        game.resolve_called("1", Ambassador).unwrap();
        assert_eq!(alive(&game, 0), vec![Duke]);
        assert_eq!((coins(&game, 0), coins(&game, 1)), (2, 2));
        assert_eq!(actor(&game), 1);
        assert_conserved(&game);
    }

    #[test]
    fn coup_waits_for_the_target() {
        let mut game = game(&FOUR);
        for _ in 0..5 {
            for client in CLIENTS.iter().take(4) {
                game.turn(client, ActionType::TakeOne, None).unwrap();
            }
        }
        assert_eq!(coins(&game, 0), 7);

        game.turn("1", ActionType::Coup, Some("Alex")).unwrap();
        assert_eq!(turn_state(&game), TurnState::AwaitingTarget);
        assert_eq!(coins(&game, 0), 0);
        assert!(game.current_turn().unwrap().window().is_none());

        assert_eq!(game.resolve_target("2", Captain), Err(CoupError::OutOfTurn("2".into())));
        assert_eq!(game.resolve_target("3", Captain), Err(CoupError::CardNotFound(Captain)));
        game.resolve_target("3", Assassin).unwrap();
        assert_eq!(alive(&game, 2), vec![Duke]);
        assert_eq!(actor(&game), 1);
        assert_conserved(&game);
    }

    #[test]
    fn assassination_is_paid_up_front() {
        let mut game = instant_game(&FOUR);
        for client in CLIENTS.iter().take(4) {
            game.turn(client, ActionType::TakeOne, None).unwrap();
        }
        game.turn("1", ActionType::Assassinate, Some("John")).unwrap();
        assert_eq!(coins(&game, 0), 0);
        expire(&mut game);
        assert_eq!(turn_state(&game), TurnState::AwaitingTarget);

        game.resolve_target("2", Contessa).unwrap();
        assert_eq!(alive(&game, 1), vec![Captain]);
        assert_conserved(&game);
    }

    #[test]
    fn exchange_validation() {
        let mut game = instant_game(&FOUR);
        game.turn("1", ActionType::Ambassador, None).unwrap();
        assert_eq!(game.resolve_ambassador("1", None, Duke), Err(CoupError::InvalidState("no exchange is waiting to be resolved")));
        expire(&mut game);

        let peeked = game.players()[0].traded().to_vec();
        let missing = CARD_TYPES.into_iter().find(|k| !peeked.contains(k)).unwrap();
        assert_eq!(game.resolve_ambassador("2", None, Captain), Err(CoupError::OutOfTurn("2".into())));
        assert_eq!(game.resolve_ambassador("1", Some(missing), Duke), Err(CoupError::CardNotFound(missing)));
        assert_eq!(game.resolve_ambassador("1", Some(Captain), Contessa).unwrap_err(), CoupError::CardNotFound(Captain));

        game.resolve_ambassador("1", None, Duke).unwrap();
        assert_eq!(alive(&game, 0), vec![Ambassador, Duke]);
        assert_eq!(actor(&game), 1);
    }

    #[test]
    fn late_responses_are_rejected() {
        let mut game = instant_game(&FOUR);
        game.turn("1", ActionType::Duke, None).unwrap();
        assert_eq!(game.call_turn("2"), Err(CoupError::InvalidState("response window has closed")));
        assert_eq!(game.block_turn("2", Duke), Err(CoupError::InvalidState("response window has closed")));
        assert_eq!(turn_state(&game), TurnState::Submitted);

        expire(&mut game);
        assert_eq!(coins(&game, 0), 5);
        assert_eq!(game.call_turn("2"), Err(CoupError::InvalidState("turn can only be called while submitted")));
    }

    #[test]
    fn late_blocks_are_rejected_whatever_card_is_claimed() {
        let mut game = instant_game(&FOUR);
        game.turn("1", ActionType::ForeignAid, None).unwrap();
        assert_eq!(game.block_turn("2", Duke), Err(CoupError::InvalidState("response window has closed")));
        assert_eq!(game.block_turn("2", Captain), Err(CoupError::InvalidState("response window has closed")));
        assert_eq!(game.call_turn("2"), Err(CoupError::InvalidState("response window has closed")));
        assert_eq!(turn_state(&game), TurnState::Submitted);
        assert!(game.current_turn().unwrap().blocker().is_none());

        expire(&mut game);
        assert_eq!(coins(&game, 0), 4);
        assert_eq!(actor(&game), 1);
        assert_conserved(&game);
    }

    #[test]
    fn late_call_on_a_block_is_rejected() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::ForeignAid, None).unwrap();
        // the block opens its own window, already over
        game.rules.response_window = Duration::ZERO;
        game.block_turn("3", Duke).unwrap();
        assert_eq!(game.call_block("1"), Err(CoupError::InvalidState("response window has closed")));
        assert_eq!(game.call_block("3"), Err(CoupError::InvalidState("response window has closed")));
        assert_eq!(turn_state(&game), TurnState::Blocking);
        assert!(game.current_turn().unwrap().caller().is_none());

        expire(&mut game);
        assert_eq!(coins(&game, 0), 2);
        assert_eq!(game.turns()[0].state(), TurnState::Complete);
        assert_eq!(actor(&game), 1);
        assert_conserved(&game);
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let mut game = game(&FOUR);
        game.turn("1", ActionType::Duke, None).unwrap();
        // window still open
        assert!(!game.expire(0));
        assert_eq!(game.unarmed_window().map(|(n, _)| n), Some(0));

        game.call_turn("2").unwrap();
        assert!(game.unarmed_window().is_none());
        assert!(!game.expire(0));
        assert!(!game.expire(5));
        assert_eq!(turn_state(&game), TurnState::CallFailed);
    }

    #[test]
    fn last_player_standing_wins() {
        let mut game = game(&[[Captain, Contessa], [Duke, Assassin]]);

        game.turn("1", ActionType::Duke, None).unwrap();
        game.call_turn("2").unwrap();
        game.resolve_called("1", Captain).unwrap();
        game.turn("2", ActionType::TakeOne, None).unwrap();

        game.turn("1", ActionType::Duke, None).unwrap();
        game.call_turn("2").unwrap();
        game.resolve_called("1", Contessa).unwrap();

        assert!(game.players()[0].is_out());
        assert_eq!(game.state(), GameState::Finished);
        assert_eq!(game.winner().map(Player::name), Some("John"));
        assert!(game.current_turn().is_none());
        assert_eq!(game.turns().len(), 3);
        assert_eq!(game.turn("2", ActionType::TakeOne, None), Err(CoupError::InvalidState("game is not being played")));
        assert_conserved(&game);
    }

    #[test]
    fn rotation_skips_eliminated_players() {
        let mut game = game(&[[Captain, Contessa], [Duke, Assassin], [Captain, Contessa]]);

        for _ in 0..2 {
            game.turn("1", ActionType::Duke, None).unwrap();
            game.call_turn("3").unwrap();
            let lose = alive(&game, 0)[0];
            game.resolve_called("1", lose).unwrap();
            if game.players()[0].is_out() {
                break;
            }
            game.turn("2", ActionType::TakeOne, None).unwrap();
            game.turn("3", ActionType::TakeOne, None).unwrap();
        }

        assert!(game.players()[0].is_out());
        assert_eq!(game.state(), GameState::Playing);
        assert_eq!(actor(&game), 1);
        game.turn("2", ActionType::TakeOne, None).unwrap();
        game.turn("3", ActionType::TakeOne, None).unwrap();
        assert_eq!(actor(&game), 1);
        assert_eq!(game.call_turn("1"), Err(CoupError::Eliminated("1".into())));
    }

    #[test]
    fn assassinating_an_eliminated_target_ends_the_turn() {
        let mut game = game(&[[Assassin, Duke], [Captain, Contessa], [Captain, Contessa]]);
        game.turn("1", ActionType::TakeOne, None).unwrap();

        // John bluffs and is down to one card
        game.turn("2", ActionType::Duke, None).unwrap();
        game.call_turn("3").unwrap();
        game.resolve_called("2", Captain).unwrap();
        game.turn("3", ActionType::TakeOne, None).unwrap();

        // John challenges a real assassin and loses the last card to the challenge
        game.turn("1", ActionType::Assassinate, Some("John")).unwrap();
        game.call_turn("2").unwrap();
        game.resolve_failed_call("2", Contessa).unwrap();

        assert!(game.players()[1].is_out());
        assert_eq!(game.state(), GameState::Playing);
        assert_eq!(game.turns().last().unwrap().state(), TurnState::Complete);
        assert_eq!(game.players()[0].cards().len(), 2);
        assert_eq!(actor(&game), 2);
        assert_conserved(&game);
    }
}
