use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use crate::action::ActionType;
use crate::card::CardType;
use crate::error::CoupError;
use crate::game::Game;
use crate::snapshot::Snapshot;

/// Shared handle to a game that transports and timers go through.
///
/// Every operation runs under one lock over the whole game. When an operation
/// leaves a response window open, the task that will expire it is spawned and
/// attached while the lock is still held, so a block or call can only ever see
/// the window either open with its task attached, or already gone.
#[derive(Clone)]
pub struct Table {
    game: Arc<Mutex<Game>>,
    runtime: Handle,
}

impl Table {
    pub fn new(game: Game, runtime: Handle) -> Self {
        Self {
            game: Arc::new(Mutex::new(game)),
            runtime,
        }
    }

    /// Runs `f` against the game under the lock. Mutation only goes through the operations below,
    /// which arm response timers.
    pub fn read<R>(&self, f: impl FnOnce(&Game) -> R) -> R {
        f(&self.game.lock())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.game.lock().snapshot()
    }

    pub fn add_player(&self, name: &str, client_id: &str) -> Result<(), CoupError> {
        self.with(|game| game.add_player(name, client_id))
    }

    pub fn start_game(&self) -> Result<(), CoupError> {
        self.with(Game::start_game)
    }

    pub fn turn(&self, client_id: &str, action: ActionType, target: Option<&str>) -> Result<(), CoupError> {
        self.with(|game| game.turn(client_id, action, target))
    }

    pub fn block_turn(&self, client_id: &str, claimed: CardType) -> Result<(), CoupError> {
        self.with(|game| game.block_turn(client_id, claimed))
    }

    pub fn call_block(&self, client_id: &str) -> Result<(), CoupError> {
        self.with(|game| game.call_block(client_id))
    }

    pub fn call_turn(&self, client_id: &str) -> Result<(), CoupError> {
        self.with(|game| game.call_turn(client_id))
    }

    pub fn resolve_ambassador(&self, client_id: &str, keep: Option<CardType>, give_back: CardType) -> Result<(), CoupError> {
        self.with(|game| game.resolve_ambassador(client_id, keep, give_back))
    }

    pub fn resolve_failed_call(&self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        self.with(|game| game.resolve_failed_call(client_id, lose))
    }

    pub fn resolve_called(&self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        self.with(|game| game.resolve_called(client_id, lose))
    }

    pub fn resolve_blocked(&self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        self.with(|game| game.resolve_blocked(client_id, lose))
    }

    pub fn resolve_block_failed(&self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        self.with(|game| game.resolve_block_failed(client_id, lose))
    }

    pub fn resolve_target(&self, client_id: &str, lose: CardType) -> Result<(), CoupError> {
        self.with(|game| game.resolve_target(client_id, lose))
    }

    fn with<F>(&self, op: F) -> Result<(), CoupError>
    where
        F: FnOnce(&mut Game) -> Result<(), CoupError>,
    {
        let mut game = self.game.lock();
        op(&mut game)?;
        self.arm(&mut game);
        Ok(())
    }

    fn arm(&self, game: &mut Game) {
        let Some((number, deadline)) = game.unarmed_window() else {
            return;
        };
        let weak: Weak<Mutex<Game>> = Arc::downgrade(&self.game);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            match weak.upgrade() {
                Some(game) => {
                    if game.lock().expire(number) {
                        log::debug!("[table] turn {} resolved by timeout", number);
                    }
                }
                None => log::trace!("[table] game dropped before turn {} expired", number),
            }
        });
        game.arm(number, task.abort_handle());
        log::trace!("[table] armed timer for turn {}", number);
    }
}
