use std::time::Duration;
use coup_engine::{ActionType, CardType, CoupError, Game, Rules, Table, TurnState};

fn rules() -> Rules {
    let Some(path) = std::env::args().nth(1) else {
        return Rules::default();
    };
    match std::fs::read_to_string(&path).map(|json| Rules::from_json(&json)) {
        Ok(Ok(rules)) => rules,
        Ok(Err(err)) => {
            log::warn!("ignoring {path}: {err}");
            Rules::default()
        }
        Err(err) => {
            log::warn!("cannot read {path}: {err}");
            Rules::default()
        }
    }
}

fn first_alive(table: &Table, seat: usize) -> Option<CardType> {
    table.read(|game| game.player(seat)?.alive_cards().next().map(|c| c.kind()))
}

#[tokio::main]
async fn main() -> Result<(), CoupError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let rules = rules();
    let wait = rules.response_window + Duration::from_secs(1);
    let table = Table::new(Game::new(rules), tokio::runtime::Handle::current());

    let (michael, john, alex, eddy) = ("1", "2", "3", "4");
    table.add_player("Michael", michael)?;
    table.add_player("John", john)?;
    table.add_player("Alex", alex)?;
    table.add_player("Eddy", eddy)?;
    table.start_game()?;

    // nobody answers the exchange, so it resolves on its own
    table.turn(michael, ActionType::Ambassador, None)?;
    tokio::time::sleep(wait).await;
    let keep = table.read(|game| game.players()[0].traded().first().copied());
    if let Some(give_back) = first_alive(&table, 0) {
        table.resolve_ambassador(michael, keep, give_back)?;
    }

    table.turn(john, ActionType::TakeOne, None)?;

    table.turn(alex, ActionType::Duke, None)?;
    table.call_turn(eddy)?;
    let state = table.read(|game| game.current_turn().map(|t| t.state()));
    match state {
        Some(TurnState::CallFailed) => {
            if let Some(lose) = first_alive(&table, 3) {
                table.resolve_failed_call(eddy, lose)?;
            }
        }
        Some(TurnState::Called) => {
            if let Some(lose) = first_alive(&table, 2) {
                table.resolve_called(alex, lose)?;
            }
        }
        _ => {}
    }

    table.read(|game| log::info!("{:?}", game));
    println!("{}", table.snapshot().to_json());
    Ok(())
}
