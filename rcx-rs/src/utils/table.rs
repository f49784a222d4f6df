//! Player and team tables for recording summaries

use aom_rcx::{PlayerRecord, Session};
use prettytable::{Cell, Row, Table};

use super::format::format_game_time;

fn titled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(
        headers
            .iter()
            .map(|h| Cell::new(h).style_spec("b"))
            .collect(),
    ));
    table
}

fn add_row(table: &mut Table, cells: &[String]) {
    table.add_row(Row::new(cells.iter().map(|s| Cell::new(s)).collect()));
}

/// What a player is doing at the end of the decoded ticks
fn player_status(player: &PlayerRecord) -> String {
    if player.is_observer {
        "observer".to_string()
    } else if let Some(ms) = player.resigned_at_ms {
        format!("left at {}", format_game_time(ms))
    } else {
        "playing".to_string()
    }
}

/// One row per player slot, nature included
pub fn player_table(session: &Session) -> Table {
    let mut table = titled_table(&["#", "Name", "Civilization", "Team", "Status"]);
    for player in session.players() {
        add_row(
            &mut table,
            &[
                player.index.to_string(),
                player.name.clone(),
                player.civilization.to_string(),
                player.team.to_string(),
                player_status(player),
            ],
        );
    }
    table
}

/// One row per team with its members and standing
pub fn team_table(session: &Session) -> Table {
    let players = session.players();
    let mut table = titled_table(&["Team", "Name", "Members", "Status"]);
    for team in session.teams() {
        let members = team
            .member_records(players)
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let status = if team.is_observing_team(players) {
            "observing"
        } else if team.is_lost(players) {
            "lost"
        } else {
            "active"
        };
        add_row(
            &mut table,
            &[
                team.id.to_string(),
                team.name.clone(),
                members,
                status.to_string(),
            ],
        );
    }
    table
}
