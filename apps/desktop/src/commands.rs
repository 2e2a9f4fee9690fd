//! Line commands typed at the terminal, translated into controller commands.

use anyhow::{anyhow, bail, Context, Result};
use client_core::{controller::Command, gesture::DropTarget, render::BoardView};
use shared::domain::{Coord, PromotionRole};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineCommand {
    Pick(Coord),
    Drop(Coord),
    Move { from: Coord, to: Coord },
    Flip,
    Refresh,
    Reset,
    Undo,
    History,
    Promote(PromotionRole),
    Cancel,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  pick <row> <col>           pick up the piece on a square
  drop <row> <col>           drop the held piece on a square
  move <row> <col> <row> <col>
  flip                       toggle board orientation
  refresh | reset | undo | history
  promote <q|r|b|n>          choose the promotion piece
  cancel                     close the promotion prompt
  show | help | quit";

pub fn parse_line(line: &str) -> Result<LineCommand> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let args: Vec<&str> = words.collect();
    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("pick", [row, col]) => LineCommand::Pick(coord(row, col)?),
        ("drop", [row, col]) => LineCommand::Drop(coord(row, col)?),
        ("move" | "mv", [r1, c1, r2, c2]) => LineCommand::Move {
            from: coord(r1, c1)?,
            to: coord(r2, c2)?,
        },
        ("flip", []) => LineCommand::Flip,
        ("refresh", []) => LineCommand::Refresh,
        ("reset", []) => LineCommand::Reset,
        ("undo", []) => LineCommand::Undo,
        ("history", []) => LineCommand::History,
        ("promote", [role]) => LineCommand::Promote(role.parse()?),
        ("cancel", []) => LineCommand::Cancel,
        ("show", []) => LineCommand::Show,
        ("help" | "?", []) => LineCommand::Help,
        ("quit" | "exit", []) => LineCommand::Quit,
        (verb, _) => bail!("unknown command or wrong arguments: '{verb}' (try 'help')"),
    };
    Ok(command)
}

fn coord(row: &str, col: &str) -> Result<Coord> {
    let row: usize = row.parse().with_context(|| format!("bad row '{row}'"))?;
    let col: usize = col.parse().with_context(|| format!("bad column '{col}'"))?;
    Coord::new(row, col).ok_or_else(|| anyhow!("square ({row},{col}) is off the board"))
}

/// Controller commands for a line command. Picking needs the last rendered
/// board to know which piece sits on the square.
pub fn to_controller_commands(
    command: &LineCommand,
    view: Option<&BoardView>,
) -> Result<Vec<Command>> {
    let pickup = |source: Coord| -> Result<Command> {
        let piece = view
            .and_then(|view| view.piece_at(source))
            .ok_or_else(|| anyhow!("no piece on {source}"))?;
        Ok(Command::Pickup {
            piece: piece.code,
            source,
        })
    };

    Ok(match command {
        LineCommand::Pick(source) => vec![pickup(*source)?],
        LineCommand::Drop(target) => vec![Command::Drop(drop_target(*target, view))],
        LineCommand::Move { from, to } => vec![
            pickup(*from)?,
            Command::DragOver { over: *to },
            Command::Drop(drop_target(*to, view)),
        ],
        LineCommand::Flip => vec![Command::ToggleOrientation],
        LineCommand::Refresh => vec![Command::Refresh],
        LineCommand::Reset => vec![Command::Reset],
        LineCommand::Undo => vec![Command::Undo],
        LineCommand::History => vec![Command::FetchHistory],
        LineCommand::Promote(role) => vec![Command::ChoosePromotion(*role)],
        LineCommand::Cancel => vec![Command::CancelPromotion],
        LineCommand::Show | LineCommand::Help | LineCommand::Quit => Vec::new(),
    })
}

fn drop_target(square: Coord, view: Option<&BoardView>) -> DropTarget {
    match view.and_then(|view| view.piece_at(square)) {
        Some(_) => DropTarget::Piece { square },
        None => DropTarget::Square(square),
    }
}

/// Prompt shown when the promotion flow opens, listing every accepted role.
pub fn promotion_prompt(target: Coord) -> String {
    let roles: Vec<String> = PromotionRole::ALL
        .iter()
        .map(|role| role.to_string())
        .collect();
    format!(
        "pawn reached {target}: 'promote <{}>' or 'cancel'",
        roles.join("|")
    )
}
