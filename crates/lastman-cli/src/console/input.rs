// Command-line parsing and dispatch.
//
// Translates typed lines into UserCommand messages for the app orchestrator,
// or into local views rendered from the last snapshot.

use lastman_app::protocol::{AppSnapshot, UserCommand};
use lastman_core::model::{find_team, Outcome, TeamId, MAX_ROUND, MIN_ROUND};

/// Something that only needs the last snapshot to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Status,
    Plan,
    Fixtures,
    History,
    Stats,
    /// Flagged players, for one team or all of them.
    Injuries(Option<TeamId>),
    Json,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Show(View),
    Send(UserCommand),
    /// Ask for confirmation before sending a submission.
    Confirm { team: String, outcome: Outcome },
    /// Nothing to do (blank line).
    Nothing,
}

/// Parse one input line.
///
/// `snapshot` is used to resolve team names for `pick`; commands that need
/// it fail with a message until the first snapshot arrives.
pub fn parse_line(line: &str, snapshot: Option<&AppSnapshot>) -> Result<Action, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, args)) = words.split_first() else {
        return Ok(Action::Nothing);
    };

    match command.to_ascii_lowercase().as_str() {
        "status" | "s" => Ok(Action::Show(View::Status)),
        "plan" | "p" => Ok(Action::Show(View::Plan)),
        "fixtures" | "f" => match args {
            [] => Ok(Action::Show(View::Fixtures)),
            [round] => {
                let round: u32 = round.parse().map_err(|_| format!("not a gameweek: {round}"))?;
                if !(MIN_ROUND..=MAX_ROUND).contains(&round) {
                    return Err(format!("gameweek must be {MIN_ROUND}-{MAX_ROUND}"));
                }
                Ok(Action::Send(UserCommand::BrowseFixtures { round }))
            }
            _ => Err("usage: fixtures [gameweek]".to_string()),
        },
        "history" | "h" => Ok(Action::Show(View::History)),
        "stats" => Ok(Action::Show(View::Stats)),
        "injuries" | "i" => {
            if args.is_empty() {
                return Ok(Action::Show(View::Injuries(None)));
            }
            let snapshot = snapshot.ok_or("still loading, try again shortly")?;
            let name = args.join(" ");
            let team = find_team(&snapshot.teams, &name).ok_or(format!("unknown team: {name}"))?;
            Ok(Action::Show(View::Injuries(Some(team.id))))
        }
        "json" => Ok(Action::Show(View::Json)),
        "help" | "?" => Ok(Action::Show(View::Help)),
        "refresh" | "r" => Ok(Action::Send(UserCommand::Refresh)),
        "clear" => Ok(Action::Send(UserCommand::ClearPlan)),
        "quit" | "q" | "exit" => Ok(Action::Send(UserCommand::Quit)),
        "weeks" => {
            let [n] = args else {
                return Err("usage: weeks <5-10>".to_string());
            };
            let weeks: u8 = n.parse().map_err(|_| format!("not a number: {n}"))?;
            Ok(Action::Send(UserCommand::SetWeeks(weeks)))
        }
        "pick" => {
            let Some((round, team)) = args.split_last().filter(|(_, team)| !team.is_empty()) else {
                return Err("usage: pick <team> <round>".to_string());
            };
            let round: u32 = round.parse().map_err(|_| format!("not a round number: {round}"))?;
            let snapshot = snapshot.ok_or("still loading, try again shortly")?;
            let name = team.join(" ");
            let team = find_team(&snapshot.teams, &name).ok_or(format!("unknown team: {name}"))?;
            Ok(Action::Send(UserCommand::PlanPick {
                team_id: team.id,
                round,
            }))
        }
        "submit" => {
            let Some((outcome, team)) = args.split_last().filter(|(_, team)| !team.is_empty()) else {
                return Err("usage: submit <team> <win|draw>".to_string());
            };
            let outcome = Outcome::from_str_outcome(outcome).map_err(|e| e.to_string())?;
            Ok(Action::Confirm {
                team: team.join(" "),
                outcome,
            })
        }
        other => Err(format!("unknown command `{other}`; type `help` for a list")),
    }
}

/// Reply to a confirmation prompt: `Some(true)` yes, `Some(false)` no,
/// `None` unrecognized.
pub fn parse_confirmation(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" | "" => Some(false),
        _ => None,
    }
}

pub const HELP: &str = "\
Commands:
  status                    game status, deadline and this game's picks
  plan                      planner grid for the next weeks
  pick <team> <round>       plan/move/clear a team in a future round
  clear                     clear the plan
  weeks <n>                 show n weeks in the planner (5-10)
  fixtures [gameweek]       fixtures with form; results for past gameweeks
  injuries [team]           flagged players, all teams or one
  history                   picks made in the current game
  stats                     personal statistics
  submit <team> <win|draw>  submit this gameweek's prediction
  refresh                   reload fixtures and predictions
  json                      dump the current snapshot as JSON
  quit";
