// Line-oriented console front end.
//
// Reads commands from stdin, forwards them to the app orchestrator, and
// prints UI updates as they arrive. Views (status, plan, stats...) are
// rendered locally from the last snapshot received.

pub mod input;
pub mod output;
pub mod render;

#[cfg(test)]
pub(crate) mod test_support;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use lastman_app::protocol::{AppSnapshot, UiUpdate, UserCommand};
use lastman_core::model::Outcome;

use input::{Action, View};
use output::{Output, Printer};

/// Local front-end state.
#[derive(Default)]
pub struct ViewState {
    pub snapshot: Option<Box<AppSnapshot>>,
    /// Submission awaiting a yes/no answer.
    pub pending_submit: Option<(String, Outcome)>,
    /// Print the status once the first snapshot lands.
    pub greeted: bool,
}

/// Apply an update from the app. Returns what to print.
pub fn apply_ui_update(view: &mut ViewState, update: UiUpdate) -> Vec<Output> {
    match update {
        UiUpdate::Loading => Vec::new(),
        UiUpdate::Snapshot(snapshot) => {
            let greeting = if view.greeted {
                Vec::new()
            } else {
                vec![render::status(&snapshot), Output::text("Type `help` for commands.")]
            };
            view.greeted = true;
            view.snapshot = Some(snapshot);
            greeting
        }
        UiUpdate::SubmissionResult(result) => vec![Output::Text(render::submission(&result))],
        UiUpdate::Fixtures(week) => vec![render::fixtures(&week.days, week.round)],
        UiUpdate::Error(message) => vec![Output::Text(format!("! {message}"))],
    }
}

/// What the console should do with one line of input.
#[derive(Debug, PartialEq)]
pub enum LineOutcome {
    Print(Vec<Output>),
    Send(UserCommand),
    Quit,
}

impl LineOutcome {
    fn text(text: impl Into<String>) -> Self {
        LineOutcome::Print(vec![Output::text(text)])
    }
}

pub fn handle_line(view: &mut ViewState, line: &str) -> LineOutcome {
    if let Some((team, outcome)) = view.pending_submit.take() {
        return match input::parse_confirmation(line) {
            Some(true) => LineOutcome::Send(UserCommand::Submit {
                team: Some(team),
                outcome: Some(outcome),
            }),
            Some(false) => LineOutcome::text("Submission cancelled."),
            None => {
                view.pending_submit = Some((team, outcome));
                LineOutcome::text("Please answer y or n.")
            }
        };
    }

    let snapshot = view.snapshot.as_deref();
    match input::parse_line(line, snapshot) {
        Ok(Action::Nothing) => LineOutcome::Print(Vec::new()),
        Ok(Action::Send(UserCommand::Quit)) => LineOutcome::Quit,
        Ok(Action::Send(cmd)) => LineOutcome::Send(cmd),
        Ok(Action::Confirm { team, outcome }) => {
            let prompt = render::confirmation(snapshot, &team, outcome);
            view.pending_submit = Some((team, outcome));
            LineOutcome::text(prompt)
        }
        Ok(Action::Show(View::Help)) => LineOutcome::text(input::HELP),
        Ok(Action::Show(v)) => match snapshot {
            Some(s) => LineOutcome::Print(show(v, s)),
            None => LineOutcome::text("Still loading..."),
        },
        Err(message) => LineOutcome::text(format!("! {message}")),
    }
}

fn show(view: View, s: &AppSnapshot) -> Vec<Output> {
    match view {
        View::Status => vec![render::status(s)],
        View::Plan => render::plan(&s.plan_grid, &s.planned),
        View::Fixtures => vec![render::fixtures(&s.week_fixtures, s.prediction_round)],
        View::History => vec![render::history(&s.current_game)],
        View::Stats => vec![render::stats(&s.stats)],
        View::Injuries(team) => vec![render::injuries(s, team)],
        View::Json => vec![Output::Text(
            serde_json::to_string_pretty(s).unwrap_or_else(|e| format!("! {e}")),
        )],
        View::Help => vec![Output::text(input::HELP)],
    }
}

fn print_all<W: std::io::Write>(printer: &mut Printer<W>, outputs: &[Output]) -> anyhow::Result<()> {
    for output in outputs {
        printer.print(output).context("failed to write to stdout")?;
    }
    Ok(())
}

/// Run the console until the user quits or stdin closes.
pub async fn run(mut ui_rx: mpsc::Receiver<UiUpdate>, cmd_tx: mpsc::Sender<UserCommand>) -> anyhow::Result<()> {
    let mut view = ViewState::default();
    let mut printer = Printer::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_all(&mut printer, &[Output::text("Loading fixtures...")])?;

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => print_all(&mut printer, &apply_ui_update(&mut view, update))?,
                    None => break,
                }
            }

            line = lines.next_line() => {
                let line = line.context("failed to read stdin")?;
                let Some(line) = line else {
                    let _ = cmd_tx.send(UserCommand::Quit).await;
                    break;
                };
                match handle_line(&mut view, &line) {
                    LineOutcome::Print(outputs) => print_all(&mut printer, &outputs)?,
                    LineOutcome::Send(cmd) => {
                        if cmd_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    LineOutcome::Quit => {
                        let _ = cmd_tx.send(UserCommand::Quit).await;
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lastman_app::protocol::{FixtureWeek, SubmissionResult};
    use lastman_core::gate::Rejection;
    use test_support::{snapshot, week};

    #[test]
    fn submit_requires_confirmation() {
        let mut view = ViewState::default();
        match handle_line(&mut view, "submit Arsenal win") {
            LineOutcome::Print(out) => assert!(out[0].lines()[0].ends_with("[y/N]")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(view.pending_submit.is_some());

        assert_eq!(
            handle_line(&mut view, "maybe"),
            LineOutcome::text("Please answer y or n.")
        );
        assert_eq!(
            handle_line(&mut view, "y"),
            LineOutcome::Send(UserCommand::Submit {
                team: Some("Arsenal".into()),
                outcome: Some(Outcome::Win),
            })
        );
        assert!(view.pending_submit.is_none());
    }

    #[test]
    fn declining_cancels() {
        let mut view = ViewState::default();
        handle_line(&mut view, "submit Arsenal draw");
        assert_eq!(handle_line(&mut view, "n"), LineOutcome::text("Submission cancelled."));
        assert!(view.pending_submit.is_none());
    }

    #[test]
    fn views_wait_for_first_snapshot() {
        let mut view = ViewState::default();
        assert_eq!(handle_line(&mut view, "plan"), LineOutcome::text("Still loading..."));
        assert_eq!(handle_line(&mut view, "quit"), LineOutcome::Quit);
        assert_eq!(handle_line(&mut view, "refresh"), LineOutcome::Send(UserCommand::Refresh));
    }

    #[test]
    fn first_snapshot_greets_once() {
        let mut view = ViewState::default();
        let greeting = apply_ui_update(&mut view, UiUpdate::Snapshot(Box::new(snapshot())));
        assert_eq!(greeting.len(), 2);
        assert!(greeting[0].lines()[0].contains("Gameweek 6"));
        assert_eq!(greeting[1], Output::text("Type `help` for commands."));
        assert!(apply_ui_update(&mut view, UiUpdate::Snapshot(Box::new(snapshot()))).is_empty());

        match handle_line(&mut view, "injuries") {
            LineOutcome::Print(out) => assert_eq!(out, vec![Output::text("No injury news.")]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn browsed_gameweek_is_printed() {
        let mut view = ViewState::default();
        assert_eq!(
            handle_line(&mut view, "fixtures 3"),
            LineOutcome::Send(UserCommand::BrowseFixtures { round: 3 })
        );
        let out = apply_ui_update(&mut view, UiUpdate::Fixtures(FixtureWeek { round: 3, days: week() }));
        let lines = out[0].lines();
        assert!(lines[0].contains("Gameweek 3 fixtures"));
        assert!(lines.iter().any(|l| l.contains("2-1")));

        let blank = FixtureWeek { round: 38, days: Vec::new() };
        assert_eq!(
            apply_ui_update(&mut view, UiUpdate::Fixtures(blank)),
            vec![Output::text("No scheduled fixtures for gameweek 38.")]
        );
    }

    #[test]
    fn updates_are_printed() {
        let mut view = ViewState::default();
        assert!(apply_ui_update(&mut view, UiUpdate::Loading).is_empty());
        assert_eq!(
            apply_ui_update(
                &mut view,
                UiUpdate::SubmissionResult(SubmissionResult::Rejected(Rejection::AlreadyEliminated))
            ),
            vec![Output::text("You are unable to make a prediction as you have been eliminated.")]
        );
        assert_eq!(
            apply_ui_update(&mut view, UiUpdate::Error("offline".into())),
            vec![Output::text("! offline")]
        );
    }
}
