// Panels for the console views.
//
// Each view is a ratatui widget drawn into an off-screen buffer sized to
// fit its content; `output::Printer` writes the buffer out.

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget};

use lastman_app::protocol::{AppSnapshot, FixtureDay, SubmissionResult};
use lastman_core::gate::PredictionSummary;
use lastman_core::history::GameStatus;
use lastman_core::model::{find_team, Outcome, Prediction, TeamId, TeamLocation};
use lastman_core::planner::{CellCategory, DifficultyTier, PlanCell, PlanGrid};
use lastman_core::stats::StatsPanel;

use super::output::Output;

const TEAM_WIDTH: u16 = 16;
const CELL_WIDTH: u16 = 15;
const NEWS_WIDTH: u16 = 48;

fn header_style() -> Style {
    Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

fn header<S: AsRef<str>>(titles: &[S]) -> Row<'static> {
    Row::new(titles.iter().map(|t| Cell::from(t.as_ref().to_string())))
        .style(header_style())
        .bottom_margin(0)
}

fn width_of(text: &str) -> u16 {
    u16::try_from(Line::from(text).width()).unwrap_or(u16::MAX)
}

/// Render `widget` into a buffer of exactly `width` x `height`.
fn draw(widget: impl Widget, width: u16, height: u16) -> Buffer {
    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    widget.render(area, &mut buf);
    buf
}

/// A bordered table whose size follows its rows and fixed column widths.
fn table_panel<S: AsRef<str>>(title: String, columns: &[S], widths: &[u16], rows: Vec<Row<'static>>) -> Buffer {
    let height = u16::try_from(rows.len()).unwrap_or(u16::MAX).saturating_add(3);
    let spacing = u16::try_from(widths.len().saturating_sub(1)).unwrap_or(0);
    let width = widths.iter().sum::<u16>() + spacing + 2;
    let table = Table::new(rows, widths.iter().map(|w| Constraint::Length(*w)))
        .header(header(columns))
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL).title(title));
    draw(table, width, height)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

fn status_style(status: GameStatus) -> Style {
    match status {
        GameStatus::NotEntered => Style::default(),
        GameStatus::Active => Style::default().fg(Color::Green),
        GameStatus::Pending => Style::default().fg(Color::Yellow),
        GameStatus::Eliminated => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

pub fn status(snapshot: &AppSnapshot) -> Output {
    let mut lines: Vec<Line> = Vec::new();
    if !snapshot.signed_in {
        lines.push(Line::styled(
            "Not signed in. Set session.user_id in config/lastman.toml to play.",
            Style::default().fg(Color::Yellow),
        ));
    }
    lines.push(Line::from(format!(
        "Gameweek {} in progress; predictions are for gameweek {}.",
        snapshot.current_round, snapshot.prediction_round
    )));
    lines.push(match snapshot.deadline.deadline {
        Some(deadline) if snapshot.deadline.is_past_deadline => Line::styled(
            format!("Deadline passed ({}).", deadline.format("%a %d %b %H:%M UTC")),
            Style::default().fg(Color::Red),
        ),
        Some(deadline) => Line::from(format!("Deadline: {}.", deadline.format("%a %d %b %H:%M UTC"))),
        None => Line::from(format!(
            "No fixtures scheduled for gameweek {}.",
            snapshot.prediction_round
        )),
    });

    if snapshot.signed_in {
        let status = match snapshot.status {
            GameStatus::NotEntered => "No picks yet in this game.".to_string(),
            GameStatus::Active => format!(
                "Still standing after {} pick(s). Next pick is round {}.",
                snapshot.pick_state.picks_made,
                snapshot.pick_state.next_round_number()
            ),
            GameStatus::Pending => "Prediction submitted; waiting for the result.".to_string(),
            GameStatus::Eliminated => "Eliminated from this game.".to_string(),
        };
        lines.push(Line::from(vec![
            Span::raw("Status: "),
            Span::styled(status, status_style(snapshot.status)),
        ]));
        if !snapshot.pick_state.used_team_names.is_empty() {
            lines.push(Line::from(format!(
                "Teams used: {}",
                snapshot.pick_state.used_team_names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
            )));
        }
    }
    if snapshot.loading {
        lines.push(Line::styled("(refreshing...)", Style::default().fg(Color::DarkGray)));
    }

    let title = format!("Gameweek {}", snapshot.prediction_round);
    let inner = lines
        .iter()
        .map(Line::width)
        .chain(std::iter::once(title.len()))
        .max()
        .unwrap_or(0);
    let width = u16::try_from(inner).unwrap_or(u16::MAX).saturating_add(2);
    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
    let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    Output::Panel(draw(paragraph, width, height))
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

fn tier_style(tier: DifficultyTier) -> Style {
    let color = match tier {
        DifficultyTier::VeryEasy => Color::LightGreen,
        DifficultyTier::Easy => Color::Green,
        DifficultyTier::Moderate => Color::Gray,
        DifficultyTier::Hard => Color::LightRed,
        DifficultyTier::VeryHard => Color::Red,
    };
    Style::default().fg(color)
}

fn cell_style(category: CellCategory) -> Style {
    match category {
        CellCategory::PlannedThisRound => Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD),
        CellCategory::Locked => Style::default().fg(Color::DarkGray),
        CellCategory::PlannedElsewhere => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
        CellCategory::Difficulty(tier) => tier_style(tier),
        CellCategory::Unrated => Style::default(),
        CellCategory::NoFixture => Style::default().fg(Color::DarkGray),
    }
}

fn cell_marker(cell: &PlanCell) -> String {
    match cell.category {
        CellCategory::PlannedThisRound => "*".to_string(),
        CellCategory::Locked => "x".to_string(),
        CellCategory::PlannedElsewhere => "-".to_string(),
        CellCategory::Difficulty(tier) => tier.rating().to_string(),
        CellCategory::Unrated => "?".to_string(),
        CellCategory::NoFixture => String::new(),
    }
}

fn plan_cell(cell: &PlanCell) -> Cell<'static> {
    let text = match &cell.display {
        Some(opponent) => format!("{} {}", cell_marker(cell), opponent),
        None => "·".to_string(),
    };
    Cell::from(text).style(cell_style(cell.category))
}

/// Team x round grid. Each cell shows the opponent and a marker: difficulty
/// 1-5, `*` planned here, `-` planned in another round, `x` already used.
/// Colours follow the same categories.
pub fn plan(grid: &PlanGrid, planned: &[(u32, String)]) -> Vec<Output> {
    let columns: Vec<String> = std::iter::once("Team".to_string())
        .chain(grid.rounds.iter().map(|r| format!("GW{r}")))
        .collect();
    let widths: Vec<u16> = std::iter::once(TEAM_WIDTH)
        .chain(grid.rounds.iter().map(|_| CELL_WIDTH))
        .collect();
    let rows = grid
        .rows
        .iter()
        .map(|row| {
            let cells = std::iter::once(Cell::from(row.team_name.clone())).chain(row.cells.iter().map(plan_cell));
            Row::new(cells.collect::<Vec<_>>())
        })
        .collect();
    let grid_panel = table_panel("Planner".to_string(), &columns, &widths, rows);

    let summary = if planned.is_empty() {
        "No planned picks.".to_string()
    } else {
        let plan: Vec<String> = planned
            .iter()
            .map(|(round, team)| format!("GW{round}: {team}"))
            .collect();
        format!("Plan: {}", plan.join(", "))
    };
    vec![Output::Panel(grid_panel), Output::Text(summary)]
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn form_line(form: &str) -> Line<'static> {
    let spans: Vec<Span> = form
        .chars()
        .map(|c| {
            let color = match c {
                'W' => Color::Green,
                'D' => Color::Yellow,
                'L' => Color::Red,
                _ => Color::Reset,
            };
            Span::styled(c.to_string(), Style::default().fg(color))
        })
        .collect();
    Line::from(spans)
}

pub fn fixtures(days: &[FixtureDay], round: u32) -> Output {
    if days.is_empty() {
        return Output::text(format!("No scheduled fixtures for gameweek {round}."));
    }
    let mut rows = Vec::new();
    for day in days {
        for (i, f) in day.fixtures.iter().enumerate() {
            let date = if i == 0 {
                day.date.format("%a %d %b").to_string()
            } else {
                String::new()
            };
            let time = f
                .kickoff_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "TBC".to_string());
            let score = match (f.home_score, f.away_score) {
                (Some(h), Some(a)) => Cell::from(format!("{h}-{a}")).style(if f.finished {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Yellow)
                }),
                _ => Cell::from("v"),
            };
            rows.push(Row::new(vec![
                Cell::from(date),
                Cell::from(time),
                Cell::from(f.home_team.clone()),
                Cell::from(form_line(&f.home_form)),
                score,
                Cell::from(f.away_team.clone()),
                Cell::from(form_line(&f.away_form)),
            ]));
        }
    }
    Output::Panel(table_panel(
        format!("Gameweek {round} fixtures"),
        &["Date", "Time", "Home", "Form", "Score", "Away", "Form"],
        &[10, 5, TEAM_WIDTH, 5, 5, TEAM_WIDTH, 5],
        rows,
    ))
}

// ---------------------------------------------------------------------------
// History and stats
// ---------------------------------------------------------------------------

pub fn history(predictions: &[Prediction]) -> Output {
    if predictions.is_empty() {
        return Output::text("No picks in the current game.");
    }
    let rows = predictions
        .iter()
        .map(|p| {
            let result = match p.correct {
                Some(true) => Cell::from("correct").style(Style::default().fg(Color::Green)),
                Some(false) => Cell::from("wrong").style(Style::default().fg(Color::Red)),
                None => Cell::from("pending").style(Style::default().fg(Color::Yellow)),
            };
            let score = match (p.team_selected_score, p.team_opposing_score) {
                (Some(a), Some(b)) => format!("{a}-{b}"),
                _ => String::new(),
            };
            let venue = match p.team_selected_location {
                TeamLocation::Home => "v",
                TeamLocation::Away => "@",
            };
            Row::new(vec![
                Cell::from(p.round_number.to_string()),
                Cell::from(p.fpl_round.map(|r| format!("GW{r}")).unwrap_or_default()),
                Cell::from(p.team_selected.clone()),
                Cell::from(p.outcome_selected.display_str().to_lowercase()),
                Cell::from(venue),
                Cell::from(p.team_opposing.clone()),
                result,
                Cell::from(score),
            ])
        })
        .collect();
    Output::Panel(table_panel(
        "Current game".to_string(),
        &["Round", "GW", "Team", "Pick", "", "Opponent", "Result", "Score"],
        &[5, 4, TEAM_WIDTH, 4, 1, TEAM_WIDTH, 7, 5],
        rows,
    ))
}

pub fn stats(panel: &StatsPanel) -> Output {
    if panel.games_played == 0 {
        return Output::text("No predictions yet.");
    }
    let mut entries: Vec<(&'static str, String)> = vec![
        ("Games played", panel.games_played.to_string()),
        ("Furthest round", panel.furthest_round.to_string()),
        (
            "Most selected",
            format!("{} ({} times)", panel.most_selected.join(", "), panel.most_selected_count),
        ),
    ];
    if let Some(best) = panel.most_successful() {
        entries.push(("Most successful", format!("{} ({}%)", best.team, best.percent_correct)));
    }
    if panel.team_success.len() > 1 {
        if let Some(worst) = panel.least_successful() {
            entries.push(("Least successful", format!("{} ({}%)", worst.team, worst.percent_correct)));
        }
    }
    if !panel.bogey_teams.is_empty() {
        entries.push((
            "Bogey team",
            format!("{} ({} losses)", panel.bogey_teams.join(", "), panel.bogey_team_losses),
        ));
    }
    let pct = |p: Option<u32>| p.map(|v| format!("{v}%")).unwrap_or_else(|| "n/a".to_string());
    entries.push(("Home success", pct(panel.home.percent())));
    entries.push(("Away success", pct(panel.away.percent())));
    if !panel.bogey_rounds.is_empty() {
        let rounds: Vec<String> = panel.bogey_rounds.iter().map(u32::to_string).collect();
        entries.push((
            "Bogey round",
            format!("{} ({} eliminations)", rounds.join(", "), panel.bogey_round_count),
        ));
    }

    let value_width = entries.iter().map(|(_, v)| width_of(v)).max().unwrap_or(0).max(5);
    let rows = entries
        .into_iter()
        .map(|(label, value)| Row::new(vec![Cell::from(label), Cell::from(value)]))
        .collect();
    Output::Panel(table_panel("Statistics".to_string(), &["", "Value"], &[TEAM_WIDTH, value_width], rows))
}

// ---------------------------------------------------------------------------
// Injuries
// ---------------------------------------------------------------------------

fn chance_cell(chance: Option<u8>) -> Cell<'static> {
    match chance {
        Some(0) => Cell::from("0%").style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Some(c) if c < 75 => Cell::from(format!("{c}%")).style(Style::default().fg(Color::LightRed)),
        Some(c) => Cell::from(format!("{c}%")).style(Style::default().fg(Color::Yellow)),
        None => Cell::from("-"),
    }
}

/// Flagged players, all teams or just `team`.
pub fn injuries(snapshot: &AppSnapshot, team: Option<TeamId>) -> Output {
    let teams: Vec<_> = snapshot
        .injuries
        .iter()
        .filter(|t| team.is_none_or(|id| t.team_id == id))
        .collect();
    if teams.is_empty() {
        return match team.and_then(|id| snapshot.teams.iter().find(|t| t.id == id)) {
            Some(t) => Output::text(format!("No injury news for {}.", t.name)),
            None => Output::text("No injury news."),
        };
    }

    let mut rows = Vec::new();
    for t in teams {
        for (i, p) in t.players.iter().enumerate() {
            let name = if i == 0 { t.team.clone() } else { String::new() };
            rows.push(Row::new(vec![
                Cell::from(name),
                Cell::from(p.player.clone()),
                chance_cell(p.chance_of_playing),
                Cell::from(p.news.clone()),
            ]));
        }
    }
    Output::Panel(table_panel(
        "Injuries".to_string(),
        &["Team", "Player", "Chance", "News"],
        &[TEAM_WIDTH, TEAM_WIDTH, 6, NEWS_WIDTH],
        rows,
    ))
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

pub fn submission(result: &SubmissionResult) -> String {
    match result {
        SubmissionResult::Accepted { summary } => {
            format!("Prediction submitted: {}.", summary.describe())
        }
        SubmissionResult::Rejected(reason) => reason.to_string(),
        SubmissionResult::Failed { message } => message.clone(),
    }
}

/// Confirmation prompt for a pending submission. Uses the week's fixtures
/// from the snapshot to name the opponent when the team plays.
pub fn confirmation(snapshot: Option<&AppSnapshot>, team: &str, outcome: Outcome) -> String {
    let summary = snapshot.and_then(|s| {
        let name = find_team(&s.teams, team).map_or(team, |t| t.name.as_str());
        let (selected, opposing, location) =
            s.week_fixtures.iter().flat_map(|d| &d.fixtures).find_map(|f| {
                if f.home_team.eq_ignore_ascii_case(name) {
                    Some((f.home_team.clone(), f.away_team.clone(), TeamLocation::Home))
                } else if f.away_team.eq_ignore_ascii_case(name) {
                    Some((f.away_team.clone(), f.home_team.clone(), TeamLocation::Away))
                } else {
                    None
                }
            })?;
        Some(PredictionSummary {
            round_number: s.pick_state.next_round_number(),
            team_selected: selected,
            team_opposing: opposing,
            location,
            outcome,
        })
    });
    match summary {
        Some(summary) => format!("{} [y/N]", summary.confirmation()),
        None => format!(
            "Submit {team} to {}? [y/N]",
            outcome.display_str().to_lowercase()
        ),
    }
}
