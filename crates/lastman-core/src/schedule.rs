// Fixture list views: prediction-week fixtures, date grouping, team form.

use chrono::NaiveDate;

use crate::model::{Fixture, FormResult, TeamId};

/// Number of recent results shown in a team's form guide.
pub const FORM_LENGTH: usize = 5;

pub fn fixtures_for_round(fixtures: &[Fixture], round: u32) -> Vec<Fixture> {
    fixtures.iter().filter(|f| f.round == round).cloned().collect()
}

/// A round's fixtures grouped by UTC kickoff date, dates in chronological
/// order. Unscheduled fixtures are dropped.
pub fn group_by_date(fixtures: &[Fixture], round: u32) -> Vec<(NaiveDate, Vec<Fixture>)> {
    let mut scheduled: Vec<&Fixture> = fixtures
        .iter()
        .filter(|f| f.round == round && f.kickoff_time.is_some())
        .collect();
    scheduled.sort_by_key(|f| (f.kickoff_time, f.id));

    let mut groups: Vec<(NaiveDate, Vec<Fixture>)> = Vec::new();
    for fixture in scheduled {
        let Some(kickoff) = fixture.kickoff_time else {
            continue;
        };
        let date = kickoff.date_naive();
        match groups.last_mut() {
            Some((last, list)) if *last == date => list.push(fixture.clone()),
            _ => groups.push((date, vec![fixture.clone()])),
        }
    }
    groups
}

/// Last [`FORM_LENGTH`] results for a team in rounds before `before_round`,
/// oldest first. Fixtures without both scores are skipped.
pub fn team_form(fixtures: &[Fixture], team_id: TeamId, before_round: u32) -> Vec<FormResult> {
    let mut played: Vec<&Fixture> = fixtures
        .iter()
        .filter(|f| f.round < before_round && f.involves(team_id))
        .collect();
    played.sort_by_key(|f| (f.round, f.kickoff_time));

    let results: Vec<FormResult> = played
        .into_iter()
        .filter_map(|f| f.result_for(team_id))
        .collect();
    let skip = results.len().saturating_sub(FORM_LENGTH);
    results[skip..].to_vec()
}

pub fn form_string(form: &[FormResult]) -> String {
    form.iter().map(FormResult::letter).collect()
}
