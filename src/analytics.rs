use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::i18n::Translator;
use crate::models::{OrganizationType, ProgramMember};

/// Closed range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

impl Period {
    pub fn today(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// The `days` calendar days ending with `last`, or `None` when the start
    /// falls outside the supported date range.
    pub fn trailing(last: NaiveDate, days: u32) -> Option<Self> {
        let span = i64::from(days.max(1)) - 1;
        let start = last.checked_sub_signed(Duration::days(span))?;
        Some(Self { start, end: last })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take_while({
            let end = self.end;
            move |day| *day <= end
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub name: String,
    /// One value per organization type, in catalog order.
    pub data: Vec<u64>,
}

impl Series {
    pub fn total(&self) -> u64 {
        self.data.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BarChartData {
    pub labels: Vec<String>,
    pub organizations: Vec<Series>,
    pub people: Vec<Series>,
}

impl BarChartData {
    pub fn organization_total(&self) -> u64 {
        self.organizations.iter().map(Series::total).sum()
    }

    pub fn people_total(&self) -> u64 {
        self.people.iter().map(Series::total).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PieChartData {
    pub labels: Vec<String>,
    pub organizations: Vec<u64>,
    pub people: Vec<u64>,
}

impl PieChartData {
    pub fn organization_total(&self) -> u64 {
        self.organizations.iter().sum()
    }

    pub fn people_total(&self) -> u64 {
        self.people.iter().sum()
    }
}

fn matches_day(test_day: NaiveDate, day: NaiveDate) -> bool {
    test_day == day || (test_day < day && test_day.weekday() == day.weekday())
}

/// Whether a member is being tested on `day`.
///
/// The first test date decides: the same day qualifies, an earlier date on the
/// same weekday qualifies. An earlier date on another weekday falls through to
/// the follow-up test dates, which use the same rule. The weekday comparison is
/// not bounded to the current week, so a date many weeks back still matches.
pub fn is_being_tested_on(member: &ProgramMember, day: NaiveDate) -> bool {
    if !member.is_active() {
        return false;
    }
    let days = member.test_days();
    let Some(first) = days[0] else {
        return false;
    };
    if first > day {
        return false;
    }
    if matches_day(first, day) {
        return true;
    }
    days[1..]
        .iter()
        .flatten()
        .any(|test_day| matches_day(*test_day, day))
}

/// Whether a member has started testing on or before `day`.
pub fn has_started_testing_by(member: &ProgramMember, day: NaiveDate) -> bool {
    member.is_active()
        && member
            .first_test_date
            .map(|first| first.date_naive() <= day)
            .unwrap_or(false)
}

fn labels(organization_types: &[OrganizationType], translator: &dyn Translator) -> Vec<String> {
    organization_types
        .iter()
        .map(|organization_type| translator.organization_type(organization_type))
        .collect()
}

fn catalog_index(organization_types: &[OrganizationType]) -> HashMap<i64, usize> {
    organization_types
        .iter()
        .enumerate()
        .map(|(index, organization_type)| (organization_type.id, index))
        .collect()
}

/// Organization and people buckets for one reference day.
fn bucket_day(
    members: &[ProgramMember],
    organization_types: &[OrganizationType],
    index: &HashMap<i64, usize>,
    day: NaiveDate,
) -> (Vec<u64>, Vec<u64>) {
    let mut organizations = vec![0u64; organization_types.len()];
    let mut people = vec![0u64; organization_types.len()];

    for member in members {
        let Some(&slot) = index.get(&member.organization_type_id) else {
            continue;
        };
        if !is_being_tested_on(member, day) {
            continue;
        }
        organizations[slot] += 1;
        let divisor = member.test_date_count().max(1);
        people[slot] += u64::from(member.headcount(&organization_types[slot]) / divisor);
    }

    (organizations, people)
}

/// Bar data for organizations currently being tested, one series per day of
/// `period`.
pub fn currently_being_tested_bar_data(
    members: &[ProgramMember],
    organization_types: &[OrganizationType],
    period: Period,
    translator: &dyn Translator,
) -> BarChartData {
    let index = catalog_index(organization_types);
    let mut chart = BarChartData {
        labels: labels(organization_types, translator),
        ..BarChartData::default()
    };

    for day in period.days() {
        let (organizations, people) = bucket_day(members, organization_types, &index, day);
        let name = day.format("%Y-%m-%d").to_string();
        chart.organizations.push(Series {
            name: name.clone(),
            data: organizations,
        });
        chart.people.push(Series { name, data: people });
    }

    tracing::debug!(
        start = %period.start(),
        end = %period.end(),
        organizations = chart.organization_total(),
        people = chart.people_total(),
        "computed testing bar data"
    );
    chart
}

/// Cumulative pie data for every organization that has started testing by
/// `today`. People counts are raw headcount sums.
pub fn overall_testing_pie_data(
    members: &[ProgramMember],
    organization_types: &[OrganizationType],
    today: NaiveDate,
    translator: &dyn Translator,
) -> PieChartData {
    let index = catalog_index(organization_types);
    let mut chart = PieChartData {
        labels: labels(organization_types, translator),
        organizations: vec![0; organization_types.len()],
        people: vec![0; organization_types.len()],
    };

    for member in members {
        let Some(&slot) = index.get(&member.organization_type_id) else {
            continue;
        };
        if !has_started_testing_by(member, today) {
            continue;
        }
        chart.organizations[slot] += 1;
        chart.people[slot] += u64::from(member.headcount(&organization_types[slot]));
    }

    tracing::debug!(
        %today,
        organizations = chart.organization_total(),
        people = chart.people_total(),
        "computed overall testing pie data"
    );
    chart
}
