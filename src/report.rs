use std::fmt::Write;

use chrono::NaiveDate;

use crate::analytics::{BarChartData, PieChartData};
use crate::models::{MemberStatus, ProgramMember, ShiftDay};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub status: MemberStatus,
    pub count: usize,
}

pub fn summarize_by_status(members: &[ProgramMember]) -> Vec<StatusSummary> {
    let mut summaries: Vec<StatusSummary> = MemberStatus::ALL
        .into_iter()
        .map(|status| StatusSummary {
            status,
            count: members.iter().filter(|member| member.status == status).count(),
        })
        .filter(|summary| summary.count > 0)
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Plain-text rendering of bar data, one line per organization type.
pub fn render_bar(chart: &BarChartData) -> String {
    let mut output = String::new();

    for (period_index, series) in chart.organizations.iter().enumerate() {
        let people = chart.people.get(period_index);
        let _ = writeln!(output, "{}", series.name);
        for (index, label) in chart.labels.iter().enumerate() {
            let organizations = series.data.get(index).copied().unwrap_or(0);
            let headcount = people
                .and_then(|people| people.data.get(index))
                .copied()
                .unwrap_or(0);
            let _ = writeln!(
                output,
                "  {:<16} {:>5} organizations {:>7} people",
                label, organizations, headcount
            );
        }
    }
    let _ = writeln!(
        output,
        "Total: {} organizations, {} people",
        chart.organization_total(),
        chart.people_total()
    );
    output
}

fn percentage(value: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        value as f64 * 100.0 / total as f64
    }
}

pub fn render_pie(chart: &PieChartData) -> String {
    let mut output = String::new();
    let organization_total = chart.organization_total();
    let people_total = chart.people_total();

    for (index, label) in chart.labels.iter().enumerate() {
        let organizations = chart.organizations.get(index).copied().unwrap_or(0);
        let people = chart.people.get(index).copied().unwrap_or(0);
        let _ = writeln!(
            output,
            "{:<16} {:>5} organizations ({:>5.1}%) {:>7} people ({:>5.1}%)",
            label,
            organizations,
            percentage(organizations, organization_total),
            people,
            percentage(people, people_total)
        );
    }
    let _ = writeln!(
        output,
        "Total: {} organizations, {} people",
        organization_total, people_total
    );
    output
}

pub fn render_shift_day(day: &ShiftDay) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Shifts on {}", day.date);

    if day.shifts.is_empty() {
        let _ = writeln!(output, "No shifts planned for this day.");
        return output;
    }

    for shift in &day.shifts {
        let _ = writeln!(
            output,
            "- {}: {}/{} staffed, {} open",
            shift.slot.as_str(),
            shift.staffed(),
            shift.required_headcount,
            shift.open_positions()
        );
        for (label, employees) in [
            ("confirmed", &shift.confirmed),
            ("fixed", &shift.fixed),
            ("temporary", &shift.temporary),
        ] {
            for employee in employees {
                let _ = writeln!(output, "    {label:<9} {} ({})", employee.full_name, employee.id);
            }
        }
    }
    output
}

pub fn build_report(
    today: NaiveDate,
    members: &[ProgramMember],
    bar: &BarChartData,
    pie: &PieChartData,
) -> String {
    let summaries = summarize_by_status(members);
    let mut output = String::new();

    let _ = writeln!(output, "# Testing Program Dashboard");
    let _ = writeln!(output, "Generated for {}", today);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Being Tested Today");

    if bar.organization_total() == 0 {
        let _ = writeln!(output, "No organizations are being tested today.");
    } else {
        for series in &bar.organizations {
            for (index, label) in bar.labels.iter().enumerate() {
                let count = series.data.get(index).copied().unwrap_or(0);
                if count > 0 {
                    let _ = writeln!(output, "- {} ({}): {} organizations", label, series.name, count);
                }
            }
        }
        let _ = writeln!(
            output,
            "- Total: {} organizations, {} people",
            bar.organization_total(),
            bar.people_total()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall Testing");

    if pie.organization_total() == 0 {
        let _ = writeln!(output, "No organizations have started testing.");
    } else {
        for (index, label) in pie.labels.iter().enumerate() {
            let _ = writeln!(
                output,
                "- {}: {} organizations, {} people",
                label,
                pie.organizations.get(index).copied().unwrap_or(0),
                pie.people.get(index).copied().unwrap_or(0)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Program Members");

    if summaries.is_empty() {
        let _ = writeln!(output, "No program members registered.");
    } else {
        for summary in &summaries {
            let _ = writeln!(output, "- {}: {}", summary.status, summary.count);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Series;
    use chrono::Utc;
    use uuid::Uuid;

    fn member(status: MemberStatus) -> ProgramMember {
        ProgramMember {
            id: Uuid::new_v4(),
            name: "Member".to_string(),
            email: None,
            organization_type_id: 1,
            status,
            first_test_date: None,
            second_test_date: None,
            third_test_date: None,
            fourth_test_date: None,
            fifth_test_date: None,
            number_of_samples: None,
            registered_employees: None,
            created_at: Utc::now(),
        }
    }

    fn bar() -> BarChartData {
        BarChartData {
            labels: vec!["School".to_string(), "Camp".to_string()],
            organizations: vec![Series {
                name: "2026-03-18".to_string(),
                data: vec![3, 0],
            }],
            people: vec![Series {
                name: "2026-03-18".to_string(),
                data: vec![150, 0],
            }],
        }
    }

    #[test]
    fn status_summary_sorted_by_count() {
        let members = vec![
            member(MemberStatus::Active),
            member(MemberStatus::Invited),
            member(MemberStatus::Active),
        ];
        let summaries = summarize_by_status(&members);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].status, MemberStatus::Active);
        assert_eq!(summaries[0].count, 2);
    }

    #[test]
    fn report_lists_sections() {
        let pie = PieChartData {
            labels: vec!["School".to_string(), "Camp".to_string()],
            organizations: vec![5, 1],
            people: vec![400, 30],
        };
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let report = build_report(today, &[member(MemberStatus::Active)], &bar(), &pie);
        assert!(report.contains("Generated for 2026-03-18"));
        assert!(report.contains("- School (2026-03-18): 3 organizations"));
        assert!(!report.contains("- Camp (2026-03-18)"));
        assert!(report.contains("- Camp: 1 organizations, 30 people"));
        assert!(report.contains("- Active: 1"));
    }

    #[test]
    fn empty_report_uses_placeholders() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let report = build_report(today, &[], &BarChartData::default(), &PieChartData::default());
        assert!(report.contains("No organizations are being tested today."));
        assert!(report.contains("No program members registered."));
    }

    #[test]
    fn pie_percentages_handle_zero_total() {
        let pie = PieChartData {
            labels: vec!["School".to_string()],
            organizations: vec![0],
            people: vec![0],
        };
        assert!(render_pie(&pie).contains("0.0%"));
        assert!(render_bar(&bar()).contains("Total: 3 organizations, 150 people"));
    }
}
