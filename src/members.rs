use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::i18n::Translator;
use crate::models::{MemberStatus, OrganizationType, ProgramMember};

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub statuses: Vec<MemberStatus>,
    pub organization_type_id: Option<i64>,
    pub search: Option<String>,
    pub include_inactive: bool,
}

impl MemberFilter {
    pub fn matches(&self, member: &ProgramMember) -> bool {
        if !self.include_inactive
            && !member.is_active()
            && !self.statuses.contains(&MemberStatus::NotActive)
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&member.status) {
            return false;
        }
        if let Some(type_id) = self.organization_type_id {
            if member.organization_type_id != type_id {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let in_name = member.name.to_lowercase().contains(&needle);
            let in_email = member
                .email
                .as_deref()
                .map(|email| email.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !in_name && !in_email {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, members: &'a [ProgramMember]) -> Vec<&'a ProgramMember> {
        members.iter().filter(|member| self.matches(member)).collect()
    }
}

/// Registration payload for a new program member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProgramMember {
    pub name: String,
    pub email: String,
    pub organization_type_id: i64,
    #[serde(default)]
    pub test_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub number_of_samples: Option<u32>,
    #[serde(default)]
    pub registered_employees: Option<u32>,
}

impl NewProgramMember {
    pub fn validate(&self, organization_types: &[OrganizationType]) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }
        if !is_plausible_email(&self.email) {
            return Err(Error::validation(format!("invalid email address: {}", self.email)));
        }
        let organization_type = organization_types
            .iter()
            .find(|candidate| candidate.id == self.organization_type_id)
            .ok_or_else(|| {
                Error::validation(format!(
                    "unknown organization type {}",
                    self.organization_type_id
                ))
            })?;
        if self.test_dates.len() > 5 {
            return Err(Error::validation("at most five test dates are allowed"));
        }
        if self.test_dates.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(Error::validation("test dates must be in chronological order"));
        }
        if organization_type.is_school() {
            if self.number_of_samples.is_none() {
                return Err(Error::validation("schools must report the number of samples"));
            }
        } else if self.registered_employees.is_none() {
            return Err(Error::validation("registered employees are required"));
        }
        Ok(())
    }

    pub fn into_member(self, now: DateTime<Utc>) -> ProgramMember {
        let mut dates = self.test_dates.into_iter();
        ProgramMember {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            email: Some(self.email.trim().to_string()),
            organization_type_id: self.organization_type_id,
            status: MemberStatus::Registered,
            first_test_date: dates.next(),
            second_test_date: dates.next(),
            third_test_date: dates.next(),
            fourth_test_date: dates.next(),
            fifth_test_date: dates.next(),
            number_of_samples: self.number_of_samples,
            registered_employees: self.registered_employees,
            created_at: now,
        }
    }
}

fn is_plausible_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub const EXPORT_HEADERS: [&str; 12] = [
    "id",
    "name",
    "email",
    "organization_type",
    "status",
    "first_test_date",
    "second_test_date",
    "third_test_date",
    "fourth_test_date",
    "fifth_test_date",
    "number_of_samples",
    "registered_employees",
];

fn format_day(date: Option<DateTime<Utc>>) -> String {
    date.map(|value| value.date_naive().format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn format_count(count: Option<u32>) -> String {
    count.map(|value| value.to_string()).unwrap_or_default()
}

/// Writes the members as CSV, one row per member, and returns the row count.
pub fn export_csv<W: Write>(
    writer: W,
    members: &[&ProgramMember],
    organization_types: &[OrganizationType],
    translator: &dyn Translator,
) -> Result<usize> {
    let type_labels: HashMap<i64, String> = organization_types
        .iter()
        .map(|organization_type| {
            (
                organization_type.id,
                translator.organization_type(organization_type),
            )
        })
        .collect();

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(EXPORT_HEADERS)?;

    for member in members {
        let [first, second, third, fourth, fifth] = member.test_dates();
        csv_writer.write_record([
            member.id.to_string(),
            member.name.clone(),
            member.email.clone().unwrap_or_default(),
            type_labels
                .get(&member.organization_type_id)
                .cloned()
                .unwrap_or_default(),
            member.status.to_string(),
            format_day(first),
            format_day(second),
            format_day(third),
            format_day(fourth),
            format_day(fifth),
            format_count(member.number_of_samples),
            format_count(member.registered_employees),
        ])?;
    }

    csv_writer.flush()?;
    Ok(members.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{Labels, Language};
    use chrono::TimeZone;

    fn catalog() -> Vec<OrganizationType> {
        vec![
            OrganizationType {
                id: 1,
                key: "school".to_string(),
                name: "School".to_string(),
            },
            OrganizationType {
                id: 2,
                key: "company".to_string(),
                name: "Company".to_string(),
            },
        ]
    }

    fn member(name: &str, status: MemberStatus, organization_type_id: i64) -> ProgramMember {
        ProgramMember {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: Some(format!("{}@example.org", name.to_lowercase().replace(' ', "."))),
            organization_type_id,
            status,
            first_test_date: Some(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()),
            second_test_date: None,
            third_test_date: None,
            fourth_test_date: None,
            fifth_test_date: None,
            number_of_samples: Some(60),
            registered_employees: None,
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    fn registration() -> NewProgramMember {
        NewProgramMember {
            name: "Northside Logistics".to_string(),
            email: "ops@northside.example".to_string(),
            organization_type_id: 2,
            test_dates: vec![
                Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 4, 8, 8, 0, 0).unwrap(),
            ],
            number_of_samples: None,
            registered_employees: Some(85),
        }
    }

    #[test]
    fn filter_hides_inactive_by_default() {
        let members = vec![
            member("Oak School", MemberStatus::Active, 1),
            member("Elm School", MemberStatus::NotActive, 1),
        ];
        let visible = MemberFilter::default().apply(&members);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "Oak School");

        let filter = MemberFilter {
            statuses: vec![MemberStatus::NotActive],
            ..MemberFilter::default()
        };
        assert_eq!(filter.apply(&members)[0].name, "Elm School");
    }

    #[test]
    fn filter_by_type_and_search() {
        let members = vec![
            member("Oak School", MemberStatus::Active, 1),
            member("Birch Works", MemberStatus::Onboarding, 2),
            member("Birch School", MemberStatus::Active, 1),
        ];
        let filter = MemberFilter {
            organization_type_id: Some(1),
            search: Some("BIRCH".to_string()),
            ..MemberFilter::default()
        };
        let found = filter.apply(&members);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Birch School");
    }

    #[test]
    fn validation_accepts_complete_registration() {
        assert!(registration().validate(&catalog()).is_ok());
    }

    #[test]
    fn validation_rejects_bad_input() {
        let mut bad_email = registration();
        bad_email.email = "ops.northside".to_string();
        assert!(bad_email.validate(&catalog()).is_err());

        let mut unordered = registration();
        unordered.test_dates.reverse();
        assert!(unordered.validate(&catalog()).is_err());

        let mut school = registration();
        school.organization_type_id = 1;
        let err = school.validate(&catalog()).unwrap_err();
        assert!(err.to_string().contains("number of samples"));

        let mut unknown = registration();
        unknown.organization_type_id = 7;
        assert!(unknown.validate(&catalog()).is_err());
    }

    #[test]
    fn registration_becomes_registered_member() {
        let now = Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap();
        let member = registration().into_member(now);
        assert_eq!(member.status, MemberStatus::Registered);
        assert_eq!(member.test_date_count(), 2);
        assert_eq!(member.created_at, now);
    }

    #[test]
    fn export_writes_fixed_columns() {
        let members = vec![member("Oak School", MemberStatus::Active, 1)];
        let refs: Vec<&ProgramMember> = members.iter().collect();
        let file = tempfile::NamedTempFile::new().unwrap();
        let written = export_csv(
            file.reopen().unwrap(),
            &refs,
            &catalog(),
            &Labels::new(Language::German),
        )
        .unwrap();
        assert_eq!(written, 1);

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(EXPORT_HEADERS.join(",").as_str()));
        let row = lines.next().unwrap();
        assert!(row.contains(",Oak School,oak.school@example.org,Schule,Active,2026-03-02,,,,,60,"));
        assert_eq!(lines.next(), None);
    }
}
