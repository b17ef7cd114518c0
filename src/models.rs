use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SCHOOL_KEY: &str = "school";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemberStatus {
    Invited,
    Registered,
    Onboarding,
    Active,
    NotActive,
}

impl MemberStatus {
    pub const ALL: [MemberStatus; 5] = [
        MemberStatus::Invited,
        MemberStatus::Registered,
        MemberStatus::Onboarding,
        MemberStatus::Active,
        MemberStatus::NotActive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Invited => "Invited",
            MemberStatus::Registered => "Registered",
            MemberStatus::Onboarding => "Onboarding",
            MemberStatus::Active => "Active",
            MemberStatus::NotActive => "NotActive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value))
    }

    /// Members are never deleted. Any state may be deactivated, and a
    /// deactivated member can only come back through onboarding.
    pub fn can_transition_to(self, next: MemberStatus) -> bool {
        use MemberStatus::*;
        match (self, next) {
            (from, to) if from == to => true,
            (_, NotActive) => true,
            (Invited, Registered) => true,
            (Registered, Onboarding) => true,
            (Onboarding, Active) => true,
            (NotActive, Onboarding) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationType {
    pub id: i64,
    pub key: String,
    pub name: String,
}

impl OrganizationType {
    pub fn is_school(&self) -> bool {
        self.key.eq_ignore_ascii_case(SCHOOL_KEY)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramMember {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub organization_type_id: i64,
    pub status: MemberStatus,
    #[serde(default)]
    pub first_test_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub second_test_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub third_test_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fourth_test_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fifth_test_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub number_of_samples: Option<u32>,
    #[serde(default)]
    pub registered_employees: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ProgramMember {
    pub fn test_dates(&self) -> [Option<DateTime<Utc>>; 5] {
        [
            self.first_test_date,
            self.second_test_date,
            self.third_test_date,
            self.fourth_test_date,
            self.fifth_test_date,
        ]
    }

    /// Calendar days of the test dates, in slot order.
    pub fn test_days(&self) -> [Option<NaiveDate>; 5] {
        self.test_dates().map(|date| date.map(|value| value.date_naive()))
    }

    pub fn test_date_count(&self) -> u32 {
        self.test_dates().iter().filter(|date| date.is_some()).count() as u32
    }

    pub fn is_active(&self) -> bool {
        self.status != MemberStatus::NotActive
    }

    /// Samples for schools, registered employees for everyone else.
    pub fn headcount(&self, organization_type: &OrganizationType) -> u32 {
        let value = if organization_type.is_school() {
            self.number_of_samples
        } else {
            self.registered_employees
        };
        value.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftSlot {
    Morning,
    Afternoon,
}

impl ShiftSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            ShiftSlot::Morning => "morning",
            ShiftSlot::Afternoon => "afternoon",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "morning" => Some(ShiftSlot::Morning),
            "afternoon" => Some(ShiftSlot::Afternoon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentKind {
    Confirmed,
    Fixed,
    Temporary,
}

impl AssignmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentKind::Confirmed => "confirmed",
            AssignmentKind::Fixed => "fixed",
            AssignmentKind::Temporary => "temporary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "confirmed" => Some(AssignmentKind::Confirmed),
            "fixed" => Some(AssignmentKind::Fixed),
            "temporary" => Some(AssignmentKind::Temporary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub slot: ShiftSlot,
    pub required_headcount: u32,
    #[serde(default)]
    pub confirmed: Vec<Employee>,
    #[serde(default)]
    pub fixed: Vec<Employee>,
    #[serde(default)]
    pub temporary: Vec<Employee>,
}

impl Shift {
    pub fn staffed(&self) -> u32 {
        (self.confirmed.len() + self.fixed.len() + self.temporary.len()) as u32
    }

    pub fn open_positions(&self) -> u32 {
        self.required_headcount.saturating_sub(self.staffed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDay {
    pub date: NaiveDate,
    pub shifts: Vec<Shift>,
}

/// Mutating actions on a day's shifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ShiftMutation {
    #[serde(rename_all = "camelCase")]
    AddEmployee {
        slot: ShiftSlot,
        kind: AssignmentKind,
        employee_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    RemoveEmployee {
        slot: ShiftSlot,
        kind: AssignmentKind,
        employee_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    IncreaseHeadcount { slot: ShiftSlot, by: u32 },
}

impl ShiftMutation {
    pub fn slot(&self) -> ShiftSlot {
        match self {
            ShiftMutation::AddEmployee { slot, .. }
            | ShiftMutation::RemoveEmployee { slot, .. }
            | ShiftMutation::IncreaseHeadcount { slot, .. } => *slot,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ShiftMutation::AddEmployee { slot, kind, employee_id } => {
                format!("add {} employee {} to {} shift", kind.as_str(), employee_id, slot.as_str())
            }
            ShiftMutation::RemoveEmployee { slot, kind, employee_id } => format!(
                "remove {} employee {} from {} shift",
                kind.as_str(),
                employee_id,
                slot.as_str()
            ),
            ShiftMutation::IncreaseHeadcount { slot, by } => {
                format!("increase {} shift headcount by {}", slot.as_str(), by)
            }
        }
    }
}
