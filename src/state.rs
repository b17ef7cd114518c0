use chrono::NaiveDate;

use crate::analytics::{self, BarChartData, Period, PieChartData};
use crate::i18n::Translator;
use crate::models::{OrganizationType, ProgramMember, ShiftDay, ShiftMutation};

#[derive(Debug, Clone)]
pub enum ProgramAction {
    MembersLoaded(Vec<ProgramMember>),
    OrganizationTypesLoaded(Vec<OrganizationType>),
    RequestFailed(Option<String>),
    ComputeBar { period: Period },
    ComputePie { today: NaiveDate },
    NotificationDismissed,
}

#[derive(Debug, Clone, Default)]
pub struct ProgramState {
    pub members: Vec<ProgramMember>,
    pub organization_types: Vec<OrganizationType>,
    pub bar: Option<BarChartData>,
    pub pie: Option<PieChartData>,
    pub notification: Option<String>,
}

impl ProgramState {
    pub fn reduce(&mut self, action: ProgramAction, translator: &dyn Translator) {
        match action {
            ProgramAction::MembersLoaded(members) => {
                self.members = members;
            }
            ProgramAction::OrganizationTypesLoaded(organization_types) => {
                self.organization_types = organization_types;
            }
            ProgramAction::RequestFailed(notification) => {
                self.notification = notification;
            }
            ProgramAction::ComputeBar { period } => {
                self.bar = Some(analytics::currently_being_tested_bar_data(
                    &self.members,
                    &self.organization_types,
                    period,
                    translator,
                ));
            }
            ProgramAction::ComputePie { today } => {
                self.pie = Some(analytics::overall_testing_pie_data(
                    &self.members,
                    &self.organization_types,
                    today,
                    translator,
                ));
            }
            ProgramAction::NotificationDismissed => {
                self.notification = None;
            }
        }
    }
}

/// Work the shift slice asks its driver to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    FetchDay(NaiveDate),
}

#[derive(Debug, Clone)]
pub enum ShiftAction {
    FetchDayStarted(NaiveDate),
    DayLoaded(ShiftDay),
    DayFailed(Option<String>),
    MutationSucceeded(ShiftMutation),
    MutationFailed {
        mutation: ShiftMutation,
        notification: Option<String>,
    },
    NotificationDismissed,
}

#[derive(Debug, Clone, Default)]
pub struct ShiftState {
    pub selected_date: Option<NaiveDate>,
    pub day: Option<ShiftDay>,
    pub notification: Option<String>,
}

impl ShiftState {
    /// Applies an action. A successful mutation always asks for the selected
    /// day to be fetched again; local data is never patched in place.
    pub fn reduce(&mut self, action: ShiftAction) -> Option<Effect> {
        match action {
            ShiftAction::FetchDayStarted(date) => {
                self.selected_date = Some(date);
                None
            }
            ShiftAction::DayLoaded(day) => {
                self.day = Some(day);
                None
            }
            ShiftAction::DayFailed(notification) => {
                self.notification = notification;
                None
            }
            ShiftAction::MutationSucceeded(mutation) => {
                tracing::debug!(mutation = %mutation.describe(), "refetching after shift mutation");
                self.selected_date.map(Effect::FetchDay)
            }
            ShiftAction::MutationFailed {
                mutation,
                notification,
            } => {
                tracing::debug!(mutation = %mutation.describe(), "shift mutation failed");
                self.notification = notification;
                None
            }
            ShiftAction::NotificationDismissed => {
                self.notification = None;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{Labels, Language};
    use crate::models::{AssignmentKind, MemberStatus, Shift, ShiftSlot};
    use chrono::Utc;
    use uuid::Uuid;

    fn day(date: NaiveDate, required_headcount: u32) -> ShiftDay {
        ShiftDay {
            date,
            shifts: vec![Shift {
                slot: ShiftSlot::Morning,
                required_headcount,
                confirmed: vec![],
                fixed: vec![],
                temporary: vec![],
            }],
        }
    }

    fn mutation() -> ShiftMutation {
        ShiftMutation::RemoveEmployee {
            slot: ShiftSlot::Morning,
            kind: AssignmentKind::Confirmed,
            employee_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn successful_mutation_requests_refetch() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let mut state = ShiftState::default();
        state.reduce(ShiftAction::FetchDayStarted(date));
        state.reduce(ShiftAction::DayLoaded(day(date, 4)));

        let effect = state.reduce(ShiftAction::MutationSucceeded(mutation()));
        assert_eq!(effect, Some(Effect::FetchDay(date)));
        assert_eq!(state.day, Some(day(date, 4)));
    }

    #[test]
    fn failed_mutation_keeps_state_and_notifies() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let mut state = ShiftState::default();
        state.reduce(ShiftAction::FetchDayStarted(date));
        state.reduce(ShiftAction::DayLoaded(day(date, 4)));

        let effect = state.reduce(ShiftAction::MutationFailed {
            mutation: mutation(),
            notification: Some("This shift is already fully staffed.".to_string()),
        });
        assert_eq!(effect, None);
        assert_eq!(state.day, Some(day(date, 4)));
        assert!(state.notification.is_some());
        state.reduce(ShiftAction::NotificationDismissed);
        assert!(state.notification.is_none());
    }

    #[test]
    fn late_response_overwrites_current_day() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2026, 3, 17).unwrap();
        let mut state = ShiftState::default();
        state.reduce(ShiftAction::FetchDayStarted(yesterday));
        state.reduce(ShiftAction::FetchDayStarted(today));
        state.reduce(ShiftAction::DayLoaded(day(today, 4)));
        state.reduce(ShiftAction::DayLoaded(day(yesterday, 2)));
        assert_eq!(state.day.as_ref().map(|day| day.date), Some(yesterday));
        assert_eq!(state.selected_date, Some(today));
    }

    #[test]
    fn failed_request_keeps_loaded_data() {
        let translator = Labels::new(Language::English);
        let mut state = ProgramState::default();
        state.reduce(
            ProgramAction::OrganizationTypesLoaded(vec![OrganizationType {
                id: 1,
                key: "school".to_string(),
                name: "School".to_string(),
            }]),
            &translator,
        );
        state.reduce(
            ProgramAction::RequestFailed(Some("Something went wrong".to_string())),
            &translator,
        );
        assert_eq!(state.organization_types.len(), 1);
        assert_eq!(state.notification.as_deref(), Some("Something went wrong"));
        state.reduce(ProgramAction::NotificationDismissed, &translator);
        assert!(state.notification.is_none());
    }

    #[test]
    fn program_slice_writes_chart_results() {
        let translator = Labels::new(Language::English);
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap();
        let mut state = ProgramState::default();
        state.reduce(
            ProgramAction::OrganizationTypesLoaded(vec![OrganizationType {
                id: 1,
                key: "school".to_string(),
                name: "School".to_string(),
            }]),
            &translator,
        );
        state.reduce(
            ProgramAction::MembersLoaded(vec![ProgramMember {
                id: Uuid::new_v4(),
                name: "Riverside Primary".to_string(),
                email: None,
                organization_type_id: 1,
                status: MemberStatus::Active,
                first_test_date: Some(today.and_hms_opt(8, 0, 0).unwrap().and_utc()),
                second_test_date: None,
                third_test_date: None,
                fourth_test_date: None,
                fifth_test_date: None,
                number_of_samples: Some(80),
                registered_employees: None,
                created_at: Utc::now(),
            }]),
            &translator,
        );
        state.reduce(
            ProgramAction::ComputeBar {
                period: Period::today(today),
            },
            &translator,
        );
        state.reduce(ProgramAction::ComputePie { today }, &translator);

        let bar = state.bar.as_ref().unwrap();
        assert_eq!(bar.organization_total(), 1);
        assert_eq!(bar.people_total(), 80);
        assert_eq!(state.pie.as_ref().unwrap().people, vec![80]);
    }
}
