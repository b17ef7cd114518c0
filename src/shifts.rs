use chrono::NaiveDate;

use crate::backend::Backend;
use crate::error::Result;
use crate::models::{ShiftDay, ShiftMutation};
use crate::state::{Effect, ShiftAction, ShiftState};

pub struct ShiftSession<B> {
    backend: B,
    state: ShiftState,
}

impl<B: Backend> ShiftSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: ShiftState::default(),
        }
    }

    pub fn state(&self) -> &ShiftState {
        &self.state
    }

    /// Returns the pending notification and dismisses it.
    pub fn take_notification(&mut self) -> Option<String> {
        let notification = self.state.notification.clone();
        self.state.reduce(ShiftAction::NotificationDismissed);
        notification
    }

    /// Loads `date` and makes it the selected day.
    pub async fn open_day(&mut self, date: NaiveDate) -> Result<&ShiftDay> {
        self.state.reduce(ShiftAction::FetchDayStarted(date));
        self.fetch(date).await?;
        self.state
            .day
            .as_ref()
            .ok_or_else(|| crate::error::Error::validation(format!("no shift data for {date}")))
    }

    /// Applies a mutation to the selected day. On success the day is fetched
    /// again; on failure state is left as it was and a notification is set.
    pub async fn apply(&mut self, mutation: ShiftMutation) -> Result<()> {
        let Some(date) = self.state.selected_date else {
            return Err(crate::error::Error::validation(
                "select a day before editing shifts",
            ));
        };

        match self.backend.apply_shift_mutation(date, &mutation).await {
            Ok(()) => {
                tracing::info!(
                    %date,
                    slot = mutation.slot().as_str(),
                    mutation = %mutation.describe(),
                    "shift mutation succeeded"
                );
                if let Some(effect) = self.state.reduce(ShiftAction::MutationSucceeded(mutation)) {
                    self.run(effect).await?;
                }
                Ok(())
            }
            Err(err) => {
                self.state.reduce(ShiftAction::MutationFailed {
                    mutation,
                    notification: err.notification(),
                });
                Err(err)
            }
        }
    }

    async fn run(&mut self, effect: Effect) -> Result<()> {
        match effect {
            Effect::FetchDay(date) => self.fetch(date).await,
        }
    }

    async fn fetch(&mut self, date: NaiveDate) -> Result<()> {
        match self.backend.shift_day(date).await {
            Ok(day) => {
                self.state.reduce(ShiftAction::DayLoaded(day));
                Ok(())
            }
            Err(err) => {
                self.state.reduce(ShiftAction::DayFailed(err.notification()));
                Err(err)
            }
        }
    }
}
