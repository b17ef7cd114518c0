use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::members::NewProgramMember;
use crate::models::{MemberStatus, OrganizationType, ProgramMember, ShiftDay, ShiftMutation};

/// Source of program and laboratory data.
#[async_trait]
pub trait Backend: Send {
    async fn program_members(&mut self) -> Result<Vec<ProgramMember>>;

    async fn organization_types(&mut self) -> Result<Vec<OrganizationType>>;

    async fn register_member(&mut self, member: &NewProgramMember) -> Result<ProgramMember>;

    async fn set_member_status(&mut self, id: Uuid, status: MemberStatus) -> Result<()>;

    async fn shift_day(&mut self, date: NaiveDate) -> Result<ShiftDay>;

    async fn apply_shift_mutation(&mut self, date: NaiveDate, mutation: &ShiftMutation)
        -> Result<()>;
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for &mut T {
    async fn program_members(&mut self) -> Result<Vec<ProgramMember>> {
        (**self).program_members().await
    }

    async fn organization_types(&mut self) -> Result<Vec<OrganizationType>> {
        (**self).organization_types().await
    }

    async fn register_member(&mut self, member: &NewProgramMember) -> Result<ProgramMember> {
        (**self).register_member(member).await
    }

    async fn set_member_status(&mut self, id: Uuid, status: MemberStatus) -> Result<()> {
        (**self).set_member_status(id, status).await
    }

    async fn shift_day(&mut self, date: NaiveDate) -> Result<ShiftDay> {
        (**self).shift_day(date).await
    }

    async fn apply_shift_mutation(
        &mut self,
        date: NaiveDate,
        mutation: &ShiftMutation,
    ) -> Result<()> {
        (**self).apply_shift_mutation(date, mutation).await
    }
}
