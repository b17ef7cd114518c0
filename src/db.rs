use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{ApiError, ConflictKind, Error, Result};
use crate::members::NewProgramMember;
use crate::models::{
    AssignmentKind, Employee, MemberStatus, OrganizationType, ProgramMember, Shift, ShiftDay,
    ShiftMutation, ShiftSlot,
};

const MEMBER_COLUMNS: &str = "id, name, email, organization_type_id, status, \
    first_test_date, second_test_date, third_test_date, fourth_test_date, fifth_test_date, \
    number_of_samples, registered_employees, created_at";

/// Postgres store behind the program API.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init_db(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn seed(&self, today: NaiveDate) -> Result<()> {
        let organization_types = [
            (1_i64, "school", "School"),
            (2, "company", "Company"),
            (3, "camp", "Camp"),
            (4, "daycare", "Daycare"),
        ];

        for (id, key, name) in organization_types {
            sqlx::query(
                r#"
                INSERT INTO testing_program.organization_types (id, key, name)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO UPDATE SET key = EXCLUDED.key, name = EXCLUDED.name
                "#,
            )
            .bind(id)
            .bind(key)
            .bind(name)
            .execute(&self.pool)
            .await?;
        }

        let members = [
            ("seed-001", "Riverside Primary School", "office@riverside.example", 1_i64, "Active", 0_i64, Some(240), None),
            ("seed-002", "Northside Logistics", "ops@northside.example", 2, "Active", 7, None, Some(85)),
            ("seed-003", "Lakeview Summer Camp", "camp@lakeview.example", 3, "Active", 10, None, Some(40)),
            ("seed-004", "Little Acorns Daycare", "hello@acorns.example", 4, "Onboarding", -3, None, Some(18)),
            ("seed-005", "Old Mill Works", "info@oldmill.example", 2, "NotActive", 14, None, Some(120)),
        ];

        for (source_key, name, email, type_id, status, days_ago, samples, employees) in members {
            let first_test = at_morning(today - Duration::days(days_ago));
            sqlx::query(
                r#"
                INSERT INTO testing_program.program_members
                (id, name, email, organization_type_id, status, first_test_date,
                 number_of_samples, registered_employees, source_key, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(email)
            .bind(type_id)
            .bind(status)
            .bind(first_test)
            .bind(samples)
            .bind(employees)
            .bind(source_key)
            .execute(&self.pool)
            .await?;
        }

        let employees = [
            (Uuid::from_u128(0x0c22f1f1_9184_4fd4_9b21_28c68a6a89dc), "Jules Moreno"),
            (Uuid::from_u128(0xd5a0a1a2_2a3c_44c2_8f73_60b7897a9dd2), "Kiara Patel"),
        ];
        for (id, full_name) in employees {
            sqlx::query(
                r#"
                INSERT INTO testing_program.employees (id, full_name)
                VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name
                "#,
            )
            .bind(id)
            .bind(full_name)
            .execute(&self.pool)
            .await?;
        }

        for slot in [ShiftSlot::Morning, ShiftSlot::Afternoon] {
            sqlx::query(
                r#"
                INSERT INTO testing_program.lab_shifts (shift_date, slot, required_headcount)
                VALUES ($1, $2, 4)
                ON CONFLICT (shift_date, slot) DO NOTHING
                "#,
            )
            .bind(today)
            .bind(slot.as_str())
            .execute(&self.pool)
            .await?;
        }

        tracing::info!(%today, "seed data inserted");
        Ok(())
    }

    /// Imports members from CSV. Rows whose `source_key` was already
    /// imported are skipped.
    pub async fn import_csv(&self, csv_path: &std::path::Path) -> Result<usize> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            name: String,
            email: Option<String>,
            organization_type: String,
            status: String,
            first_test_date: Option<NaiveDate>,
            second_test_date: Option<NaiveDate>,
            third_test_date: Option<NaiveDate>,
            fourth_test_date: Option<NaiveDate>,
            fifth_test_date: Option<NaiveDate>,
            number_of_samples: Option<i32>,
            registered_employees: Option<i32>,
            source_key: Option<String>,
        }

        let mut reader = csv::Reader::from_path(csv_path)?;
        let mut inserted = 0usize;

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            let status = MemberStatus::parse(&row.status)
                .ok_or_else(|| Error::validation(format!("unknown status {}", row.status)))?;
            let type_id: i64 = sqlx::query(
                "SELECT id FROM testing_program.organization_types WHERE key = $1",
            )
            .bind(row.organization_type.to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .map(|found| found.get("id"))
            .ok_or_else(|| {
                Error::validation(format!("unknown organization type {}", row.organization_type))
            })?;

            let source_key = row
                .source_key
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

            let result = sqlx::query(
                r#"
                INSERT INTO testing_program.program_members
                (id, name, email, organization_type_id, status,
                 first_test_date, second_test_date, third_test_date, fourth_test_date, fifth_test_date,
                 number_of_samples, registered_employees, source_key, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, now())
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&row.name)
            .bind(&row.email)
            .bind(type_id)
            .bind(status.as_str())
            .bind(row.first_test_date.map(at_morning))
            .bind(row.second_test_date.map(at_morning))
            .bind(row.third_test_date.map(at_morning))
            .bind(row.fourth_test_date.map(at_morning))
            .bind(row.fifth_test_date.map(at_morning))
            .bind(row.number_of_samples)
            .bind(row.registered_employees)
            .bind(source_key)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        tracing::info!(inserted, path = %csv_path.display(), "imported program members");
        Ok(inserted)
    }

    /// Assigns an employee, or changes the kind of an existing assignment.
    /// The shift row is locked so concurrent additions see each other.
    async fn add_employee(
        &self,
        date: NaiveDate,
        slot: ShiftSlot,
        kind: AssignmentKind,
        employee_id: Uuid,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let required = sqlx::query(
            "SELECT required_headcount FROM testing_program.lab_shifts WHERE shift_date = $1 AND slot = $2 FOR UPDATE",
        )
        .bind(date)
        .bind(slot.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .map(|found| to_count(found.get("required_headcount")))
        .ok_or_else(|| Error::validation(format!("no {} shift on {}", slot.as_str(), date)))?;

        let others: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS staffed FROM testing_program.shift_assignments
            WHERE shift_date = $1 AND slot = $2 AND employee_id <> $3
            "#,
        )
        .bind(date)
        .bind(slot.as_str())
        .bind(employee_id)
        .fetch_one(&mut *tx)
        .await?
        .get("staffed");
        check_capacity(kind, others, required)?;

        sqlx::query(
            r#"
            INSERT INTO testing_program.shift_assignments (shift_date, slot, employee_id, kind)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (shift_date, slot, employee_id) DO UPDATE SET kind = EXCLUDED.kind
            "#,
        )
        .bind(date)
        .bind(slot.as_str())
        .bind(employee_id)
        .bind(kind.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Fixed employees never count against the headcount target. `others` is the
/// number of assignments on the shift excluding the employee being added.
fn check_capacity(kind: AssignmentKind, others: i64, required: u32) -> Result<()> {
    if kind != AssignmentKind::Fixed && others >= i64::from(required) {
        return Err(ApiError::Conflict {
            kind: ConflictKind::ShiftFull,
            message: format!("shift needs {required} employees and has {others}"),
        }
        .into());
    }
    Ok(())
}

fn to_column(value: Option<u32>, field: &str) -> Result<Option<i32>> {
    value
        .map(|count| {
            i32::try_from(count)
                .map_err(|_| Error::validation(format!("{field} is too large: {count}")))
        })
        .transpose()
}

fn at_morning(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN))
        .and_utc()
}

fn to_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn member_from_row(row: &PgRow) -> Result<ProgramMember> {
    let status: String = row.get("status");
    let number_of_samples: Option<i32> = row.get("number_of_samples");
    let registered_employees: Option<i32> = row.get("registered_employees");
    Ok(ProgramMember {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        organization_type_id: row.get("organization_type_id"),
        status: MemberStatus::parse(&status)
            .ok_or_else(|| Error::validation(format!("unknown status {status}")))?,
        first_test_date: row.get("first_test_date"),
        second_test_date: row.get("second_test_date"),
        third_test_date: row.get("third_test_date"),
        fourth_test_date: row.get("fourth_test_date"),
        fifth_test_date: row.get("fifth_test_date"),
        number_of_samples: number_of_samples.map(to_count),
        registered_employees: registered_employees.map(to_count),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl Backend for PgStore {
    async fn program_members(&mut self) -> Result<Vec<ProgramMember>> {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM testing_program.program_members ORDER BY name"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(member_from_row).collect()
    }

    async fn organization_types(&mut self) -> Result<Vec<OrganizationType>> {
        let rows = sqlx::query("SELECT id, key, name FROM testing_program.organization_types ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| OrganizationType {
                id: row.get("id"),
                key: row.get("key"),
                name: row.get("name"),
            })
            .collect())
    }

    async fn register_member(&mut self, member: &NewProgramMember) -> Result<ProgramMember> {
        let organization_types = self.organization_types().await?;
        member.validate(&organization_types)?;
        let created = member.clone().into_member(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO testing_program.program_members
            (id, name, email, organization_type_id, status,
             first_test_date, second_test_date, third_test_date, fourth_test_date, fifth_test_date,
             number_of_samples, registered_employees, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(created.id)
        .bind(&created.name)
        .bind(&created.email)
        .bind(created.organization_type_id)
        .bind(created.status.as_str())
        .bind(created.first_test_date)
        .bind(created.second_test_date)
        .bind(created.third_test_date)
        .bind(created.fourth_test_date)
        .bind(created.fifth_test_date)
        .bind(to_column(created.number_of_samples, "number of samples")?)
        .bind(to_column(created.registered_employees, "registered employees")?)
        .bind(created.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(id = %created.id, name = %created.name, "registered program member");
        Ok(created)
    }

    async fn set_member_status(&mut self, id: Uuid, status: MemberStatus) -> Result<()> {
        let current: String = sqlx::query("SELECT status FROM testing_program.program_members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get("status"))
            .ok_or_else(|| Error::validation(format!("no program member {id}")))?;
        let current = MemberStatus::parse(&current)
            .ok_or_else(|| Error::validation(format!("unknown status {current}")))?;
        if !current.can_transition_to(status) {
            return Err(Error::validation(format!(
                "cannot move member from {current} to {status}"
            )));
        }

        sqlx::query("UPDATE testing_program.program_members SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn shift_day(&mut self, date: NaiveDate) -> Result<ShiftDay> {
        let shift_rows = sqlx::query(
            "SELECT slot, required_headcount FROM testing_program.lab_shifts WHERE shift_date = $1",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let mut shifts: BTreeMap<ShiftSlot, Shift> = BTreeMap::new();
        for row in shift_rows {
            let slot_name: String = row.get("slot");
            let Some(slot) = ShiftSlot::parse(&slot_name) else {
                tracing::warn!(slot = %slot_name, %date, "skipping shift with unknown slot");
                continue;
            };
            shifts.insert(
                slot,
                Shift {
                    slot,
                    required_headcount: to_count(row.get("required_headcount")),
                    confirmed: Vec::new(),
                    fixed: Vec::new(),
                    temporary: Vec::new(),
                },
            );
        }

        let assignment_rows = sqlx::query(
            r#"
            SELECT a.slot, a.kind, e.id, e.full_name
            FROM testing_program.shift_assignments a
            JOIN testing_program.employees e ON e.id = a.employee_id
            WHERE a.shift_date = $1
            ORDER BY e.full_name
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        for row in assignment_rows {
            let slot_name: String = row.get("slot");
            let kind_name: String = row.get("kind");
            let (Some(slot), Some(kind)) =
                (ShiftSlot::parse(&slot_name), AssignmentKind::parse(&kind_name))
            else {
                continue;
            };
            let Some(shift) = shifts.get_mut(&slot) else {
                continue;
            };
            let employee = Employee {
                id: row.get("id"),
                full_name: row.get("full_name"),
            };
            match kind {
                AssignmentKind::Confirmed => shift.confirmed.push(employee),
                AssignmentKind::Fixed => shift.fixed.push(employee),
                AssignmentKind::Temporary => shift.temporary.push(employee),
            }
        }

        Ok(ShiftDay {
            date,
            shifts: shifts.into_values().collect(),
        })
    }

    async fn apply_shift_mutation(
        &mut self,
        date: NaiveDate,
        mutation: &ShiftMutation,
    ) -> Result<()> {
        match mutation {
            ShiftMutation::AddEmployee {
                slot,
                kind,
                employee_id,
            } => {
                self.add_employee(date, *slot, *kind, *employee_id).await?;
            }
            ShiftMutation::RemoveEmployee {
                slot,
                kind,
                employee_id,
            } => {
                let result = sqlx::query(
                    r#"
                    DELETE FROM testing_program.shift_assignments
                    WHERE shift_date = $1 AND slot = $2 AND employee_id = $3 AND kind = $4
                    "#,
                )
                .bind(date)
                .bind(slot.as_str())
                .bind(employee_id)
                .bind(kind.as_str())
                .execute(&self.pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(Error::validation(format!(
                        "employee {employee_id} is not a {} employee on the {} shift",
                        kind.as_str(),
                        slot.as_str()
                    )));
                }
            }
            ShiftMutation::IncreaseHeadcount { slot, by } => {
                sqlx::query(
                    r#"
                    INSERT INTO testing_program.lab_shifts (shift_date, slot, required_headcount)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (shift_date, slot)
                    DO UPDATE SET required_headcount = testing_program.lab_shifts.required_headcount + EXCLUDED.required_headcount
                    "#,
                )
                .bind(date)
                .bind(slot.as_str())
                .bind(i32::try_from(*by).unwrap_or(i32::MAX))
                .execute(&self.pool)
                .await?;
            }
        }

        tracing::info!(%date, mutation = %mutation.describe(), "applied shift mutation");
        Ok(())
    }
}
