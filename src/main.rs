use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod analytics;
mod api;
mod auth;
mod backend;
mod config;
mod db;
mod error;
mod i18n;
mod members;
mod models;
mod report;
mod shifts;
mod state;

use analytics::Period;
use auth::{Capability, Session};
use backend::Backend;
use config::{Config, DataSource};
use i18n::{Labels, Translator};
use members::{MemberFilter, NewProgramMember};
use models::{AssignmentKind, MemberStatus, ShiftMutation, ShiftSlot};
use state::{ProgramAction, ProgramState};

#[derive(Parser)]
#[command(name = "testing-admin")]
#[command(about = "Administration tool for the testing program", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct FilterArgs {
    /// Only members with this status (repeatable)
    #[arg(long = "status", value_parser = parse_status)]
    statuses: Vec<MemberStatus>,
    #[arg(long)]
    type_id: Option<i64>,
    /// Case-insensitive match on name or email
    #[arg(long)]
    search: Option<String>,
    #[arg(long, default_value_t = false)]
    include_inactive: bool,
}

impl From<FilterArgs> for MemberFilter {
    fn from(args: FilterArgs) -> Self {
        MemberFilter {
            statuses: args.statuses,
            organization_type_id: args.type_id,
            search: args.search,
            include_inactive: args.include_inactive,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import program members from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List program members
    Members {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Export the filtered member list as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "program-members.csv")]
        out: PathBuf,
    },
    /// Register a new program member
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        type_id: i64,
        /// Test day as YYYY-MM-DD (repeatable, up to five)
        #[arg(long = "test-date")]
        test_dates: Vec<NaiveDate>,
        #[arg(long)]
        samples: Option<u32>,
        #[arg(long)]
        employees: Option<u32>,
    },
    /// Change a member's lifecycle status
    SetStatus {
        #[arg(long)]
        id: Uuid,
        #[arg(long, value_parser = parse_status)]
        status: MemberStatus,
    },
    /// Organizations being tested, per day
    Today {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Number of days ending with --date
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=3660))]
        days: u32,
    },
    /// Cumulative testing breakdown by organization type
    Overall {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate a markdown dashboard report
    Report {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Inspect or edit laboratory shifts
    Shifts {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[command(subcommand)]
        action: ShiftCommand,
    },
}

#[derive(Subcommand)]
enum ShiftCommand {
    /// Show the day's shifts
    Show,
    /// Assign an employee to a shift
    Add {
        #[arg(long, value_parser = parse_slot)]
        slot: ShiftSlot,
        #[arg(long, value_parser = parse_kind)]
        kind: AssignmentKind,
        #[arg(long)]
        employee: Uuid,
    },
    /// Remove an employee from a shift
    Remove {
        #[arg(long, value_parser = parse_slot)]
        slot: ShiftSlot,
        #[arg(long, value_parser = parse_kind)]
        kind: AssignmentKind,
        #[arg(long)]
        employee: Uuid,
    },
    /// Raise the headcount target of a shift
    IncreaseHeadcount {
        #[arg(long, value_parser = parse_slot)]
        slot: ShiftSlot,
        #[arg(long, default_value_t = 1)]
        by: u32,
    },
}

fn parse_status(value: &str) -> Result<MemberStatus, String> {
    MemberStatus::parse(value).ok_or_else(|| format!("unknown status {value}"))
}

fn parse_slot(value: &str) -> Result<ShiftSlot, String> {
    ShiftSlot::parse(value).ok_or_else(|| format!("unknown shift slot {value}"))
}

fn parse_kind(value: &str) -> Result<AssignmentKind, String> {
    AssignmentKind::parse(value).ok_or_else(|| format!("unknown assignment kind {value}"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn morning_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(8, 0, 0)
        .unwrap_or_else(|| day.and_time(chrono::NaiveTime::MIN))
        .and_utc()
}

/// Prints the notification an operator would see, then hands the error back.
fn notify(err: error::Error) -> anyhow::Error {
    if let Some(message) = err.notification() {
        eprintln!("{message}");
    }
    anyhow::Error::new(err)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(config.log_json);

    let translator = Labels::new(config.language);
    let today = Utc::now().date_naive();

    match config.source.clone() {
        DataSource::Postgres { database_url } => {
            let mut store = db::PgStore::connect(&database_url)
                .await
                .context("failed to connect to Postgres")?;
            let session = Session::new(config.role, None);

            match cli.command {
                Commands::InitDb => {
                    store.init_db().await?;
                    println!("Schema ready.");
                }
                Commands::Seed => {
                    store.seed(today).await?;
                    println!("Seed data inserted.");
                }
                Commands::Import { csv } => {
                    session.require(Capability::ManageMembers)?;
                    let inserted = store.import_csv(&csv).await?;
                    println!("Inserted {inserted} program members from {}.", csv.display());
                }
                command => run(&mut store, &session, &translator, today, command).await?,
            }
        }
        DataSource::Api { base_url, token } => {
            let session = Session::new(config.role, token);
            let mut client = api::ApiClient::new(base_url, session.clone())?;

            match cli.command {
                Commands::InitDb | Commands::Seed | Commands::Import { .. } => {
                    anyhow::bail!("this command needs DATA_SOURCE=postgres");
                }
                command => {
                    let result = run(&mut client, &session, &translator, today, command).await;
                    if !client.session().is_signed_in() && session.is_signed_in() {
                        eprintln!("Stored API token was rejected; update API_TOKEN.");
                    }
                    result?;
                }
            }
        }
    }

    Ok(())
}

/// Records a failed request in the program slice and shows its notification once.
fn request_failed(
    state: &mut ProgramState,
    err: error::Error,
    translator: &Labels,
) -> anyhow::Error {
    state.reduce(ProgramAction::RequestFailed(err.notification()), translator);
    if let Some(message) = &state.notification {
        eprintln!("{message}");
    }
    state.reduce(ProgramAction::NotificationDismissed, translator);
    anyhow::Error::new(err)
}

fn shift_failed<B: Backend>(
    view: &mut shifts::ShiftSession<B>,
    err: error::Error,
) -> anyhow::Error {
    if let Some(message) = view.take_notification() {
        eprintln!("{message}");
    }
    anyhow::Error::new(err)
}

async fn load_program<B: Backend>(
    backend: &mut B,
    translator: &Labels,
) -> anyhow::Result<ProgramState> {
    let mut state = ProgramState::default();
    match backend.organization_types().await {
        Ok(organization_types) => state.reduce(
            ProgramAction::OrganizationTypesLoaded(organization_types),
            translator,
        ),
        Err(err) => return Err(request_failed(&mut state, err, translator)),
    }
    match backend.program_members().await {
        Ok(members) => {
            tracing::info!(members = members.len(), "loaded program members");
            state.reduce(ProgramAction::MembersLoaded(members), translator);
        }
        Err(err) => return Err(request_failed(&mut state, err, translator)),
    }
    Ok(state)
}

async fn run<B: Backend>(
    backend: &mut B,
    session: &Session,
    translator: &Labels,
    today: NaiveDate,
    command: Commands,
) -> anyhow::Result<()> {
    tracing::debug!(role = session.role().as_str(), "running command");
    match command {
        Commands::InitDb | Commands::Seed | Commands::Import { .. } => {
            anyhow::bail!("command is handled by the database store");
        }
        Commands::Members { filter } => {
            session.require(Capability::ManageMembers)?;
            let state = load_program(backend, translator).await?;
            let filter = MemberFilter::from(filter);
            let visible = filter.apply(&state.members);

            if visible.is_empty() {
                println!("No program members match this filter.");
                return Ok(());
            }

            for member in visible {
                let organization_type = state
                    .organization_types
                    .iter()
                    .find(|candidate| candidate.id == member.organization_type_id)
                    .map(|found| translator.organization_type(found))
                    .unwrap_or_else(|| "unknown".to_string());
                let first_test = member
                    .first_test_date
                    .map(|date| date.date_naive().to_string())
                    .unwrap_or_else(|| "not scheduled".to_string());
                println!(
                    "- {} ({}, {}) {} first test {}",
                    member.name, organization_type, member.status, member.id, first_test
                );
            }
        }
        Commands::Export { filter, out } => {
            session.require(Capability::Export)?;
            let state = load_program(backend, translator).await?;
            let filter = MemberFilter::from(filter);
            let visible = filter.apply(&state.members);
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let rows =
                members::export_csv(file, &visible, &state.organization_types, translator)?;
            println!("Exported {rows} program members to {}.", out.display());
        }
        Commands::Register {
            name,
            email,
            type_id,
            test_dates,
            samples,
            employees,
        } => {
            session.require(Capability::ManageMembers)?;
            let registration = NewProgramMember {
                name,
                email,
                organization_type_id: type_id,
                test_dates: test_dates.into_iter().map(morning_of).collect(),
                number_of_samples: samples,
                registered_employees: employees,
            };
            let organization_types = backend.organization_types().await.map_err(notify)?;
            registration.validate(&organization_types).map_err(notify)?;
            let member = backend.register_member(&registration).await.map_err(notify)?;
            println!("Registered {} ({}).", member.name, member.id);
        }
        Commands::SetStatus { id, status } => {
            session.require(Capability::ManageMembers)?;
            backend.set_member_status(id, status).await.map_err(notify)?;
            println!("Member {id} is now {status}.");
        }
        Commands::Today { date, days } => {
            session.require(Capability::ViewAnalytics)?;
            let mut state = load_program(backend, translator).await?;
            let last = date.unwrap_or(today);
            let period = Period::trailing(last, days).ok_or_else(|| {
                anyhow::anyhow!("--days {days} reaches before the earliest supported date")
            })?;
            state.reduce(ProgramAction::ComputeBar { period }, translator);
            if let Some(bar) = &state.bar {
                print!("{}", report::render_bar(bar));
            }
        }
        Commands::Overall { date } => {
            session.require(Capability::ViewAnalytics)?;
            let mut state = load_program(backend, translator).await?;
            state.reduce(
                ProgramAction::ComputePie {
                    today: date.unwrap_or(today),
                },
                translator,
            );
            if let Some(pie) = &state.pie {
                print!("{}", report::render_pie(pie));
            }
        }
        Commands::Report { date, out } => {
            session.require(Capability::ViewAnalytics)?;
            let day = date.unwrap_or(today);
            let mut state = load_program(backend, translator).await?;
            state.reduce(
                ProgramAction::ComputeBar {
                    period: Period::today(day),
                },
                translator,
            );
            state.reduce(ProgramAction::ComputePie { today: day }, translator);
            let bar = state.bar.clone().unwrap_or_default();
            let pie = state.pie.clone().unwrap_or_default();
            let report = report::build_report(day, &state.members, &bar, &pie);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Shifts { date, action } => {
            let day = date.unwrap_or(today);
            let mutation = match action {
                ShiftCommand::Show => None,
                ShiftCommand::Add {
                    slot,
                    kind,
                    employee,
                } => Some(ShiftMutation::AddEmployee {
                    slot,
                    kind,
                    employee_id: employee,
                }),
                ShiftCommand::Remove {
                    slot,
                    kind,
                    employee,
                } => Some(ShiftMutation::RemoveEmployee {
                    slot,
                    kind,
                    employee_id: employee,
                }),
                ShiftCommand::IncreaseHeadcount { slot, by } => {
                    Some(ShiftMutation::IncreaseHeadcount { slot, by })
                }
            };

            session.require(Capability::EditShifts)?;
            let mut view = shifts::ShiftSession::new(backend);
            let opened = view.open_day(day).await.map(|_| ());
            if let Err(err) = opened {
                return Err(shift_failed(&mut view, err));
            }
            if let Some(mutation) = mutation {
                if let Err(err) = view.apply(mutation).await {
                    return Err(shift_failed(&mut view, err));
                }
            }
            if let Some(shift_day) = &view.state().day {
                print!("{}", report::render_shift_day(shift_day));
            }
        }
    }

    Ok(())
}
