//! Operator tooling: migrations, account maintenance, reference data and
//! reports against the configured database.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use ait_backend::domain::assessment::{
    ContentImportError, ReportContentImport, parse_overall_items_csv, parse_phase_items_csv,
    parse_progress_items_csv, parse_scoring_csv,
};
use ait_backend::domain::auth::Registration;
use ait_backend::domain::ports::{Accounts, Assessments, Pricing, Visits};
use ait_backend::domain::{
    AccountService, AssessmentService, EmailAddress, PricingService, Role, VisitService,
};
use ait_backend::outbound::persistence::{
    DbPool, DieselAssessmentRepository, DieselPricingRepository, DieselSubjectRepository,
    DieselUserRepository, DieselVisitRepository, PoolConfig, run_migrations,
};
use ait_backend::settings::ServerSettings;

/// `ait-admin` command line.
#[derive(Debug, Parser)]
#[command(
    name = "ait-admin",
    about = "Maintenance commands for the AIT platform",
    version
)]
struct Cli {
    /// Database URL. Falls back to `AIT_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Create an account with any role.
    UserCreate {
        email: String,
        password: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// Replace the password of an existing account.
    UserResetPassword { email: String, password: String },
    /// Upsert the reference country currency table.
    SeedCurrencies,
    /// Print the visit report for a UTC day, today by default.
    VisitorsReport {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Replace the loss assessment scoring table from a CSV file.
    ImportScoring {
        #[arg(value_name = "csv")]
        path: PathBuf,
    },
    /// Replace report copy tables from CSV files. Tables without a file are kept.
    ImportReportContent {
        /// `phase,ordinal,body,active`
        #[arg(long, value_name = "csv")]
        phase_items: Option<PathBuf>,
        /// `phase,band,tone,ordinal,body,active`
        #[arg(long, value_name = "csv")]
        progress_items: Option<PathBuf>,
        /// `band,kind,label,body,key_need,ordinal,active`
        #[arg(long, value_name = "csv")]
        overall_items: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .compact()
        .with_writer(io::stderr)
        .try_init()
    {
        return Err(eyre!("tracing init failed: {error}"));
    }

    let cli = Cli::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build admin runtime")?;
    runtime.block_on(run(cli))
}

fn resolve_database_url(flag: Option<String>) -> Result<String> {
    if let Some(url) = flag.filter(|url| !url.trim().is_empty()) {
        return Ok(url);
    }
    let settings = ServerSettings::load_from_iter([OsString::from("ait-admin")])
        .wrap_err("failed to load server settings")?;
    settings
        .database_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| eyre!("no database configured; pass --database-url or set AIT_DATABASE_URL"))
}

async fn run(cli: Cli) -> Result<()> {
    let database_url = resolve_database_url(cli.database_url)?;
    if let Command::Migrate = cli.command {
        return migrate(&database_url).await;
    }
    let pool = DbPool::new(PoolConfig::new(&database_url))
        .await
        .wrap_err("failed to create database pool")?;
    dispatch(&pool, cli.command).await
}

async fn migrate(database_url: &str) -> Result<()> {
    let applied = run_migrations(database_url)
        .await
        .wrap_err("migrations failed")?;
    info!(count = applied.len(), "migrations applied");
    for version in applied {
        out(&format!("applied {version}"))?;
    }
    Ok(())
}

async fn dispatch(pool: &DbPool, command: Command) -> Result<()> {
    match command {
        Command::Migrate => Err(eyre!("migrate does not use the pool")),
        Command::UserCreate {
            email,
            password,
            name,
            role,
        } => create_user(pool, &email, &password, name.as_deref(), &role).await,
        Command::UserResetPassword { email, password } => {
            reset_password(pool, &email, &password).await
        }
        Command::SeedCurrencies => seed_currencies(pool).await,
        Command::VisitorsReport { date } => visitors_report(pool, date).await,
        Command::ImportScoring { path } => import_scoring(pool, &path).await,
        Command::ImportReportContent {
            phase_items,
            progress_items,
            overall_items,
        } => {
            let content = ReportContentImport {
                phase_items: read_copy(phase_items.as_deref(), parse_phase_items_csv)?,
                progress_items: read_copy(progress_items.as_deref(), parse_progress_items_csv)?,
                overall_items: read_copy(overall_items.as_deref(), parse_overall_items_csv)?,
            };
            import_report_content(pool, content).await
        }
    }
}

fn accounts(pool: &DbPool) -> AccountService<DieselUserRepository> {
    AccountService::new(
        Arc::new(DieselUserRepository::new(pool.clone())),
        Vec::new(),
    )
}

async fn create_user(
    pool: &DbPool,
    email: &str,
    password: &str,
    name: Option<&str>,
    role: &str,
) -> Result<()> {
    let role = Role::normalise(role);
    let registration = Registration::try_from_parts(email, password, name, None)
        .wrap_err("invalid account details")?;
    let user = accounts(pool)
        .create_user(registration, role)
        .await
        .wrap_err("failed to create user")?;
    info!(user_id = %user.id, "user created");
    out(&format!("created {} ({})", user.email.as_ref(), role.as_str()))
}

async fn reset_password(pool: &DbPool, email: &str, password: &str) -> Result<()> {
    let email = EmailAddress::parse(email).wrap_err("invalid email")?;
    let user = accounts(pool)
        .reset_password(&email, password)
        .await
        .wrap_err("failed to reset password")?;
    info!(user_id = %user.id, "password reset");
    out(&format!("password updated for {}", user.email.as_ref()))
}

async fn seed_currencies(pool: &DbPool) -> Result<()> {
    let pricing = PricingService::new(
        Arc::new(DieselPricingRepository::new(pool.clone())),
        Arc::new(DieselSubjectRepository::new(pool.clone())),
        Arc::new(DefaultClock),
    );
    let count = pricing
        .seed_currencies()
        .await
        .wrap_err("failed to seed currencies")?;
    out(&format!("seeded {count} currencies"))
}

async fn visitors_report(pool: &DbPool, date: Option<NaiveDate>) -> Result<()> {
    let visits = VisitService::new(Arc::new(DieselVisitRepository::new(pool.clone())));
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let report = visits
        .daily_report(date)
        .await
        .wrap_err("failed to build visit report")?;
    out(&report.render_text())
}

async fn import_scoring(pool: &DbPool, path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let rows = parse_scoring_csv(file)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let assessments = AssessmentService::new(
        Arc::new(DieselAssessmentRepository::new(pool.clone())),
        Arc::new(DefaultClock),
    );
    let count = assessments
        .import_scoring_map(rows)
        .await
        .wrap_err("failed to import scoring map")?;
    out(&format!("imported {count} scoring rows"))
}

fn read_copy<T>(
    path: Option<&Path>,
    parse: fn(File) -> Result<Vec<T>, ContentImportError>,
) -> Result<Option<Vec<T>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let items = parse(file).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(items))
}

async fn import_report_content(pool: &DbPool, content: ReportContentImport) -> Result<()> {
    if content.is_empty() {
        return Err(eyre!(
            "pass at least one of --phase-items, --progress-items or --overall-items"
        ));
    }
    let assessments = AssessmentService::new(
        Arc::new(DieselAssessmentRepository::new(pool.clone())),
        Arc::new(DefaultClock),
    );
    let count = assessments
        .import_report_content(content)
        .await
        .wrap_err("failed to import report copy")?;
    out(&format!("imported {count} report copy rows"))
}

fn out(line: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}").wrap_err("failed to write output")
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    fn parses_user_create_with_role() {
        let cli = Cli::try_parse_from([
            "ait-admin",
            "user-create",
            "tutor@ait.example",
            "correct-horse",
            "--name",
            "Tutor",
            "--role",
            "tutor",
        ])
        .expect("valid arguments");
        let Command::UserCreate { email, role, name, .. } = cli.command else {
            panic!("expected user-create");
        };
        assert_eq!(email, "tutor@ait.example");
        assert_eq!(role, "tutor");
        assert_eq!(name.as_deref(), Some("Tutor"));
    }

    #[rstest]
    fn visitors_report_parses_dates() {
        let cli = Cli::try_parse_from(["ait-admin", "visitors-report", "--date", "2024-03-01"])
            .expect("valid arguments");
        let Command::VisitorsReport { date } = cli.command else {
            panic!("expected visitors-report");
        };
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[rstest]
    fn rejects_malformed_dates() {
        let result = Cli::try_parse_from(["ait-admin", "visitors-report", "--date", "03/01/2024"]);
        assert!(result.is_err());
    }

    #[rstest]
    fn database_flag_wins_over_settings() {
        let url = resolve_database_url(Some("postgres://ait@db/ait".to_owned()))
            .expect("flag accepted");
        assert_eq!(url, "postgres://ait@db/ait");
    }

    #[rstest]
    fn report_content_import_takes_optional_files() {
        let cli = Cli::try_parse_from([
            "ait-admin",
            "import-report-content",
            "--phase-items",
            "phase_items.csv",
            "--overall-items",
            "overall_items.csv",
        ])
        .expect("valid arguments");
        let Command::ImportReportContent {
            phase_items,
            progress_items,
            overall_items,
        } = cli.command
        else {
            panic!("expected import-report-content");
        };
        assert_eq!(phase_items, Some(PathBuf::from("phase_items.csv")));
        assert_eq!(progress_items, None);
        assert_eq!(overall_items, Some(PathBuf::from("overall_items.csv")));
    }

    #[rstest]
    fn missing_copy_files_are_left_alone() {
        let items = read_copy(None, parse_phase_items_csv).expect("nothing to read");
        assert!(items.is_none());
    }
}
