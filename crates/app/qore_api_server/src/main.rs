//! QORE API server binary.
//!
//! `serve` (the default) runs migrations and starts the HTTP API,
//! `migrate` only runs migrations, and `create-employee` adds an account
//! from the command line.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use qore_api::AppState;
use qore_api::config::ApiConfig;
use qore_core::auth::password::hash_password;
use qore_core::models::{NewEmployee, NewRole};
use qore_core::store::{MemoryStore, PgStore, Store};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error>;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(
    name = "qore_api_server",
    about = "QORE employee auth API server",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// PostgreSQL connection URL. Defaults to `DB_*` parts or localhost.
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5, global = true)]
    max_connections: u32,

    #[command(subcommand)]
    command: Option<Command>,

    /// `serve` options, accepted without the subcommand name.
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run migrations and serve the HTTP API.
    Serve(ServeArgs),
    /// Run database migrations and exit.
    Migrate,
    /// Create an employee account.
    CreateEmployee(CreateEmployeeArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on. Overrides `PORT` / `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// Keep everything in process memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    memory: bool,

    /// Ensure a superadmin with this email exists at startup.
    #[arg(long, env = "QORE_ADMIN_EMAIL", requires = "admin_password")]
    admin_email: Option<String>,

    /// Password for `--admin-email`.
    #[arg(long, env = "QORE_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

#[derive(Args, Debug)]
struct CreateEmployeeArgs {
    /// Employee code, e.g. EMP001.
    #[arg(long)]
    employee_id: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    first_name: String,
    #[arg(long, default_value = "")]
    last_name: String,
    #[arg(long, env = "QORE_EMPLOYEE_PASSWORD", hide_env_values = true)]
    password: String,
    /// Grant superadmin rights.
    #[arg(long, default_value_t = false)]
    superadmin: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,qore_api=debug,qore_core=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ApiConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    match cli.command.unwrap_or(Command::Serve(cli.serve)) {
        Command::Serve(args) => serve(config, cli.max_connections, args).await,
        Command::Migrate => {
            let pool = connect(&config, cli.max_connections).await?;
            qore_api::migrate(&pool).await?;
            info!("migrations applied");
            Ok(())
        }
        Command::CreateEmployee(args) => {
            let pool = connect(&config, cli.max_connections).await?;
            qore_api::migrate(&pool).await?;
            create_employee(&PgStore::new(pool), &config, args).await
        }
    }
}

async fn connect(config: &ApiConfig, max_connections: u32) -> Result<PgPool, BoxError> {
    info!(max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

async fn serve(mut config: ApiConfig, max_connections: u32, args: ServeArgs) -> Result<(), BoxError> {
    if let Some(port) = args.port {
        config.bind_addr = format!("0.0.0.0:{port}");
    }
    info!(
        bind_addr = %config.bind_addr,
        environment = ?config.environment,
        memory = args.memory,
        "starting qore_api_server"
    );

    let store: Arc<dyn Store> = if args.memory {
        warn!("in-memory store: all data is lost on exit");
        let store = MemoryStore::new();
        seed_system_roles(&store).await?;
        Arc::new(store)
    } else {
        let pool = connect(&config, max_connections).await?;
        info!("running database migrations");
        qore_api::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    if let (Some(email), Some(password)) = (args.admin_email, args.admin_password) {
        ensure_admin(store.as_ref(), &config, &email, &password).await?;
    }

    let app = qore_api::router(AppState::new(store, config.clone()));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await?;
    Ok(())
}

/// The migration seeds these into PostgreSQL; the memory store starts empty.
async fn seed_system_roles(store: &dyn Store) -> Result<(), BoxError> {
    for (name, slug, description) in [
        ("Super Admin", "super-admin", "Full access to every module"),
        ("Employee", "employee", "Default role for every employee"),
    ] {
        store
            .insert_role(NewRole {
                name: name.into(),
                slug: slug.into(),
                description: Some(description.into()),
                is_system: true,
                is_active: true,
                created_by: None,
            })
            .await?;
    }
    Ok(())
}

async fn ensure_admin(
    store: &dyn Store,
    config: &ApiConfig,
    email: &str,
    password: &str,
) -> Result<(), BoxError> {
    if store.find_employee_by_email(email).await?.is_some() {
        info!(email, "admin account already present");
        return Ok(());
    }
    let args = CreateEmployeeArgs {
        employee_id: "ADMIN".into(),
        email: email.into(),
        first_name: "Admin".into(),
        last_name: String::new(),
        password: password.into(),
        superadmin: true,
    };
    create_employee(store, config, args).await
}

async fn create_employee(
    store: &dyn Store,
    config: &ApiConfig,
    args: CreateEmployeeArgs,
) -> Result<(), BoxError> {
    let employee = store
        .insert_employee(NewEmployee {
            employee_id: args.employee_id,
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            password_hash: hash_password(&args.password, config.bcrypt_cost)?,
            phone: None,
            branch_id: None,
            department_id: None,
            designation_id: None,
            reporting_to: None,
            is_active: true,
            is_superadmin: args.superadmin,
            created_by: None,
        })
        .await?;
    info!(
        id = employee.id,
        employee_id = %employee.employee_id,
        superadmin = employee.is_superadmin,
        "employee created"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_flags_work_without_subcommand() {
        let cli = Cli::try_parse_from([
            "qore_api_server",
            "--port",
            "9000",
            "--admin-email",
            "admin@qore.test",
            "--admin-password",
            "secret123",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.serve.port, Some(9000));
        assert_eq!(cli.serve.admin_email.as_deref(), Some("admin@qore.test"));
        assert_eq!(cli.serve.admin_password.as_deref(), Some("secret123"));
    }

    #[test]
    fn explicit_subcommand_still_parses() {
        let cli = Cli::try_parse_from(["qore_api_server", "serve", "--memory"]).unwrap();
        match cli.command {
            Some(Command::Serve(args)) => assert!(args.memory),
            other => panic!("expected serve, got {other:?}"),
        }

        let cli = Cli::try_parse_from(["qore_api_server", "migrate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }
}
