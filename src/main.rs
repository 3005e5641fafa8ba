use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ilmspace::config::Config;
use ilmspace::infrastructure::AppState;
use ilmspace::services::payment_service;
use ilmspace::{db, seed, server};

#[derive(Parser)]
#[command(name = "ilmspace")]
#[command(author, version, about = "IlmSpace course marketplace API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations, seed gateway settings and start the HTTP server
    Serve {
        /// Overrides PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply the schema and exit
    Migrate,
    /// Create the student, author and admin test accounts
    CreateTestUsers,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let default_filter = if config.debug {
        "ilmspace=debug,tower_http=debug"
    } else {
        "ilmspace=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(Commands::Serve { port: None });
    match runtime.block_on(run(command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: Config) -> Result<(), String> {
    let conn = db::init_db(&config.database_url)
        .await
        .map_err(|e| format!("Failed to initialize database: {}", e))?;

    match command {
        Commands::Migrate => {
            tracing::info!("Migrations applied to {}", config.database_url);
        }
        Commands::CreateTestUsers => {
            let created = seed::create_test_users(&conn)
                .await
                .map_err(|e| format!("Failed to create test users: {}", e))?;
            tracing::info!("Created {} test user(s), password 'test123'", created);
        }
        Commands::Serve { port } => {
            payment_service::seed_gateways(&conn, &config)
                .await
                .map_err(|e| format!("Failed to seed gateway settings: {}", e))?;

            let port = port.unwrap_or(config.port);
            tracing::info!(
                workers = config.workers,
                timeout_secs = config.request_timeout.as_secs(),
                debug = config.debug,
                "starting IlmSpace"
            );
            let state = AppState::new(conn, config);
            server::serve(state, port)
                .await
                .map_err(|e| format!("Server error: {}", e))?;
        }
    }

    Ok(())
}
