use crate::cli::args::{Cli, Commands};
use log::{debug, error, info, warn};
use omnidb::model::{Condition, Config, QueryOptions};
use omnidb::{dialects, DriverError, OdbcDriver, OmniDb};
use serde::Serialize;

pub async fn handle(cli: Cli, config: Config) {
    debug!("Loaded configuration: {:?}", config);

    match cli.command {
        Commands::Dialect { dbms, driver } => {
            let dialect = dialects::detect_with_driver(&dbms, &driver);
            debug!("dbms='{}' driver='{}' -> {}", dbms, driver, dialect);
            print_json(&serde_json::json!({
                "dbms": dbms,
                "driver": driver,
                "dialect": dialect.name(),
            }));
        }

        Commands::Schemas { conn, catalog } => {
            let condition = Condition {
                catalog,
                ..Condition::default()
            };
            let mut db = open(conn, &config).await;
            let outcome = db.schemas(&condition).await;
            close(&mut db).await;
            emit("schemas", outcome);
        }

        Commands::CurrentSchema { conn } => {
            let mut db = open(conn, &config).await;
            let outcome = db.current_schema().await;
            close(&mut db).await;
            emit("current-schema", outcome);
        }

        Commands::Tables {
            conn,
            filter,
            table_type,
        } => {
            let condition = Condition {
                table_type,
                ..filter.condition()
            };
            let mut db = open(conn, &config).await;
            let outcome = db.tables(&condition).await;
            close(&mut db).await;
            emit("tables", outcome);
        }

        Commands::Columns {
            conn,
            filter,
            column,
        } => {
            let condition = Condition {
                column,
                ..filter.condition()
            };
            let mut db = open(conn, &config).await;
            let outcome = db.columns(&condition).await;
            close(&mut db).await;
            emit("columns", outcome);
        }

        Commands::PrimaryKeys { conn, filter } => {
            let mut db = open(conn, &config).await;
            let outcome = db.primary_keys(&filter.condition()).await;
            close(&mut db).await;
            emit("primary-keys", outcome);
        }

        Commands::Query {
            conn,
            sql,
            label,
            fetch,
        } => {
            let options = QueryOptions { label, fetch };
            let mut db = open(conn, &config).await;
            let outcome = db.query(&sql, &options).await;
            close(&mut db).await;
            emit("query", outcome);
        }

        Commands::Records { conn, sql } => {
            let mut db = open(conn, &config).await;
            let outcome = db.records(&sql).await;
            close(&mut db).await;
            emit("records", outcome);
        }

        Commands::Execute { conn, sql } => {
            let mut db = open(conn, &config).await;
            let outcome = db.execute(&sql).await;
            close(&mut db).await;
            emit("execute", outcome);
        }

        Commands::Config { output } => {
            info!("Running CONFIG command");
            debug!("Output path: {}", output);

            if let Err(e) = Config::generate_default_config(&output) {
                error!("Failed to generate configuration file: {}", e);
                std::process::exit(1);
            }
            info!("Generated default configuration file: {}", output);

            if let Some(env_name) = cli.env {
                let env_path = format!("config/{}.toml", env_name);
                match std::fs::create_dir_all("config") {
                    Ok(()) => match Config::generate_default_config(&env_path) {
                        Ok(()) => info!("Generated environment configuration file: {}", env_path),
                        Err(e) => error!("Failed to create environment config: {}", e),
                    },
                    Err(e) => error!("Failed to create config directory: {}", e),
                }
            }
        }
    }
}

/// Connect with `--conn`, falling back to the configured connection string.
async fn open(conn: Option<String>, config: &Config) -> OmniDb<OdbcDriver> {
    let final_conn = conn
        .or_else(|| config.database.connection_string.clone())
        .unwrap_or_else(|| {
            error!("No connection string provided via --conn flag or config file");
            std::process::exit(1);
        });

    let mut db = OmniDb::with_config(OdbcDriver::new(), config);
    match db.connect(&final_conn).await {
        Ok(true) => db,
        Ok(false) => {
            error!("Connection was not established");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    }
}

async fn close(db: &mut OmniDb<OdbcDriver>) {
    if let Err(e) = db.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
}

fn emit<T: Serialize>(command: &str, outcome: Result<T, DriverError>) {
    match outcome {
        Ok(value) => print_json(&value),
        Err(e) => {
            error!("{} command failed: {}", command, e);
            std::process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            std::process::exit(1);
        }
    }
}
