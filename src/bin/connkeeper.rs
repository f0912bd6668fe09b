use clap::Parser;
use connkeeper::{ConnectionRegistry, Params, QueryOutput, ReturnMode, SqliteDriver, Statement, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Run one query against a named connection from a connection definition file.
#[derive(Parser, Debug)]
#[command(name = "connkeeper", version, about)]
struct Args {
    /// Connection definition file or directory (.ini, .toml, .json).
    /// Defaults to the `connkeeper` directory under the user config dir.
    #[arg(short, long, env = "CONNKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Skip config files with unsupported extensions instead of failing
    #[arg(long)]
    lenient: bool,

    /// Directory relative SQLite database paths resolve against
    #[arg(long, env = "CONNKEEPER_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Print the registered connection identifiers and exit
    #[arg(long)]
    list: bool,

    /// Connection identifier
    connection: Option<String>,

    /// SQL text
    sql: Option<String>,

    /// Positional parameter, repeatable. Integers, reals and `null` are typed.
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Named parameter as key=value, repeatable
    #[arg(short, long = "named", value_parser = parse_named, conflicts_with = "params")]
    named: Vec<(String, String)>,

    /// How to shape the result
    #[arg(short, long, default_value_t = ReturnMode::Statement)]
    mode: ReturnMode,
}

fn parse_named(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn parse_literal(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Real(f)
    } else {
        Value::Text(raw.to_string())
    }
}

fn build_params(args: &Args) -> Params {
    if !args.named.is_empty() {
        Params::named(args.named.iter().map(|(k, v)| (k.clone(), parse_literal(v))))
    } else if !args.params.is_empty() {
        Params::positional(args.params.iter().map(|p| parse_literal(p)))
    } else {
        Params::None
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match args.config.clone() {
        Some(path) => path,
        None => dirs::config_dir()
            .map(|dir| dir.join("connkeeper"))
            .ok_or("no --config given and no user config directory available")?,
    };

    let driver = match &args.base_dir {
        Some(dir) => SqliteDriver::with_base_dir(dir),
        None => SqliteDriver::new(),
    };
    let registry = ConnectionRegistry::from_config_path(driver, &config, !args.lenient)?;
    debug!(config = %config.display(), connections = registry.len(), "loaded registry");

    if args.list {
        for id in registry.identifiers() {
            println!("{}", id);
        }
        return Ok(());
    }

    let connection = args.connection.as_deref().ok_or("missing connection identifier")?;
    let sql = args.sql.as_deref().ok_or("missing SQL text")?;
    info!(connection, mode = %args.mode, "running query");

    match registry.query(connection, sql, build_params(&args), args.mode)? {
        QueryOutput::Statement(mut stmt) => {
            let rows = stmt.fetch_all()?;
            stmt.close_cursor();
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        QueryOutput::InsertId(id) => println!("{}", id),
        QueryOutput::RowCount(count) => println!("{}", count),
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
