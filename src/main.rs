use anyhow::Result;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

pub mod cli;
pub mod sqlite;

use sqlite::db::SqliteDatabase;
use sqlite::statement::Statement;

/// Verbosity comes from two optional environment flags, falling back
/// to RUST_LOG. Logs go to stderr; stdout carries only command output.
fn log_filter() -> EnvFilter {
    if std::env::var_os("SQLITE_READER_TRACE").is_some() {
        EnvFilter::new("trace")
    } else if std::env::var_os("SQLITE_READER_DEBUG").is_some() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse()?;
    run(args)?;

    Ok(())
}

pub fn run(args: cli::Args) -> Result<()> {
    let mut db = SqliteDatabase::open(&args.file)?;

    match args.command {
        cli::Command::DbInfo => {
            let info = db.info()?;
            println!("database page size: {}", info.page_size());
            println!("number of tables: {}", info.num_tables());
        }
        cli::Command::Tables => {
            let tables = db.list_tables()?;
            println!("{}", tables.join(" "));
        }
        cli::Command::Sql(sql) => {
            let statement = Statement::parse(&sql)?;
            debug!(?statement, "parsed statement");
            let result = db.execute(&statement)?;
            print!("{result}");
        }
    }
    Ok(())
}
