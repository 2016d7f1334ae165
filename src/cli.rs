use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

/// Available commands for the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    DbInfo,
    Tables,
    /// Any command starting with SELECT, handed to the SQL parser.
    Sql(String),
}

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ".dbinfo" => Ok(Command::DbInfo),
            ".tables" => Ok(Command::Tables),
            sql if sql
                .get(..6)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select")) =>
            {
                Ok(Command::Sql(sql.to_string()))
            }
            other => Err(format!("Unknown command: {other}")),
        }
    }
}

/// Command line arguments: `<database-file> <command>`.
#[derive(Debug)]
pub struct Args {
    pub file: PathBuf,
    pub command: Command,
}

impl Args {
    pub fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().skip(1).collect();
        let [file, command] = args.as_slice() else {
            bail!("usage: <database-file> <command>");
        };

        let command = command
            .parse::<Command>()
            .map_err(|e| anyhow::anyhow!(e))?;

        Ok(Args {
            file: PathBuf::from(file),
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_commands_parse() {
        assert_eq!(".dbinfo".parse::<Command>(), Ok(Command::DbInfo));
        assert_eq!(".tables".parse::<Command>(), Ok(Command::Tables));
    }

    #[test]
    fn select_is_matched_case_insensitively() {
        assert_eq!(
            "select * from t".parse::<Command>(),
            Ok(Command::Sql("select * from t".into()))
        );
        assert_eq!(
            "SELECT count(*) FROM t".parse::<Command>(),
            Ok(Command::Sql("SELECT count(*) FROM t".into()))
        );
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(".exit".parse::<Command>().is_err());
        assert!("DROP TABLE t".parse::<Command>().is_err());
    }
}
