//! Dialect detection and per-engine metadata resolvers.
//!
//! A [`Dialect`] is derived from the DBMS product name reported by the live
//! connection. Each dialect with known catalog quirks has a
//! [`MetadataResolver`] in the registry; everything else is passed through.

pub mod base;
pub mod registry;

pub mod as400;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;

pub use base::{EnrichmentError, MetadataResolver, ResolveContext};
pub use registry::get_registry;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Generic,
    As400,
    MySqlFamily,
    Postgres,
    MsSql,
    /// SQL Server reached through the FreeTDS driver.
    MsSqlFreeTds,
    Oracle,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Generic => "Generic",
            Dialect::As400 => "AS400",
            Dialect::MySqlFamily => "MySQLFamily",
            Dialect::Postgres => "Postgres",
            Dialect::MsSql => "MSSQL",
            Dialect::MsSqlFreeTds => "MSSQLFreeTDS",
            Dialect::Oracle => "Oracle",
        }
    }

    /// Whether string literals for this engine need backslash escaping.
    ///
    /// Only the MySQL family treats `\` as an escape character in literals
    /// by default.
    pub fn backslash_escapes(&self) -> bool {
        matches!(self, Dialect::MySqlFamily)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static DBMS_PATTERNS: OnceLock<Vec<(Regex, Dialect)>> = OnceLock::new();
static FREETDS_PATTERN: OnceLock<Regex> = OnceLock::new();

fn dbms_patterns() -> &'static [(Regex, Dialect)] {
    DBMS_PATTERNS.get_or_init(|| {
        [
            (r"(?i)^DB2/400", Dialect::As400),
            (r"(?i)^(MySQL|MariaDB)", Dialect::MySqlFamily),
            (r"(?i)^PostgreSQL", Dialect::Postgres),
            (r"(?i)^Microsoft SQL Server", Dialect::MsSql),
            (r"(?i)^Oracle", Dialect::Oracle),
        ]
        .into_iter()
        .map(|(pattern, dialect)| (Regex::new(pattern).expect("valid dialect pattern"), dialect))
        .collect()
    })
}

/// Map a DBMS product name to its dialect. First match wins.
pub fn detect(dbms: &str) -> Dialect {
    dbms_patterns()
        .iter()
        .find(|(re, _)| re.is_match(dbms.trim_start()))
        .map(|(_, dialect)| *dialect)
        .unwrap_or(Dialect::Generic)
}

/// True for the FreeTDS ODBC driver, given as a library name or a path to it.
pub fn is_freetds_driver(driver: &str) -> bool {
    let re = FREETDS_PATTERN
        .get_or_init(|| Regex::new(r"(?i)^(libtdsodbc|freetds)").expect("valid driver pattern"));
    let file_name = driver.rsplit(['/', '\\']).next().unwrap_or(driver);
    re.is_match(file_name.trim())
}

/// [`detect`], refined by the driver name where it matters.
pub fn detect_with_driver(dbms: &str, driver: &str) -> Dialect {
    match detect(dbms) {
        Dialect::MsSql if is_freetds_driver(driver) => Dialect::MsSqlFreeTds,
        dialect => dialect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_products() {
        assert_eq!(detect("DB2/400 SQL"), Dialect::As400);
        assert_eq!(detect("MySQL"), Dialect::MySqlFamily);
        assert_eq!(detect("MariaDB"), Dialect::MySqlFamily);
        assert_eq!(detect("PostgreSQL"), Dialect::Postgres);
        assert_eq!(detect("Microsoft SQL Server"), Dialect::MsSql);
        assert_eq!(detect("Oracle"), Dialect::Oracle);
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(detect("mysql 8.0"), detect("MySQL 8.0"));
        assert_eq!(detect("postgresql"), Dialect::Postgres);
        assert_eq!(detect("ORACLE"), Dialect::Oracle);
    }

    #[test]
    fn test_detect_is_prefix_match() {
        assert_eq!(detect("SQLite"), Dialect::Generic);
        assert_eq!(detect("Amazon Aurora MySQL"), Dialect::Generic);
        assert_eq!(detect(""), Dialect::Generic);
    }

    #[test]
    fn test_freetds_driver() {
        assert!(is_freetds_driver("libtdsodbc.so"));
        assert!(is_freetds_driver("/usr/lib/x86_64-linux-gnu/odbc/libtdsodbc.so"));
        assert!(is_freetds_driver("FreeTDS"));
        assert!(!is_freetds_driver("msodbcsql18.dll"));
        assert!(!is_freetds_driver("ODBC Driver 18 for SQL Server"));
        assert!(!is_freetds_driver(""));
    }

    #[test]
    fn test_detect_with_driver() {
        assert_eq!(
            detect_with_driver("Microsoft SQL Server", "libtdsodbc.so"),
            Dialect::MsSqlFreeTds
        );
        assert_eq!(
            detect_with_driver("Microsoft SQL Server", "msodbcsql18"),
            Dialect::MsSql
        );
        // The driver only refines SQL Server
        assert_eq!(detect_with_driver("PostgreSQL", "libtdsodbc.so"), Dialect::Postgres);
    }

    #[test]
    fn test_backslash_escapes() {
        assert!(Dialect::MySqlFamily.backslash_escapes());
        assert!(!Dialect::Postgres.backslash_escapes());
        assert!(!Dialect::Oracle.backslash_escapes());
    }
}
