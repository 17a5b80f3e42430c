pub mod config;
pub mod metadata;
pub mod sql_type;

pub use config::{Config, ConfigError};
pub use metadata::{
    Column, Condition, ConnectionIdentity, ExecResult, PrimaryKey, QueryColumn, QueryOptions,
    QueryParam, QueryResult, Records, Schema, Table,
};
