use crate::error::DriverError;
use crate::model::{
    Column, Condition, ExecResult, PrimaryKey, QueryOptions, QueryResult, Records, Table,
};
use async_trait::async_trait;

/// The generic call-level surface every engine is reached through.
///
/// Implementations report catalog data exactly as the driver returns it;
/// all engine-specific correction happens above this trait. One statement is
/// in flight at a time, so the futures are not required to be `Send`.
#[async_trait(?Send)]
pub trait DriverSurface {
    async fn connect(&mut self, connection_string: &str) -> Result<bool, DriverError>;

    async fn disconnect(&mut self) -> Result<bool, DriverError>;

    /// Product name of the connected DBMS, empty when disconnected.
    fn dbms(&self) -> String;

    /// Name of the driver in use, empty when disconnected.
    fn driver(&self) -> String;

    async fn raw_tables(&self, condition: &Condition) -> Result<Vec<Table>, DriverError>;

    async fn raw_columns(&self, condition: &Condition) -> Result<Vec<Column>, DriverError>;

    async fn raw_primary_keys(&self, condition: &Condition)
    -> Result<Vec<PrimaryKey>, DriverError>;

    async fn raw_query(&self, sql: &str, options: &QueryOptions)
    -> Result<QueryResult, DriverError>;

    async fn raw_execute(&self, sql: &str) -> Result<ExecResult, DriverError>;

    /// Run a statement and return all rows as text.
    ///
    /// Statements that produce no result set yield empty [`Records`].
    async fn raw_records(&self, sql: &str) -> Result<Records, DriverError>;
}
