//! In-memory [`DriverSurface`] with canned answers, for tests.

use crate::error::DriverError;
use crate::executor::driver::DriverSurface;
use crate::model::{
    Column, Condition, ConnectionIdentity, ExecResult, PrimaryKey, QueryOptions, QueryResult,
    Records, Table,
};
use async_trait::async_trait;
use std::cell::RefCell;

type Response = Result<Records, String>;

/// Driver that replays scripted results and records what it was asked.
///
/// Catalog calls return the configured rows unchanged. `raw_records`
/// answers with the first scripted response whose needle occurs in the
/// statement, and with empty records when none does. Every statement sent
/// through `raw_records` or `raw_execute` is logged.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    identity: ConnectionIdentity,
    connected: bool,
    tables: Vec<Table>,
    columns: Vec<Column>,
    primary_keys: Vec<PrimaryKey>,
    query_result: QueryResult,
    responses: Vec<(String, Response)>,
    issued: RefCell<Vec<String>>,
    conditions: RefCell<Vec<Condition>>,
}

impl ScriptedDriver {
    pub fn new(dbms: &str, driver: &str) -> Self {
        Self {
            identity: ConnectionIdentity {
                dbms: dbms.to_string(),
                driver: driver.to_string(),
            },
            ..Self::default()
        }
    }

    pub fn with_tables(mut self, tables: Vec<Table>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_primary_keys(mut self, keys: Vec<PrimaryKey>) -> Self {
        self.primary_keys = keys;
        self
    }

    pub fn with_query_result(mut self, result: QueryResult) -> Self {
        self.query_result = result;
        self
    }

    /// Answer statements containing `needle` with `records`.
    pub fn respond(mut self, needle: &str, records: Records) -> Self {
        self.responses.push((needle.to_string(), Ok(records)));
        self
    }

    /// Fail statements containing `needle`.
    pub fn fail(mut self, needle: &str, message: &str) -> Self {
        self.responses
            .push((needle.to_string(), Err(message.to_string())));
        self
    }

    /// Start out connected, as if `connect` had already succeeded.
    pub fn connected(mut self) -> Self {
        self.connected = true;
        self
    }

    /// Every statement issued so far, in order.
    pub fn issued(&self) -> Vec<String> {
        self.issued.borrow().clone()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.issued
            .borrow()
            .iter()
            .filter(|sql| sql.contains(needle))
            .count()
    }

    /// Conditions received by the catalog calls, in order.
    pub fn conditions(&self) -> Vec<Condition> {
        self.conditions.borrow().clone()
    }

    fn ensure_connected(&self) -> Result<(), DriverError> {
        if self.connected {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }
}

#[async_trait(?Send)]
impl DriverSurface for ScriptedDriver {
    async fn connect(&mut self, _connection_string: &str) -> Result<bool, DriverError> {
        self.connected = true;
        Ok(true)
    }

    async fn disconnect(&mut self) -> Result<bool, DriverError> {
        let was_connected = self.connected;
        self.connected = false;
        Ok(was_connected)
    }

    fn dbms(&self) -> String {
        if self.connected {
            self.identity.dbms.clone()
        } else {
            String::new()
        }
    }

    fn driver(&self) -> String {
        if self.connected {
            self.identity.driver.clone()
        } else {
            String::new()
        }
    }

    async fn raw_tables(&self, condition: &Condition) -> Result<Vec<Table>, DriverError> {
        self.ensure_connected()?;
        self.conditions.borrow_mut().push(condition.clone());
        Ok(self.tables.clone())
    }

    async fn raw_columns(&self, condition: &Condition) -> Result<Vec<Column>, DriverError> {
        self.ensure_connected()?;
        self.conditions.borrow_mut().push(condition.clone());
        Ok(self.columns.clone())
    }

    async fn raw_primary_keys(
        &self,
        condition: &Condition,
    ) -> Result<Vec<PrimaryKey>, DriverError> {
        self.ensure_connected()?;
        self.conditions.borrow_mut().push(condition.clone());
        Ok(self.primary_keys.clone())
    }

    async fn raw_query(
        &self,
        _sql: &str,
        _options: &QueryOptions,
    ) -> Result<QueryResult, DriverError> {
        self.ensure_connected()?;
        Ok(self.query_result.clone())
    }

    async fn raw_execute(&self, sql: &str) -> Result<ExecResult, DriverError> {
        self.ensure_connected()?;
        self.issued.borrow_mut().push(sql.to_string());
        Ok(ExecResult { success: true })
    }

    async fn raw_records(&self, sql: &str) -> Result<Records, DriverError> {
        self.ensure_connected()?;
        self.issued.borrow_mut().push(sql.to_string());
        match self.responses.iter().find(|(needle, _)| sql.contains(needle.as_str())) {
            Some((_, Ok(records))) => Ok(records.clone()),
            Some((_, Err(message))) => Err(DriverError::QueryFailed(message.clone())),
            None => Ok(Records::default()),
        }
    }
}

/// Build text rows from string slices; `None` is SQL NULL.
pub fn rows(data: &[&[Option<&str>]]) -> Vec<Vec<Option<String>>> {
    data.iter()
        .map(|row| row.iter().map(|v| v.map(str::to_string)).collect())
        .collect()
}
