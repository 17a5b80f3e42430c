use crate::error::DriverError;
use crate::executor::driver::DriverSurface;
use crate::executor::raw;
use crate::model::sql_type;
use crate::model::{
    Column, Condition, ConnectionIdentity, ExecResult, PrimaryKey, QueryColumn, QueryOptions,
    QueryParam, QueryResult, Records, Table,
};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use odbc_api::{
    buffers::{Indicator, TextRowSet},
    handles::AsStatementRef,
    sys::Desc,
    Connection, ConnectionOptions, Cursor, DataType, Environment, Nullability, ResultSetMetadata,
};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Process-wide ODBC environment; connections borrow it for `'static`.
static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

const FETCH_BATCH_ROWS: usize = 100;
const MAX_TEXT_LEN: usize = 4096;
/// Reported for parameters when the driver cannot describe them.
const UNDESCRIBED_PARAM_SIZE: u64 = 8000;

fn environment() -> Result<&'static Environment, DriverError> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new()?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

/// [`DriverSurface`] over a single ODBC connection.
pub struct OdbcDriver {
    connection: Option<Connection<'static>>,
    identity: ConnectionIdentity,
}

impl OdbcDriver {
    pub fn new() -> Self {
        Self {
            connection: None,
            identity: ConnectionIdentity::default(),
        }
    }

    fn connection(&self) -> Result<&Connection<'static>, DriverError> {
        self.connection.as_ref().ok_or(DriverError::NotConnected)
    }

    /// Catalog calls need a concrete catalog; omitted means the current one.
    fn catalog_or_current(&self, catalog: &Option<String>) -> Result<String, DriverError> {
        match catalog {
            Some(c) => Ok(c.clone()),
            None => Ok(self.connection()?.current_catalog().unwrap_or_default()),
        }
    }
}

impl Default for OdbcDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl DriverSurface for OdbcDriver {
    async fn connect(&mut self, connection_string: &str) -> Result<bool, DriverError> {
        debug!(
            "Connecting to database with connection string length: {}",
            connection_string.len()
        );
        if self.connection.is_some() {
            self.disconnect().await?;
        }

        let env = environment()?;
        let connection = env
            .connect_with_connection_string(connection_string, ConnectionOptions::default())
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                DriverError::ConnectionFailed(e.to_string())
            })?;

        let dbms = connection
            .database_management_system_name()
            .map_err(|e| DriverError::ConnectionFailed(e.to_string()))?;
        let driver = resolve_driver_name(env, connection_string);

        info!("Connected to {} via driver '{}'", dbms, driver);
        self.identity = ConnectionIdentity { dbms, driver };
        self.connection = Some(connection);
        Ok(true)
    }

    async fn disconnect(&mut self) -> Result<bool, DriverError> {
        self.identity = ConnectionIdentity::default();
        match self.connection.take() {
            Some(connection) => {
                // Dropping the handle disconnects.
                drop(connection);
                debug!("Disconnected");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn dbms(&self) -> String {
        self.identity.dbms.clone()
    }

    fn driver(&self) -> String {
        self.identity.driver.clone()
    }

    async fn raw_tables(&self, condition: &Condition) -> Result<Vec<Table>, DriverError> {
        let condition = condition.normalized();
        let catalog = self.catalog_or_current(&condition.catalog)?;
        let schema = condition.schema.as_deref().unwrap_or("%");
        let table = condition.table.as_deref().unwrap_or("%");
        let table_type = condition.table_type.as_deref().unwrap_or("TABLE");
        debug!("SQLTables({}, {}, {}, {})", catalog, schema, table, table_type);

        let cursor = self
            .connection()?
            .tables(&catalog, schema, table, table_type)
            .map_err(|e| DriverError::QueryFailed(e.to_string()))?;
        let (_, rows) = fetch_text_rows(cursor)?;

        Ok(rows
            .iter()
            .map(|row| Table {
                catalog: text(row, 0),
                schema: text(row, 1),
                name: text(row, 2),
                table_type: text(row, 3),
                remarks: text(row, 4).trim().to_string(),
            })
            .collect())
    }

    async fn raw_columns(&self, condition: &Condition) -> Result<Vec<Column>, DriverError> {
        let condition = condition.normalized();
        let catalog = self.catalog_or_current(&condition.catalog)?;
        let schema = condition.schema.as_deref().unwrap_or("%");
        let table = condition.table.as_deref().unwrap_or("%");
        let column = condition.column.as_deref().unwrap_or("%");
        debug!("SQLColumns({}, {}, {}, {})", catalog, schema, table, column);

        let cursor = self
            .connection()?
            .columns(&catalog, schema, table, column)
            .map_err(|e| DriverError::QueryFailed(e.to_string()))?;
        let (_, rows) = fetch_text_rows(cursor)?;

        Ok(rows
            .iter()
            .map(|row| {
                let code = parse_i16(row, 4);
                Column {
                    catalog: text(row, 0),
                    schema: text(row, 1),
                    table: text(row, 2),
                    name: text(row, 3),
                    type_name: sql_type::type_name(code).to_string(),
                    type_class: sql_type::type_class(code).to_string(),
                    size: parse_size(row, 6),
                    decimal_digits: parse_i16(row, 8),
                    num_prec: parse_i16(row, 9),
                    nullable: parse_i16(row, 10) == 1,
                    remarks: text(row, 11).trim().to_string(),
                    default: text(row, 12),
                }
            })
            .collect())
    }

    async fn raw_primary_keys(
        &self,
        condition: &Condition,
    ) -> Result<Vec<PrimaryKey>, DriverError> {
        let condition = condition.normalized();
        let table = condition.table.as_deref().ok_or_else(|| {
            DriverError::QueryFailed("primary keys require a table name".to_string())
        })?;
        let catalog = self.catalog_or_current(&condition.catalog)?;
        debug!("SQLPrimaryKeys({}, {:?}, {})", catalog, condition.schema, table);

        let statement = self
            .connection()?
            .preallocate()
            .map_err(|e| DriverError::QueryFailed(e.to_string()))?;
        let schema = condition.schema.as_deref();
        let cursor = raw::primary_keys(statement, Some(catalog.as_str()), schema, table)
            .map_err(|e| DriverError::QueryFailed(e.to_string()))?;
        let (_, rows) = fetch_text_rows(cursor)?;

        Ok(rows
            .iter()
            .map(|row| PrimaryKey {
                catalog: text(row, 0),
                schema: text(row, 1),
                table: text(row, 2),
                column: text(row, 3),
                seq: parse_i16(row, 4),
                primary_key: text(row, 5),
            })
            .collect())
    }

    async fn raw_query(
        &self,
        sql: &str,
        options: &QueryOptions,
    ) -> Result<QueryResult, DriverError> {
        debug!("Describing statement: {}", sql);
        let mut prepared = self
            .connection()?
            .prepare(sql)
            .map_err(|e| DriverError::QueryFailed(e.to_string()))?;

        let num_cols = prepared.num_result_cols()?.max(0) as u16;
        let mut columns = Vec::with_capacity(num_cols as usize);
        for number in 1..=num_cols {
            let name = prepared.col_name(number)?;
            let data_type = prepared.col_data_type(number)?;
            let nullable = matches!(prepared.col_nullability(number)?, Nullability::Nullable);
            let (code, size, decimal_digits) = describe_data_type(&data_type);

            let stmt = prepared.as_stmt_ref();
            // Drivers without lineage support report nothing for these.
            let attribute = |desc: Desc| {
                raw::string_col_attribute(&stmt, desc, number).unwrap_or_else(|e| {
                    debug!("Column {} attribute {:?} unavailable: {}", number, desc, e);
                    String::new()
                })
            };
            columns.push(QueryColumn {
                label: options.label.then(|| attribute(Desc::Label)),
                catalog: attribute(Desc::CatalogName),
                schema: attribute(Desc::SchemaName),
                table: attribute(Desc::BaseTableName),
                column: attribute(Desc::BaseColumnName),
                auto_increment: raw::auto_unique_value(&stmt, number),
                name,
                type_name: sql_type::type_name(code).to_string(),
                type_class: sql_type::type_class(code).to_string(),
                nullable,
                size,
                decimal_digits,
                ..QueryColumn::default()
            });
        }

        let num_params = prepared.num_params()?;
        let mut params = Vec::with_capacity(num_params as usize);
        for number in 1..=num_params {
            let param = match prepared.describe_param(number) {
                Ok(description) => {
                    let (code, size, decimal_digits) = describe_data_type(&description.data_type);
                    QueryParam {
                        type_name: sql_type::type_name(code).to_string(),
                        type_class: sql_type::type_class(code).to_string(),
                        size,
                        decimal_digits,
                        nullable: matches!(description.nullability, Nullability::Nullable),
                    }
                }
                Err(e) => {
                    debug!("SQLDescribeParam unavailable ({}), assuming VARCHAR", e);
                    QueryParam {
                        type_name: sql_type::SQL_VARCHAR.to_string(),
                        type_class: sql_type::CLASS_STRING.to_string(),
                        size: UNDESCRIBED_PARAM_SIZE,
                        decimal_digits: 0,
                        nullable: false,
                    }
                }
            };
            params.push(param);
        }

        let mut records = Vec::new();
        if options.fetch {
            let cursor = prepared
                .execute(())
                .map_err(|e| DriverError::QueryFailed(e.to_string()))?;
            if let Some(cursor) = cursor {
                records = fetch_text_rows(cursor)?.1;
            }
        }

        Ok(QueryResult {
            columns,
            params,
            records,
        })
    }

    async fn raw_execute(&self, sql: &str) -> Result<ExecResult, DriverError> {
        debug!("Executing SQL statement: {}", sql);
        let mut prepared = self
            .connection()?
            .prepare(sql)
            .map_err(|e| DriverError::QueryFailed(e.to_string()))?;

        match prepared.execute(()) {
            Ok(Some(cursor)) => {
                fetch_text_rows(cursor)?;
                debug!("Statement executed successfully with results");
            }
            Ok(None) => {
                debug!("Statement executed successfully (no results)");
            }
            Err(e) => {
                error!("Statement execution failed: {}", e);
                return Err(DriverError::QueryFailed(e.to_string()));
            }
        }
        Ok(ExecResult { success: true })
    }

    async fn raw_records(&self, sql: &str) -> Result<Records, DriverError> {
        debug!("Querying records: {}", sql);
        let mut prepared = self
            .connection()?
            .prepare(sql)
            .map_err(|e| DriverError::QueryFailed(e.to_string()))?;

        let cursor = prepared
            .execute(())
            .map_err(|e| DriverError::QueryFailed(e.to_string()))?;
        let Some(cursor) = cursor else {
            return Ok(Records::default());
        };

        let (names, rows) = fetch_text_rows(cursor)?;
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        debug!("Query returned {} rows", rows.len());
        Ok(Records::new(&names, rows))
    }
}

/// Drain a cursor into text rows, `None` standing for SQL NULL. Values longer
/// than `MAX_TEXT_LEN` bytes are truncated and reported once per column.
fn fetch_text_rows(
    mut cursor: impl Cursor,
) -> Result<(Vec<String>, Vec<Vec<Option<String>>>), DriverError> {
    let names = cursor.column_names()?.collect::<Result<Vec<String>, _>>()?;

    let mut buffer = TextRowSet::for_cursor(FETCH_BATCH_ROWS, &mut cursor, Some(MAX_TEXT_LEN))?;
    let mut row_set_cursor = cursor.bind_buffer(&mut buffer)?;
    let mut rows = Vec::new();
    let mut truncated = BTreeSet::new();

    while let Some(row_set) = row_set_cursor.fetch()? {
        for row_index in 0..row_set.num_rows() {
            let row = (0..row_set.num_cols())
                .map(|col_index| {
                    if is_truncated(
                        row_set.indicator_at(col_index, row_index),
                        row_set.max_len(col_index),
                    ) {
                        truncated.insert(col_index);
                    }
                    row_set
                        .at(col_index, row_index)
                        .map(|v| String::from_utf8_lossy(v).to_string())
                })
                .collect();
            rows.push(row);
        }
    }

    for col_index in truncated {
        let name = names.get(col_index).map(String::as_str).unwrap_or("?");
        warn!(
            "Values of column '{}' exceed {} bytes and were truncated",
            name, MAX_TEXT_LEN
        );
    }
    Ok((names, rows))
}

/// A value is cut off when its reported length exceeds the bound buffer, or
/// when the driver could not tell the length at all.
fn is_truncated(indicator: Indicator, max_len: usize) -> bool {
    match indicator {
        Indicator::Null => false,
        Indicator::NoTotal => true,
        Indicator::Length(len) => len > max_len,
    }
}

/// SQL type code, column size and decimal digits of a described type.
fn describe_data_type(data_type: &DataType) -> (i16, u64, i16) {
    let code = data_type.data_type().0;
    let size = data_type
        .column_size()
        .map(|n| n.get() as u64)
        .unwrap_or(0);
    (code, size, data_type.decimal_digits())
}

/// Driver name from the `Driver=` attribute, or from the DSN registration.
fn resolve_driver_name(env: &Environment, connection_string: &str) -> String {
    let attributes = parse_connection_attributes(connection_string);
    if let Some((_, driver)) = attributes.iter().find(|(k, _)| k == "driver") {
        return driver.clone();
    }
    if let Some((_, dsn)) = attributes.iter().find(|(k, _)| k == "dsn") {
        match env.data_sources() {
            Ok(sources) => {
                if let Some(source) = sources
                    .into_iter()
                    .find(|s| s.server_name.eq_ignore_ascii_case(dsn))
                {
                    return source.driver;
                }
            }
            Err(e) => debug!("Could not list data sources: {}", e),
        }
    }
    String::new()
}

/// `key=value;` pairs with lower-cased keys and braces stripped from values.
fn parse_connection_attributes(connection_string: &str) -> Vec<(String, String)> {
    connection_string
        .split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| {
            let value = v.trim().trim_start_matches('{').trim_end_matches('}');
            (k.trim().to_lowercase(), value.to_string())
        })
        .collect()
}

fn text(row: &[Option<String>], index: usize) -> String {
    row.get(index).cloned().flatten().unwrap_or_default()
}

fn parse_i16(row: &[Option<String>], index: usize) -> i16 {
    text(row, index).trim().parse().unwrap_or(0)
}

/// Column sizes are non-negative; drivers report `-1`/NULL for "unknown".
fn parse_size(row: &[Option<String>], index: usize) -> u64 {
    text(row, index)
        .trim()
        .parse::<i64>()
        .map(|n| n.max(0) as u64)
        .unwrap_or(0)
}
