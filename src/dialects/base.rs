use crate::dialects::Dialect;
use crate::error::DriverError;
use crate::executor::DriverSurface;
use crate::sql::literal_list;
use crate::model::{Column, Condition, PrimaryKey, QueryResult, Records, Schema, Table};
use crate::trace::{TraceId, Tracer};
use async_trait::async_trait;
use log::debug;
use std::collections::{HashMap, HashSet};

/// Engine-specific correction of catalog and query metadata.
///
/// Every method receives the baseline produced by the driver surface and
/// returns the corrected value. The defaults pass the baseline through, so a
/// resolver only overrides what its engine gets wrong. Errors never reach the
/// caller: the facade logs them and keeps the baseline.
#[async_trait(?Send)]
pub trait MetadataResolver: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Whether schemas are derived from an unfiltered table listing.
    ///
    /// Resolvers returning `false` query their own system views and receive
    /// an empty baseline in [`MetadataResolver::resolve_schemas`].
    fn schemas_from_tables(&self) -> bool {
        true
    }

    /// Adjust a request condition before the baseline catalog call.
    fn rewrite_condition(&self, condition: &Condition) -> Condition {
        condition.clone()
    }

    async fn resolve_schemas(
        &self,
        _ctx: &ResolveContext<'_>,
        baseline: &[Schema],
    ) -> Result<Vec<Schema>, EnrichmentError> {
        Ok(baseline.to_vec())
    }

    async fn resolve_current_schema(
        &self,
        _ctx: &ResolveContext<'_>,
    ) -> Result<String, EnrichmentError> {
        Ok(String::new())
    }

    async fn enrich_tables(
        &self,
        _ctx: &ResolveContext<'_>,
        tables: &[Table],
    ) -> Result<Vec<Table>, EnrichmentError> {
        Ok(tables.to_vec())
    }

    async fn enrich_columns(
        &self,
        _ctx: &ResolveContext<'_>,
        columns: &[Column],
    ) -> Result<Vec<Column>, EnrichmentError> {
        Ok(columns.to_vec())
    }

    async fn enrich_primary_keys(
        &self,
        _ctx: &ResolveContext<'_>,
        keys: &[PrimaryKey],
    ) -> Result<Vec<PrimaryKey>, EnrichmentError> {
        Ok(keys.to_vec())
    }

    /// `sql` is the statement text the result was described from.
    async fn enrich_query(
        &self,
        _ctx: &ResolveContext<'_>,
        _sql: &str,
        result: &QueryResult,
    ) -> Result<QueryResult, EnrichmentError> {
        Ok(result.clone())
    }
}

/// Failure inside a supplemental step. Never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Supplemental query failed: {0}")]
    Driver(#[from] DriverError),

    #[error("Supplemental result has no column '{0}'")]
    MissingColumn(String),

    #[error("Execution plan lookup failed: {0}")]
    Plan(String),
}

/// What a resolver may use while handling one facade call.
pub struct ResolveContext<'a> {
    pub driver: &'a dyn DriverSurface,
    pub tracer: &'a Tracer,
    pub trace_id: TraceId,
    pub operation: &'a str,
    /// Maximum literals per `IN(...)` list.
    pub batch_size: usize,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        driver: &'a dyn DriverSurface,
        tracer: &'a Tracer,
        trace_id: TraceId,
        operation: &'a str,
        batch_size: usize,
    ) -> Self {
        Self {
            driver,
            tracer,
            trace_id,
            operation,
            batch_size,
        }
    }

    /// Untraced context with the default batch size.
    #[cfg(test)]
    pub(crate) fn for_tests(driver: &'a dyn DriverSurface) -> Self {
        static UNTRACED: Tracer = Tracer::disabled();
        Self::new(driver, &UNTRACED, TraceId::generate(), "test", 500)
    }

    /// Issue one supplemental statement.
    pub async fn records(&self, sql: &str) -> Result<Records, EnrichmentError> {
        debug!("{} supplemental query: {}", self.operation, sql.trim());
        self.tracer.note(&self.trace_id, self.operation, sql);
        Ok(self.driver.raw_records(sql).await?)
    }

    /// First column of the first row, or empty when no row comes back.
    pub async fn scalar(&self, sql: &str) -> Result<String, EnrichmentError> {
        let records = self.records(sql).await?;
        Ok(records.first_value().unwrap_or_default().to_string())
    }

    /// Run `build` once per chunk of `keys` and concatenate the rows.
    ///
    /// No statement is issued for an empty key list.
    pub async fn batched_records<K, F>(
        &self,
        keys: &[K],
        build: F,
    ) -> Result<Records, EnrichmentError>
    where
        F: Fn(&[K]) -> String,
    {
        let mut all = Records::default();
        for chunk in keys.chunks(self.batch_size.max(1)) {
            all.extend(self.records(&build(chunk)).await?);
        }
        Ok(all)
    }

    /// Record a step that was skipped after a failure.
    pub fn skipped(&self, step: &str, error: &EnrichmentError) {
        debug!("{}: {} skipped: {}", self.operation, step, error);
        self.tracer
            .note(&self.trace_id, self.operation, format!("{} skipped: {}", step, error));
    }
}

/// A `schema.name` pair used to restrict a supplemental query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterKey {
    pub schema: String,
    pub name: String,
}

impl FilterKey {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Distinct filter keys in first-seen order, skipping pairs with a blank half.
pub fn filter_keys<'a, I>(pairs: I) -> Vec<FilterKey>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut seen = HashSet::new();
    pairs
        .into_iter()
        .filter(|(schema, name)| !schema.is_empty() && !name.is_empty())
        .map(|(schema, name)| FilterKey {
            schema: schema.to_string(),
            name: name.to_string(),
        })
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// `'schema.name'` literals of `keys`, comma separated for `IN(...)`.
pub fn qualified_literals(keys: &[FilterKey], backslash: bool) -> String {
    let names: Vec<String> = keys.iter().map(FilterKey::qualified).collect();
    literal_list(names.iter().map(String::as_str), backslash)
}

/// Distinct non-empty values in first-seen order.
pub fn distinct<'a, I>(values: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .collect()
}

/// Position of a supplemental result column that the patching depends on.
pub fn required_column(records: &Records, name: &str) -> Result<usize, EnrichmentError> {
    records
        .column(name)
        .ok_or_else(|| EnrichmentError::MissingColumn(name.to_string()))
}

/// First row index for each key, a key being the text of `columns`.
///
/// Rows with a NULL in any key column are skipped.
pub fn first_rows(records: &Records, columns: &[usize]) -> HashMap<Vec<String>, usize> {
    let mut index = HashMap::new();
    for row in 0..records.len() {
        let key: Option<Vec<String>> = columns
            .iter()
            .map(|c| records.value(row, *c).map(str::to_string))
            .collect();
        if let Some(key) = key {
            index.entry(key).or_insert(row);
        }
    }
    index
}

/// Set `target` from `found` unless it already carries a value.
pub fn patch_remarks(target: &mut String, found: Option<&str>) {
    if let Some(found) = found.filter(|f| !f.is_empty()) {
        if target.is_empty() {
            *target = found.to_string();
        }
    }
}

/// Patch table remarks from rows carrying `name` (`schema.table`) and `remarks`.
pub fn patch_table_remarks(
    tables: &[Table],
    records: &Records,
) -> Result<Vec<Table>, EnrichmentError> {
    if records.is_empty() {
        return Ok(tables.to_vec());
    }
    let name = required_column(records, "name")?;
    let remarks = required_column(records, "remarks")?;
    let index = first_rows(records, &[name]);

    Ok(tables
        .iter()
        .map(|table| {
            let mut table = table.clone();
            let key = vec![format!("{}.{}", table.schema, table.name)];
            if let Some(&row) = index.get(&key) {
                patch_remarks(&mut table.remarks, records.value(row, remarks));
            }
            table
        })
        .collect())
}

/// Patch column remarks from rows carrying `name` (`schema.table`),
/// `column_name` and `remarks`.
pub fn patch_column_remarks(
    columns: &[Column],
    records: &Records,
) -> Result<Vec<Column>, EnrichmentError> {
    if records.is_empty() {
        return Ok(columns.to_vec());
    }
    let name = required_column(records, "name")?;
    let column_name = required_column(records, "column_name")?;
    let remarks = required_column(records, "remarks")?;
    let index = first_rows(records, &[name, column_name]);

    Ok(columns
        .iter()
        .map(|column| {
            let mut column = column.clone();
            let key = vec![
                format!("{}.{}", column.schema, column.table),
                column.name.clone(),
            ];
            if let Some(&row) = index.get(&key) {
                patch_remarks(&mut column.remarks, records.value(row, remarks));
            }
            column
        })
        .collect())
}

/// Distinct `(catalog, schema)` pairs of a table listing, as schemas.
pub fn schemas_of_tables(tables: &[Table]) -> Vec<Schema> {
    let mut seen = HashSet::new();
    tables
        .iter()
        .filter(|t| !t.schema.is_empty())
        .filter(|t| seen.insert((t.catalog.clone(), t.schema.clone())))
        .map(|t| Schema {
            catalog: t.catalog.clone(),
            name: t.schema.clone(),
            remarks: String::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keys_dedup_and_skip_blank() {
        let keys = filter_keys([("app", "t1"), ("", "t2"), ("app", ""), ("app", "t1"), ("hr", "t1")]);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].qualified(), "app.t1");
        assert_eq!(keys[1].qualified(), "hr.t1");
    }

    #[test]
    fn test_distinct() {
        assert_eq!(distinct(["b", "a", "", "b"]), vec!["b", "a"]);
    }

    #[test]
    fn test_first_rows_keeps_first_match() {
        let records = Records::new(
            &["name", "remarks"],
            vec![
                vec![Some("app.t1".to_string()), Some("first".to_string())],
                vec![Some("app.t1".to_string()), Some("second".to_string())],
                vec![None, Some("orphan".to_string())],
            ],
        );
        let index = first_rows(&records, &[0]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&vec!["app.t1".to_string()]), Some(&0));
    }

    #[test]
    fn test_patch_remarks_never_overwrites() {
        let mut empty = String::new();
        patch_remarks(&mut empty, Some("from catalog"));
        assert_eq!(empty, "from catalog");

        let mut set = "kept".to_string();
        patch_remarks(&mut set, Some("other"));
        assert_eq!(set, "kept");

        let mut untouched = String::new();
        patch_remarks(&mut untouched, Some(""));
        patch_remarks(&mut untouched, None);
        assert_eq!(untouched, "");
    }

    #[test]
    fn test_patch_table_remarks() {
        let mut commented = Table::new("", "app", "t2");
        commented.remarks = "kept".to_string();
        let tables = vec![Table::new("", "app", "t1"), commented, Table::new("", "app", "t3")];
        let records = Records::new(
            &["NAME", "REMARKS"],
            vec![
                vec![Some("app.t1".to_string()), Some("orders".to_string())],
                vec![Some("app.t2".to_string()), Some("replaced?".to_string())],
                vec![Some("APP.T3".to_string()), Some("wrong case".to_string())],
            ],
        );
        let patched = patch_table_remarks(&tables, &records).unwrap();
        assert_eq!(patched.len(), 3);
        assert_eq!(patched[0].remarks, "orders");
        assert_eq!(patched[1].remarks, "kept");
        assert_eq!(patched[2].remarks, "");
    }

    #[test]
    fn test_patch_column_remarks_requires_columns() {
        let columns = vec![Column::new("", "app", "t1", "id")];
        let records = Records::new(&["name"], vec![vec![Some("app.t1".to_string())]]);
        let err = patch_column_remarks(&columns, &records).unwrap_err();
        assert!(matches!(err, EnrichmentError::MissingColumn(c) if c == "column_name"));
    }

    #[test]
    fn test_schemas_of_tables() {
        let tables = vec![
            Table::new("db", "app", "t1"),
            Table::new("db", "app", "t2"),
            Table::new("db", "hr", "t1"),
            Table::new("db", "", "orphan"),
        ];
        let schemas = schemas_of_tables(&tables);
        let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["app", "hr"]);
        assert_eq!(schemas[0].catalog, "db");
    }
}
