use crate::dialects::base::{required_column, EnrichmentError, MetadataResolver, ResolveContext};
use crate::dialects::Dialect;
use crate::model::{Column, Condition, PrimaryKey, QueryResult, Schema, Table};
use async_trait::async_trait;

const SCHEMAS_SQL: &str = "
    SELECT
      schema_name
    FROM
      information_schema.schemata
    WHERE
      schema_name NOT IN ('mysql', 'information_schema', 'performance_schema', 'sys')
    ORDER BY
      schema_name";

const CURRENT_SCHEMA_SQL: &str = "SELECT DATABASE()";

/// MySQL and MariaDB.
///
/// A database is both the catalog and the schema here, and drivers report
/// it in either slot. Every result gets the same name in both.
pub struct MySqlResolver;

/// The database name, whichever slot the driver put it in.
fn database_of<'a>(catalog: &'a str, schema: &'a str) -> &'a str {
    if catalog.is_empty() { schema } else { catalog }
}

pub fn merge_table(table: &Table) -> Table {
    let name = database_of(&table.catalog, &table.schema).to_string();
    Table {
        catalog: name.clone(),
        schema: name,
        ..table.clone()
    }
}

#[async_trait(?Send)]
impl MetadataResolver for MySqlResolver {
    fn dialect(&self) -> Dialect {
        Dialect::MySqlFamily
    }

    fn schemas_from_tables(&self) -> bool {
        false
    }

    fn rewrite_condition(&self, condition: &Condition) -> Condition {
        let mut condition = condition.normalized();
        if condition.catalog.is_none() {
            if let Some(schema) = condition.schema.as_ref().filter(|s| !s.contains('%')) {
                condition.catalog = Some(schema.clone());
            }
        }
        condition
    }

    async fn resolve_schemas(
        &self,
        ctx: &ResolveContext<'_>,
        _baseline: &[Schema],
    ) -> Result<Vec<Schema>, EnrichmentError> {
        let records = ctx.records(SCHEMAS_SQL).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let name = required_column(&records, "SCHEMA_NAME")?;

        Ok((0..records.len())
            .filter_map(|row| records.value(row, name))
            .map(|name| Schema {
                catalog: name.to_string(),
                name: name.to_string(),
                remarks: String::new(),
            })
            .collect())
    }

    async fn resolve_current_schema(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<String, EnrichmentError> {
        ctx.scalar(CURRENT_SCHEMA_SQL).await
    }

    async fn enrich_tables(
        &self,
        _ctx: &ResolveContext<'_>,
        tables: &[Table],
    ) -> Result<Vec<Table>, EnrichmentError> {
        Ok(tables.iter().map(merge_table).collect())
    }

    async fn enrich_columns(
        &self,
        _ctx: &ResolveContext<'_>,
        columns: &[Column],
    ) -> Result<Vec<Column>, EnrichmentError> {
        Ok(columns
            .iter()
            .map(|column| {
                let name = database_of(&column.catalog, &column.schema).to_string();
                Column {
                    catalog: name.clone(),
                    schema: name,
                    ..column.clone()
                }
            })
            .collect())
    }

    async fn enrich_primary_keys(
        &self,
        _ctx: &ResolveContext<'_>,
        keys: &[PrimaryKey],
    ) -> Result<Vec<PrimaryKey>, EnrichmentError> {
        Ok(keys
            .iter()
            .map(|key| {
                let name = database_of(&key.catalog, &key.schema).to_string();
                PrimaryKey {
                    catalog: name.clone(),
                    schema: name,
                    ..key.clone()
                }
            })
            .collect())
    }

    async fn enrich_query(
        &self,
        _ctx: &ResolveContext<'_>,
        _sql: &str,
        result: &QueryResult,
    ) -> Result<QueryResult, EnrichmentError> {
        let mut result = result.clone();
        for column in &mut result.columns {
            let name = database_of(&column.catalog, &column.schema).to_string();
            column.catalog = name.clone();
            column.schema = name;
        }
        Ok(result)
    }
}
