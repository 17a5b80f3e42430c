use crate::dialects::base::{
    filter_keys, first_rows, patch_column_remarks, patch_table_remarks, qualified_literals,
    required_column, EnrichmentError, FilterKey, MetadataResolver, ResolveContext,
};
use crate::dialects::Dialect;
use crate::model::{Column, QueryResult, Schema, Table};
use crate::sql::{escape_sql_string, number_placeholders};
use async_trait::async_trait;

/// Size reported instead of 0 for unbounded types (`MAX_SAFE_INTEGER - 1`).
pub const UNBOUNDED_SIZE: u64 = 9_007_199_254_740_990;

const CURRENT_SCHEMA_SQL: &str = "SELECT SCHEMA_NAME()";

/// Built-in schemas hidden from schema listings.
const SYSTEM_SCHEMAS: &[&str] = &[
    "sys",
    "INFORMATION_SCHEMA",
    "guest",
    "db_owner",
    "db_accessadmin",
    "db_securityadmin",
    "db_ddladmin",
    "db_backupoperator",
    "db_datareader",
    "db_datawriter",
    "db_denydatareader",
    "db_denydatawriter",
];

/// Microsoft SQL Server, through the native driver or FreeTDS.
///
/// Comments are extended properties named `MS_Description`. Source lineage
/// of result columns comes from `sp_describe_first_result_set`.
pub struct MsSqlResolver {
    freetds: bool,
}

impl MsSqlResolver {
    pub fn native() -> Self {
        Self { freetds: false }
    }

    /// FreeTDS reports size 0 for `(max)` types.
    pub fn freetds() -> Self {
        Self { freetds: true }
    }
}

pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

fn unbounded(size: u64) -> u64 {
    if size == 0 { UNBOUNDED_SIZE } else { size }
}

fn table_comments_sql(keys: &[FilterKey]) -> String {
    format!(
        "SELECT
      *
    FROM (
      SELECT
        t.name AS table_name,
        SCHEMA_NAME(t.schema_id) AS schema_name,
        CONCAT(SCHEMA_NAME(t.schema_id), '.', t.name) AS name,
        ep.value AS remarks
      FROM
        sys.tables t
      LEFT JOIN
        sys.extended_properties ep ON
          t.object_id = ep.major_id
          AND ep.minor_id = 0
          AND ep.name = 'MS_Description'
    ) BASE
    WHERE
      name IN({})",
        qualified_literals(keys, false)
    )
}

fn column_comments_sql(keys: &[FilterKey]) -> String {
    format!(
        "SELECT
      *
    FROM
      (
        SELECT
            sc.name AS schema_name,
            tb.name AS table_name,
            CONCAT(sc.name, '.', tb.name) AS name,
            col.name AS column_name,
            ep.value AS remarks
        FROM
            sys.columns col
        INNER JOIN
            sys.tables tb ON col.object_id = tb.object_id
        INNER JOIN
            sys.schemas sc ON tb.schema_id = sc.schema_id
        LEFT JOIN
            sys.extended_properties ep ON
              col.object_id = ep.major_id
              AND col.column_id = ep.minor_id
              AND ep.name = 'MS_Description'
      ) T
    WHERE
      name IN({})",
        qualified_literals(keys, false)
    )
}

/// `sp_describe_first_result_set` call for a statement with `?` markers.
pub fn describe_sql(sql: &str) -> String {
    let (rewritten, count) = number_placeholders(sql, "@");
    let mut call = format!(
        "EXEC sp_describe_first_result_set @tsql = N'{}'",
        escape_sql_string(&rewritten, false)
    );
    if count > 0 {
        let params = (1..=count)
            .map(|i| format!("@P{} nvarchar(4000)", i))
            .collect::<Vec<_>>()
            .join(", ");
        call.push_str(&format!(", @params = N'{}'", params));
    }
    call.push_str(", @browse_information_mode = 1");
    call
}

fn fill(target: &mut String, found: Option<&str>) {
    if target.is_empty() {
        if let Some(found) = found {
            *target = found.to_string();
        }
    }
}

impl MsSqlResolver {
    async fn describe_lineage(
        &self,
        ctx: &ResolveContext<'_>,
        sql: &str,
        result: &QueryResult,
    ) -> Result<QueryResult, EnrichmentError> {
        let records = ctx.records(&describe_sql(sql)).await?;
        if records.is_empty() {
            return Ok(result.clone());
        }
        let name = required_column(&records, "name")?;
        let database = required_column(&records, "source_database")?;
        let schema = required_column(&records, "source_schema")?;
        let table = required_column(&records, "source_table")?;
        let column = required_column(&records, "source_column")?;
        let index = first_rows(&records, &[name]);

        let mut result = result.clone();
        for target in &mut result.columns {
            let Some(&row) = index.get(&vec![target.name.clone()]) else {
                continue;
            };
            fill(&mut target.catalog, records.value(row, database));
            fill(&mut target.schema, records.value(row, schema));
            fill(&mut target.table, records.value(row, table));
            fill(&mut target.column, records.value(row, column));
        }
        Ok(result)
    }
}

#[async_trait(?Send)]
impl MetadataResolver for MsSqlResolver {
    fn dialect(&self) -> Dialect {
        if self.freetds {
            Dialect::MsSqlFreeTds
        } else {
            Dialect::MsSql
        }
    }

    async fn resolve_schemas(
        &self,
        _ctx: &ResolveContext<'_>,
        baseline: &[Schema],
    ) -> Result<Vec<Schema>, EnrichmentError> {
        Ok(baseline
            .iter()
            .filter(|s| !is_system_schema(&s.name))
            .cloned()
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
        ctx: &ResolveContext<'_>,
        tables: &[Table],
    ) -> Result<Vec<Table>, EnrichmentError> {
        let keys = filter_keys(tables.iter().map(|t| (t.schema.as_str(), t.name.as_str())));
        if keys.is_empty() {
            return Ok(tables.to_vec());
        }
        let records = ctx.batched_records(&keys, table_comments_sql).await?;
        patch_table_remarks(tables, &records)
    }

    async fn enrich_columns(
        &self,
        ctx: &ResolveContext<'_>,
        columns: &[Column],
    ) -> Result<Vec<Column>, EnrichmentError> {
        let mut sized = columns.to_vec();
        if self.freetds {
            for column in &mut sized {
                column.size = unbounded(column.size);
            }
        }

        let keys = filter_keys(sized.iter().map(|c| (c.schema.as_str(), c.table.as_str())));
        if keys.is_empty() {
            return Ok(sized);
        }
        // The size fix stands on its own when the comment lookup fails
        let commented = match ctx.batched_records(&keys, column_comments_sql).await {
            Ok(records) => patch_column_remarks(&sized, &records),
            Err(e) => Err(e),
        };
        match commented {
            Ok(columns) => Ok(columns),
            Err(e) => {
                ctx.skipped("column comments", &e);
                Ok(sized)
            }
        }
    }

    async fn enrich_query(
        &self,
        ctx: &ResolveContext<'_>,
        sql: &str,
        result: &QueryResult,
    ) -> Result<QueryResult, EnrichmentError> {
        let mut sized = result.clone();
        if self.freetds {
            for column in &mut sized.columns {
                column.size = unbounded(column.size);
            }
        }
        if sized.columns.is_empty() {
            return Ok(sized);
        }

        match self.describe_lineage(ctx, sql, &sized).await {
            Ok(described) => Ok(described),
            Err(e) => {
                ctx.skipped("result set lineage", &e);
                Ok(sized)
            }
        }
    }
}
