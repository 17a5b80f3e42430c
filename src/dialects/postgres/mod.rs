use crate::dialects::base::{
    distinct, filter_keys, first_rows, patch_remarks, patch_table_remarks, qualified_literals,
    required_column, EnrichmentError, FilterKey, MetadataResolver, ResolveContext,
};
use crate::dialects::Dialect;
use crate::model::sql_type::{SQL_LONGVARCHAR, SQL_VARCHAR, SQL_WLONGVARCHAR, SQL_WVARCHAR};
use crate::model::{Column, QueryResult, Schema, Table};
use crate::sql::literal_list;
use async_trait::async_trait;

/// Byte bound reported for types whose length the driver cannot tell.
pub const INDETERMINATE_LENGTH: u64 = 8190;

const CURRENT_SCHEMA_SQL: &str = "SELECT current_schema()";

/// PostgreSQL. Comments live in `pg_description` and are not returned by
/// the catalog calls; some native types surface as short varchars.
pub struct PostgresResolver;

fn schema_comments_sql(names: &[&str]) -> String {
    format!(
        "SELECT
      nspname AS schema_name,
      obj_description(oid, 'pg_namespace') AS schema_comment
    FROM
      pg_namespace
    WHERE
      nspname IN({})",
        literal_list(names.iter().copied(), false)
    )
}

fn table_comments_sql(keys: &[FilterKey]) -> String {
    format!(
        "SELECT
      *
    FROM
      (
        SELECT
          pg_namespace.nspname || '.' || pg_class.relname AS name,
          pg_namespace.nspname AS schema_name,
          pg_class.relname AS table_name,
          pg_description.description AS remarks
        FROM
          pg_class
          INNER JOIN
            pg_namespace
          ON  pg_class.relnamespace = pg_namespace.oid
          LEFT OUTER JOIN
            pg_description
          ON  pg_class.oid = pg_description.objoid
          AND pg_description.objsubid = 0
        WHERE
          pg_namespace.nspname NOT IN('pg_catalog', 'pg_toast', 'information_schema')
      ) T
    WHERE
      name IN({})",
        qualified_literals(keys, false)
    )
}

fn column_details_sql(keys: &[FilterKey]) -> String {
    format!(
        "SELECT
      *
    FROM
      (
        SELECT
          pg_stat_user_tables.schemaname || '.' || pg_stat_user_tables.relname AS name,
          pg_stat_user_tables.schemaname AS schema_name,
          pg_stat_user_tables.relname AS table_name,
          information_schema.columns.column_name AS column_name,
          information_schema.columns.data_type AS data_type,
          pg_description.description AS remarks
        FROM
          pg_stat_user_tables
          INNER JOIN
            information_schema.columns
          ON  pg_stat_user_tables.relname = information_schema.columns.table_name
          AND pg_stat_user_tables.schemaname = information_schema.columns.table_schema
          LEFT OUTER JOIN
            pg_description
          ON  pg_description.objoid = pg_stat_user_tables.relid
          AND pg_description.objsubid = information_schema.columns.ordinal_position
      ) T
    WHERE
      name IN({})",
        qualified_literals(keys, false)
    )
}

fn query_types_sql(keys: &[FilterKey]) -> String {
    format!(
        "SELECT
      *
    FROM
      (
        SELECT
          table_schema || '.' || table_name AS name,
          column_name,
          data_type
        FROM
          information_schema.columns
      ) T
    WHERE
      name IN({})",
        qualified_literals(keys, false)
    )
}

/// Replacement type name and size for a column whose native type the
/// driver reports as an ordinary varchar.
///
/// Arrays, enums and json come back as `VARCHAR(255)`-like types and are
/// widened to the matching long type. `xml` is already long but sized 0.
pub fn corrected_type(data_type: &str, type_name: &str) -> Option<(&'static str, u64)> {
    match data_type.to_lowercase().as_str() {
        "array" | "user-defined" | "json" | "jsonb" => match type_name {
            SQL_WVARCHAR => Some((SQL_WLONGVARCHAR, INDETERMINATE_LENGTH)),
            SQL_VARCHAR => Some((SQL_LONGVARCHAR, INDETERMINATE_LENGTH)),
            _ => None,
        },
        "xml" => match type_name {
            SQL_WLONGVARCHAR => Some((SQL_WLONGVARCHAR, INDETERMINATE_LENGTH)),
            SQL_LONGVARCHAR => Some((SQL_LONGVARCHAR, INDETERMINATE_LENGTH)),
            _ => None,
        },
        _ => None,
    }
}

/// Apply [`corrected_type`] to a catalog column.
pub fn transform_column(data_type: &str, column: &Column) -> Column {
    let mut column = column.clone();
    if let Some((type_name, size)) = corrected_type(data_type, &column.type_name) {
        column.type_name = type_name.to_string();
        column.size = size;
    }
    column
}

#[async_trait(?Send)]
impl MetadataResolver for PostgresResolver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn resolve_schemas(
        &self,
        ctx: &ResolveContext<'_>,
        baseline: &[Schema],
    ) -> Result<Vec<Schema>, EnrichmentError> {
        let names = distinct(baseline.iter().map(|s| s.name.as_str()));
        if names.is_empty() {
            return Ok(baseline.to_vec());
        }

        let records = ctx
            .batched_records(&names, |chunk| schema_comments_sql(chunk))
            .await?;
        if records.is_empty() {
            return Ok(baseline.to_vec());
        }
        let name = required_column(&records, "schema_name")?;
        let comment = required_column(&records, "schema_comment")?;
        let index = first_rows(&records, &[name]);

        Ok(baseline
            .iter()
            .map(|schema| {
                let mut schema = schema.clone();
                if let Some(&row) = index.get(&vec![schema.name.clone()]) {
                    patch_remarks(&mut schema.remarks, records.value(row, comment));
                }
                schema
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
        let keys = filter_keys(columns.iter().map(|c| (c.schema.as_str(), c.table.as_str())));
        if keys.is_empty() {
            return Ok(columns.to_vec());
        }
        let records = ctx.batched_records(&keys, column_details_sql).await?;
        if records.is_empty() {
            return Ok(columns.to_vec());
        }
        let name = required_column(&records, "name")?;
        let column_name = required_column(&records, "column_name")?;
        let data_type = required_column(&records, "data_type")?;
        let remarks = required_column(&records, "remarks")?;
        let index = first_rows(&records, &[name, column_name]);

        Ok(columns
            .iter()
            .map(|column| {
                let key = vec![
                    format!("{}.{}", column.schema, column.table),
                    column.name.clone(),
                ];
                let Some(&row) = index.get(&key) else {
                    return column.clone();
                };
                let mut column = match records.value(row, data_type) {
                    Some(native) => transform_column(native, column),
                    None => column.clone(),
                };
                patch_remarks(&mut column.remarks, records.value(row, remarks));
                column
            })
            .collect())
    }

    async fn enrich_query(
        &self,
        ctx: &ResolveContext<'_>,
        _sql: &str,
        result: &QueryResult,
    ) -> Result<QueryResult, EnrichmentError> {
        // Expression columns have no base column and are left alone
        let keys = filter_keys(
            result
                .columns
                .iter()
                .filter(|c| !c.column.is_empty())
                .map(|c| (c.schema.as_str(), c.table.as_str())),
        );
        if keys.is_empty() {
            return Ok(result.clone());
        }
        let records = ctx.batched_records(&keys, query_types_sql).await?;
        if records.is_empty() {
            return Ok(result.clone());
        }
        let name = required_column(&records, "name")?;
        let column_name = required_column(&records, "column_name")?;
        let data_type = required_column(&records, "data_type")?;
        let index = first_rows(&records, &[name, column_name]);

        let mut result = result.clone();
        for column in result.columns.iter_mut().filter(|c| !c.column.is_empty()) {
            let key = vec![
                format!("{}.{}", column.schema, column.table),
                column.column.clone(),
            ];
            let native = index.get(&key).and_then(|&row| records.value(row, data_type));
            if let Some((type_name, size)) =
                native.and_then(|native| corrected_type(native, &column.type_name))
            {
                column.type_name = type_name.to_string();
                column.size = size;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::scripted::{rows, ScriptedDriver};
    use crate::model::{QueryColumn, Records};

    fn varchar(schema: &str, table: &str, name: &str, type_name: &str) -> Column {
        Column {
            type_name: type_name.to_string(),
            size: 255,
            ..Column::new("", schema, table, name)
        }
    }

    #[test]
    fn test_corrected_type() {
        assert_eq!(
            corrected_type("jsonb", SQL_WVARCHAR),
            Some((SQL_WLONGVARCHAR, INDETERMINATE_LENGTH))
        );
        assert_eq!(
            corrected_type("ARRAY", SQL_VARCHAR),
            Some((SQL_LONGVARCHAR, INDETERMINATE_LENGTH))
        );
        assert_eq!(corrected_type("USER-DEFINED", "SQL_INTEGER"), None);
        assert_eq!(
            corrected_type("xml", SQL_LONGVARCHAR),
            Some((SQL_LONGVARCHAR, INDETERMINATE_LENGTH))
        );
        assert_eq!(corrected_type("xml", SQL_VARCHAR), None);
        assert_eq!(corrected_type("character varying", SQL_VARCHAR), None);
    }

    #[test]
    fn test_schema_comment_query_has_single_in() {
        let sql = schema_comments_sql(&["public", "it's"]);
        assert!(sql.contains("nspname IN('public','it''s')"));
        assert!(!sql.contains("IN IN"));
    }

    #[tokio::test]
    async fn test_schema_comments() {
        let driver = ScriptedDriver::new("PostgreSQL", "").connected().respond(
            "pg_namespace",
            Records::new(
                &["schema_name", "schema_comment"],
                rows(&[&[Some("public"), Some("standard public schema")]]),
            ),
        );
        let ctx = ResolveContext::for_tests(&driver);
        let baseline = vec![
            Schema { catalog: "db".into(), name: "public".into(), remarks: String::new() },
            Schema { catalog: "db".into(), name: "app".into(), remarks: String::new() },
        ];

        let schemas = PostgresResolver.resolve_schemas(&ctx, &baseline).await.unwrap();
        assert_eq!(schemas[0].remarks, "standard public schema");
        assert_eq!(schemas[1].remarks, "");
    }

    #[tokio::test]
    async fn test_column_comments_and_types() {
        let driver = ScriptedDriver::new("PostgreSQL", "").connected().respond(
            "pg_stat_user_tables",
            Records::new(
                &["name", "schema_name", "table_name", "column_name", "data_type", "remarks"],
                rows(&[
                    &[Some("app.t1"), Some("app"), Some("t1"), Some("id"), Some("integer"), Some("key")],
                    &[Some("app.t1"), Some("app"), Some("t1"), Some("doc"), Some("jsonb"), None],
                ]),
            ),
        );
        let ctx = ResolveContext::for_tests(&driver);
        let columns = vec![
            varchar("app", "t1", "id", "SQL_INTEGER"),
            varchar("app", "t1", "doc", SQL_WVARCHAR),
            varchar("app", "t1", "other", SQL_VARCHAR),
        ];

        let enriched = PostgresResolver.enrich_columns(&ctx, &columns).await.unwrap();
        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched[0].remarks, "key");
        assert_eq!(enriched[0].size, 255);
        assert_eq!(enriched[1].type_name, SQL_WLONGVARCHAR);
        assert_eq!(enriched[1].size, INDETERMINATE_LENGTH);
        assert_eq!(enriched[2], columns[2]);
        // One statement for the single distinct table
        assert_eq!(driver.issued().len(), 1);
    }

    #[tokio::test]
    async fn test_query_type_correction_needs_base_column() {
        let driver = ScriptedDriver::new("PostgreSQL", "").connected().respond(
            "information_schema.columns",
            Records::new(
                &["name", "column_name", "data_type"],
                rows(&[&[Some("app.t1"), Some("tags"), Some("ARRAY")]]),
            ),
        );
        let ctx = ResolveContext::for_tests(&driver);
        let mut tags = QueryColumn::named("tags");
        tags.type_name = SQL_VARCHAR.to_string();
        tags.schema = "app".to_string();
        tags.table = "t1".to_string();
        tags.column = "tags".to_string();
        let expr = QueryColumn::named("n");
        let result = QueryResult { columns: vec![tags, expr], ..QueryResult::default() };

        let enriched = PostgresResolver.enrich_query(&ctx, "SELECT tags, 1 AS n FROM app.t1", &result).await.unwrap();
        assert_eq!(enriched.columns[0].type_name, SQL_LONGVARCHAR);
        assert_eq!(enriched.columns[0].size, INDETERMINATE_LENGTH);
        assert_eq!(enriched.columns[1], result.columns[1]);
    }

    #[tokio::test]
    async fn test_query_without_lineage_issues_nothing() {
        let driver = ScriptedDriver::new("PostgreSQL", "").connected();
        let ctx = ResolveContext::for_tests(&driver);
        let result = QueryResult { columns: vec![QueryColumn::named("a")], ..QueryResult::default() };

        let enriched = PostgresResolver.enrich_query(&ctx, "SELECT 1 AS a", &result).await.unwrap();
        assert_eq!(enriched, result);
        assert!(driver.issued().is_empty());
    }
}
