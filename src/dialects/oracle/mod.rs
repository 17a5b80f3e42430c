pub mod plan;

use crate::dialects::base::{
    distinct, filter_keys, patch_column_remarks, patch_table_remarks, qualified_literals,
    EnrichmentError, FilterKey, MetadataResolver, ResolveContext,
};
use crate::dialects::Dialect;
use crate::model::{Column, QueryResult, Schema, Table};
use crate::sql::literal_list;
use async_trait::async_trait;

const CURRENT_SCHEMA_SQL: &str = "SELECT SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') FROM DUAL";

/// Accounts created by the database and its options, hidden from schema
/// listings.
const SYSTEM_ACCOUNTS: &[&str] = &[
    "ANONYMOUS",
    "APEX_050000",
    "APEX_PUBLIC_USER",
    "APPQOSSYS",
    "AUDSYS",
    "CTXSYS",
    "DBSFWUSER",
    "DBSNMP",
    "DIP",
    "DVF",
    "DVSYS",
    "FLOWS_FILES",
    "GGSYS",
    "GSMADMIN_INTERNAL",
    "GSMCATUSER",
    "GSMUSER",
    "HR",
    "LBACSYS",
    "MDDATA",
    "MDSYS",
    "OJVMSYS",
    "OLAPSYS",
    "ORACLE_OCM",
    "ORDDATA",
    "ORDPLUGINS",
    "ORDSYS",
    "OUTLN",
    "REMOTE_SCHEDULER_AGENT",
    "SI_INFORMTN_SCHEMA",
    "SPATIAL_CSW_ADMIN_USR",
    "SPATIAL_WFS_ADMIN_USR",
    "SYS",
    "SYS$UMF",
    "SYSBACKUP",
    "SYSDG",
    "SYSKM",
    "SYSRAC",
    "SYSTEM",
    "WMSYS",
    "XDB",
    "XS$NULL",
];

/// Oracle. Comments come from `ALL_TAB_COMMENTS` / `ALL_COL_COMMENTS` and
/// result-column sources are guessed from the execution plan.
pub struct OracleResolver;

pub fn filter_schemas(schemas: &[Schema]) -> Vec<Schema> {
    schemas
        .iter()
        .filter(|s| !SYSTEM_ACCOUNTS.contains(&s.name.as_str()))
        .cloned()
        .collect()
}

/// Owner and table-name filters for one chunk of keys.
///
/// The comment views span every object in the database, so they are cut
/// down by owner and name before the qualified-name match.
fn prefilters(keys: &[FilterKey]) -> (String, String) {
    let owners = distinct(keys.iter().map(|k| k.schema.as_str()));
    let names = distinct(keys.iter().map(|k| k.name.as_str()));
    (literal_list(owners, false), literal_list(names, false))
}

fn table_comments_sql(keys: &[FilterKey]) -> String {
    let (owners, names) = prefilters(keys);
    format!(
        "SELECT
      *
    FROM
      (
        SELECT
          OWNER || '.' || TABLE_NAME AS NAME,
          OWNER AS SCHEMA_NAME,
          TABLE_NAME,
          COMMENTS AS REMARKS
        FROM
          ALL_TAB_COMMENTS
        WHERE
          OWNER IN ({})
          AND TABLE_NAME IN ({})
      ) T
    WHERE
      NAME IN ({})",
        owners,
        names,
        qualified_literals(keys, false)
    )
}

fn column_comments_sql(keys: &[FilterKey]) -> String {
    let (owners, names) = prefilters(keys);
    format!(
        "SELECT
      *
    FROM
      (
        SELECT
          OWNER || '.' || TABLE_NAME AS NAME,
          OWNER AS SCHEMA_NAME,
          TABLE_NAME,
          COLUMN_NAME,
          COMMENTS AS REMARKS
        FROM
          ALL_COL_COMMENTS
        WHERE
          OWNER IN ({})
          AND TABLE_NAME IN ({})
      ) T
    WHERE
      NAME IN ({})",
        owners,
        names,
        qualified_literals(keys, false)
    )
}

#[async_trait(?Send)]
impl MetadataResolver for OracleResolver {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    async fn resolve_schemas(
        &self,
        _ctx: &ResolveContext<'_>,
        baseline: &[Schema],
    ) -> Result<Vec<Schema>, EnrichmentError> {
        Ok(filter_schemas(baseline))
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
        let records = ctx.batched_records(&keys, column_comments_sql).await?;
        patch_column_remarks(columns, &records)
    }

    async fn enrich_query(
        &self,
        ctx: &ResolveContext<'_>,
        sql: &str,
        result: &QueryResult,
    ) -> Result<QueryResult, EnrichmentError> {
        Ok(plan::resolve_lineage(ctx, sql, result).await)
    }
}
