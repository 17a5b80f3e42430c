//! Result-column provenance from `EXPLAIN PLAN`.
//!
//! The Oracle driver cannot say which table a result column came from. The
//! statement is explained under a private statement id, the projection of
//! every plan step is parsed, and columns without a known source are given a
//! guessed owner and table from the first step that projects a column of the
//! same name. The plan rows are deleted afterwards.

use crate::dialects::base::{required_column, EnrichmentError, ResolveContext};
use crate::model::{QueryResult, Records};
use crate::sql::{escape_sql_string, number_placeholders, quote_literal, replace_special_chars};

/// Width of `PLAN_TABLE.STATEMENT_ID`.
const STATEMENT_ID_LEN: usize = 30;

/// Fresh random statement id that fits `PLAN_TABLE.STATEMENT_ID`.
pub fn statement_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(STATEMENT_ID_LEN);
    id
}

/// PL/SQL block explaining `sql` under `statement_id`.
///
/// Positional markers become `:P1, :P2, …` so the statement parses without
/// binds, and line breaks are flattened before embedding. The id sits in a
/// literal nested inside the block's own literal, so it is escaped twice.
pub fn register_sql(sql: &str, statement_id: &str) -> String {
    let (native, _) = number_placeholders(sql, ":");
    let literal = replace_special_chars(&escape_sql_string(&native, false));
    let statement_id = escape_sql_string(&escape_sql_string(statement_id, false), false);
    format!(
        "DECLARE
      q VARCHAR2(8000) := '{}';
    BEGIN
      EXECUTE IMMEDIATE 'EXPLAIN PLAN SET STATEMENT_ID = ''{}'' FOR ' || q;
    END;",
        literal, statement_id
    )
}

pub fn lookup_sql(statement_id: &str) -> String {
    format!(
        "SELECT
      OBJECT_OWNER,
      OBJECT_NAME,
      PROJECTION
    FROM
      PLAN_TABLE
    WHERE
      STATEMENT_ID = {}
    ORDER BY
      OBJECT_INSTANCE",
        quote_literal(statement_id, false)
    )
}

pub fn cleanup_sql(statement_id: &str) -> String {
    format!(
        "DELETE FROM
        PLAN_TABLE
      WHERE
        STATEMENT_ID = {}",
        quote_literal(statement_id, false)
    )
}

/// Column names projected by one plan step.
///
/// `"T"."ID"[NUMBER,22], "T"."NAME"[VARCHAR2,100]` yields `ID, NAME`.
/// Parenthesized and bracketed parts are dropped, then each item is reduced
/// to its last dotted component with identifier quotes removed.
pub fn projection_columns(projection: &str) -> Vec<String> {
    let mut flat = String::with_capacity(projection.len());
    let mut depth = 0usize;
    for c in projection.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => flat.push(c),
            _ => {}
        }
    }

    flat.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(last_component)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Last `.`-separated part of a possibly quoted, qualified identifier.
fn last_component(item: &str) -> String {
    let mut last = String::new();
    let mut quoted = false;
    for c in item.chars() {
        match c {
            '"' => quoted = !quoted,
            '.' if !quoted => last.clear(),
            _ => last.push(c),
        }
    }
    last.trim().to_string()
}

/// Set guesses on columns without a source from explained plan rows.
///
/// Rows are taken in plan order; a column keeps the first guess it gets.
pub fn apply_guesses(result: &mut QueryResult, plan: &Records) -> Result<(), EnrichmentError> {
    if plan.is_empty() {
        return Ok(());
    }
    let owner_col = required_column(plan, "OBJECT_OWNER")?;
    let object_col = required_column(plan, "OBJECT_NAME")?;
    let projection_col = required_column(plan, "PROJECTION")?;

    for row in 0..plan.len() {
        let (Some(schema), Some(table), Some(projection)) = (
            plan.value(row, owner_col),
            plan.value(row, object_col),
            plan.value(row, projection_col),
        ) else {
            continue;
        };
        let projected = projection_columns(projection);

        for column in result.columns.iter_mut().filter(|c| c.lacks_source()) {
            if projected.iter().any(|p| p == column.source_column()) {
                column.guessed_schema = Some(schema.to_string());
                column.guessed_table = Some(table.to_string());
            }
        }
    }
    Ok(())
}

async fn guess_sources(
    ctx: &ResolveContext<'_>,
    sql: &str,
    statement_id: &str,
    result: &mut QueryResult,
) -> Result<(), EnrichmentError> {
    ctx.records(&register_sql(sql, statement_id))
        .await
        .map_err(|e| EnrichmentError::Plan(format!("EXPLAIN PLAN failed: {}", e)))?;
    let plan = ctx.records(&lookup_sql(statement_id)).await?;
    apply_guesses(result, &plan)
}

/// Guess sources for `result`, which was described from `sql`.
///
/// Never fails: on error the guesses made so far are kept. The plan rows
/// are deleted exactly once whatever happened.
pub async fn resolve_lineage(ctx: &ResolveContext<'_>, sql: &str, result: &QueryResult) -> QueryResult {
    let mut resolved = result.clone();
    if resolved.columns.is_empty() {
        return resolved;
    }

    let statement_id = statement_id();
    if let Err(e) = guess_sources(ctx, sql, &statement_id, &mut resolved).await {
        ctx.skipped("execution plan lineage", &e);
    }
    if let Err(e) = ctx.records(&cleanup_sql(&statement_id)).await {
        ctx.skipped("plan cleanup", &e);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_id_fits_column() {
        let id = statement_id();
        assert_eq!(id.len(), 30);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, statement_id());
    }

    #[test]
    fn test_register_sql() {
        let sql = register_sql("SELECT *\nFROM T\tWHERE A = ? AND B = 'x'", "abc");
        assert!(sql.contains("q VARCHAR2(8000) := 'SELECT * FROM T WHERE A = :P1 AND B = ''x''';"));
        assert!(sql.contains("'EXPLAIN PLAN SET STATEMENT_ID = ''abc'' FOR ' || q;"));
    }

    #[test]
    fn test_statement_id_is_escaped_everywhere() {
        let id = "x'y";
        assert!(register_sql("SELECT 1 FROM DUAL", id)
            .contains("'EXPLAIN PLAN SET STATEMENT_ID = ''x''''y'' FOR ' || q;"));
        assert!(lookup_sql(id).contains("STATEMENT_ID = 'x''y'"));
        assert!(cleanup_sql(id).contains("STATEMENT_ID = 'x''y'"));

        let plain = statement_id();
        assert!(lookup_sql(&plain).contains(&format!("STATEMENT_ID = '{}'", plain)));
    }

    #[test]
    fn test_projection_columns() {
        assert_eq!(
            projection_columns(r#""T"."ID"[NUMBER,22], "T"."NAME"[VARCHAR2,100]"#),
            vec!["ID", "NAME"]
        );
        assert_eq!(
            projection_columns(r#"(#keys=1) "EMP"."DEPT_ID"[NUMBER,22], COUNT(*)[22]"#),
            vec!["DEPT_ID", "COUNT"]
        );
        assert_eq!(projection_columns("ROWID[ROWID,10], A.B.C"), vec!["ROWID", "C"]);
        assert_eq!(projection_columns(r#""A.B"."C""#), vec!["C"]);
        assert_eq!(projection_columns(r#""X.Y""#), vec!["X.Y"]);
        assert!(projection_columns("").is_empty());
        assert!(projection_columns("(nested (deep) text)").is_empty());
    }
}
