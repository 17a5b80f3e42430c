use crate::dialects::base::{required_column, EnrichmentError, MetadataResolver, ResolveContext};
use crate::dialects::Dialect;
use crate::model::Schema;
use async_trait::async_trait;

const SCHEMAS_SQL: &str = "
    SELECT
      SCHEMA_NAME,
      SCHEMA_TEXT
    FROM
      QSYS2.SYSSCHEMAS
    ORDER BY
      SCHEMA_NAME";

const CURRENT_SCHEMA_SQL: &str = "SELECT CURRENT SCHEMA FROM SYSIBM.SYSDUMMY1";

/// IBM i. `SQLTables` does not enumerate libraries usefully, so schemas come
/// from the system catalog instead.
pub struct As400Resolver;

#[async_trait(?Send)]
impl MetadataResolver for As400Resolver {
    fn dialect(&self) -> Dialect {
        Dialect::As400
    }

    fn schemas_from_tables(&self) -> bool {
        false
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
        let text = required_column(&records, "SCHEMA_TEXT")?;

        Ok((0..records.len())
            .filter_map(|row| {
                let name = records.value(row, name)?;
                Some(Schema {
                    catalog: String::new(),
                    name: name.to_string(),
                    remarks: records.value(row, text).unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    async fn resolve_current_schema(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<String, EnrichmentError> {
        ctx.scalar(CURRENT_SCHEMA_SQL).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::scripted::{rows, ScriptedDriver};
    use crate::model::Records;

    #[tokio::test]
    async fn test_schemas_from_system_catalog() {
        let driver = ScriptedDriver::new("DB2/400 SQL", "iSeries Access ODBC Driver")
            .connected()
            .respond(
                "QSYS2.SYSSCHEMAS",
                Records::new(
                    &["SCHEMA_NAME", "SCHEMA_TEXT"],
                    rows(&[&[Some("DEMQUERY"), Some("Demo library")], &[Some("QGPL"), None]]),
                ),
            );
        let ctx = ResolveContext::for_tests(&driver);

        let schemas = As400Resolver.resolve_schemas(&ctx, &[]).await.unwrap();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].catalog, "");
        assert_eq!(schemas[0].name, "DEMQUERY");
        assert_eq!(schemas[0].remarks, "Demo library");
        assert_eq!(schemas[1].remarks, "");
    }

    #[tokio::test]
    async fn test_current_schema() {
        let driver = ScriptedDriver::new("DB2/400 SQL", "")
            .connected()
            .respond("SYSDUMMY1", Records::new(&["00001"], rows(&[&[Some("QSECOFR")]])));
        let ctx = ResolveContext::for_tests(&driver);

        let schema = As400Resolver.resolve_current_schema(&ctx).await.unwrap();
        assert_eq!(schema, "QSECOFR");
        assert_eq!(driver.count_matching("CURRENT SCHEMA"), 1);
    }
}
