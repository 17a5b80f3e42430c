//! The normalization facade.
//!
//! [`OmniDb`] owns one driver connection and its identity. Every metadata
//! call fetches the baseline from the driver, detects the dialect from the
//! current identity and lets that dialect's resolver correct the result.
//! Resolver failures are logged and traced, and the baseline is returned in
//! their place; driver failures on the baseline are returned unchanged.

use crate::dialects::base::schemas_of_tables;
use crate::dialects::{self, Dialect, EnrichmentError, MetadataResolver, ResolveContext};
use crate::error::DriverError;
use crate::executor::DriverSurface;
use crate::model::config::EnrichmentConfig;
use crate::model::{
    Column, Condition, Config, ConnectionIdentity, ExecResult, PrimaryKey, QueryOptions,
    QueryResult, Records, Schema, Table,
};
use crate::trace::{TraceId, Tracer};
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;

pub struct OmniDb<D: DriverSurface> {
    driver: D,
    identity: Option<ConnectionIdentity>,
    tracer: Tracer,
    enrichment: EnrichmentConfig,
}

impl<D: DriverSurface> OmniDb<D> {
    /// Facade with default enrichment settings, traced when `DEBUG_OMNIDB` is set.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            identity: None,
            tracer: Tracer::from_env(),
            enrichment: EnrichmentConfig::default(),
        }
    }

    pub fn with_config(driver: D, config: &Config) -> Self {
        let tracer = if config.trace.enabled {
            Tracer::new(true)
        } else {
            Tracer::from_env()
        };
        Self {
            driver,
            identity: None,
            tracer,
            enrichment: config.enrichment.clone(),
        }
    }

    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    /// The underlying driver surface.
    pub fn surface(&self) -> &D {
        &self.driver
    }

    pub async fn connect(&mut self, connection_string: &str) -> Result<bool, DriverError> {
        let id = self.tracer.begin("connect", "connection string omitted");
        self.identity = None;

        let outcome = self.driver.connect(connection_string).await;
        let connected = outcome.map_err(|e| self.primary_failed(&id, "connect", e))?;
        if connected {
            let identity = ConnectionIdentity {
                dbms: self.driver.dbms(),
                driver: self.driver.driver(),
            };
            info!(
                "Connected: dbms='{}' driver='{}' dialect={}",
                identity.dbms,
                identity.driver,
                dialects::detect_with_driver(&identity.dbms, &identity.driver)
            );
            self.identity = Some(identity);
        }

        self.tracer.end(&id, "connect", connected);
        Ok(connected)
    }

    pub async fn disconnect(&mut self) -> Result<bool, DriverError> {
        let id = self.tracer.begin("disconnect", "");
        self.identity = None;
        let outcome = self.driver.disconnect().await;
        let disconnected = outcome.map_err(|e| self.primary_failed(&id, "disconnect", e))?;
        self.tracer.end(&id, "disconnect", disconnected);
        Ok(disconnected)
    }

    pub fn is_connected(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&ConnectionIdentity> {
        self.identity.as_ref()
    }

    /// DBMS product name, empty when disconnected.
    pub fn dbms(&self) -> String {
        self.identity
            .as_ref()
            .map(|i| i.dbms.clone())
            .unwrap_or_default()
    }

    /// Driver name, empty when disconnected.
    pub fn driver(&self) -> String {
        self.identity
            .as_ref()
            .map(|i| i.driver.clone())
            .unwrap_or_default()
    }

    /// Dialect of the live connection; `Generic` when disconnected.
    pub fn dialect(&self) -> Dialect {
        self.identity
            .as_ref()
            .map(|i| dialects::detect_with_driver(&i.dbms, &i.driver))
            .unwrap_or(Dialect::Generic)
    }

    pub async fn schemas(&self, condition: &Condition) -> Result<Vec<Schema>, DriverError> {
        const OP: &str = "schemas";
        let id = self.tracer.begin(OP, condition);
        let resolver = self.resolver();
        let ctx = self.context(id, OP);

        if let Some(r) = resolver.as_ref().filter(|r| !r.schemas_from_tables()) {
            match r.resolve_schemas(&ctx, &[]).await {
                Ok(schemas) => {
                    self.trace_out(&ctx.trace_id, OP, &schemas);
                    return Ok(schemas);
                }
                // Fall back to deriving schemas from the table listing
                Err(e) => ctx.skipped("schema query", &e),
            }
        }

        let listing = Condition {
            catalog: condition.catalog.clone(),
            schema: condition.schema.clone().or_else(|| Some("%".to_string())),
            table: Some("%".to_string()),
            column: None,
            table_type: Some("%".to_string()),
        };
        let tables = self
            .driver
            .raw_tables(&listing)
            .await
            .map_err(|e| self.primary_failed(&ctx.trace_id, OP, e))?;
        let baseline = schemas_of_tables(&tables);

        let schemas = match resolver.filter(|r| r.schemas_from_tables()) {
            Some(r) => {
                let outcome = r.resolve_schemas(&ctx, &baseline).await;
                settle(&ctx, "schema enrichment", outcome, baseline)
            }
            None => baseline,
        };
        self.trace_out(&ctx.trace_id, OP, &schemas);
        Ok(schemas)
    }

    /// Default schema of the session, empty when it cannot be determined.
    /// Fails with [`DriverError::NotConnected`] like every catalog call.
    pub async fn current_schema(&self) -> Result<String, DriverError> {
        const OP: &str = "currentSchema";
        let id = self.tracer.begin(OP, "");
        if !self.is_connected() {
            return Err(self.primary_failed(&id, OP, DriverError::NotConnected));
        }
        let ctx = self.context(id, OP);

        let schema = match self.resolver() {
            Some(r) => {
                let outcome = r.resolve_current_schema(&ctx).await;
                settle(&ctx, "current schema", outcome, String::new())
            }
            None => String::new(),
        };
        self.tracer.end(&ctx.trace_id, OP, &schema);
        Ok(schema)
    }

    pub async fn tables(&self, condition: &Condition) -> Result<Vec<Table>, DriverError> {
        const OP: &str = "tables";
        let id = self.tracer.begin(OP, condition);
        let resolver = self.resolver();
        let ctx = self.context(id, OP);

        let condition = rewrite(resolver.as_ref(), condition);
        let baseline = self
            .driver
            .raw_tables(&condition)
            .await
            .map_err(|e| self.primary_failed(&ctx.trace_id, OP, e))?;

        let tables = match resolver {
            Some(r) => {
                let outcome = r.enrich_tables(&ctx, &baseline).await;
                settle(&ctx, "table enrichment", outcome, baseline)
            }
            None => baseline,
        };
        self.trace_out(&ctx.trace_id, OP, &tables);
        Ok(tables)
    }

    pub async fn columns(&self, condition: &Condition) -> Result<Vec<Column>, DriverError> {
        const OP: &str = "columns";
        let id = self.tracer.begin(OP, condition);
        let resolver = self.resolver();
        let ctx = self.context(id, OP);

        let condition = rewrite(resolver.as_ref(), condition);
        let baseline = self
            .driver
            .raw_columns(&condition)
            .await
            .map_err(|e| self.primary_failed(&ctx.trace_id, OP, e))?;

        let columns = match resolver {
            Some(r) => {
                let outcome = r.enrich_columns(&ctx, &baseline).await;
                settle(&ctx, "column enrichment", outcome, baseline)
            }
            None => baseline,
        };
        self.trace_out(&ctx.trace_id, OP, &columns);
        Ok(columns)
    }

    pub async fn primary_keys(&self, condition: &Condition) -> Result<Vec<PrimaryKey>, DriverError> {
        const OP: &str = "primaryKeys";
        let id = self.tracer.begin(OP, condition);
        let resolver = self.resolver();
        let ctx = self.context(id, OP);

        let condition = rewrite(resolver.as_ref(), condition);
        let baseline = self
            .driver
            .raw_primary_keys(&condition)
            .await
            .map_err(|e| self.primary_failed(&ctx.trace_id, OP, e))?;

        let keys = match resolver {
            Some(r) => {
                let outcome = r.enrich_primary_keys(&ctx, &baseline).await;
                settle(&ctx, "primary key enrichment", outcome, baseline)
            }
            None => baseline,
        };
        self.trace_out(&ctx.trace_id, OP, &keys);
        Ok(keys)
    }

    /// Describe a statement, and with `options.fetch` also run it.
    pub async fn query(&self, sql: &str, options: &QueryOptions) -> Result<QueryResult, DriverError> {
        const OP: &str = "query";
        let id = self.tracer.begin(OP, sql);
        let resolver = self.resolver();
        let ctx = self.context(id, OP);

        let baseline = self
            .driver
            .raw_query(sql, options)
            .await
            .map_err(|e| self.primary_failed(&ctx.trace_id, OP, e))?;

        let result = match resolver {
            Some(r) => {
                let outcome = r.enrich_query(&ctx, sql, &baseline).await;
                settle(&ctx, "query enrichment", outcome, baseline)
            }
            None => baseline,
        };
        self.trace_out(&ctx.trace_id, OP, &result);
        Ok(result)
    }

    /// Run a statement as is.
    pub async fn execute(&self, sql: &str) -> Result<ExecResult, DriverError> {
        const OP: &str = "execute";
        let id = self.tracer.begin(OP, sql);
        let result = self
            .driver
            .raw_execute(sql)
            .await
            .map_err(|e| self.primary_failed(&id, OP, e))?;
        self.trace_out(&id, OP, &result);
        Ok(result)
    }

    /// Run a statement and return its rows as text.
    pub async fn records(&self, sql: &str) -> Result<Records, DriverError> {
        const OP: &str = "records";
        let id = self.tracer.begin(OP, sql);
        let records = self
            .driver
            .raw_records(sql)
            .await
            .map_err(|e| self.primary_failed(&id, OP, e))?;
        self.tracer
            .end(&id, OP, format!("{} rows", records.len()));
        Ok(records)
    }

    fn resolver(&self) -> Option<Arc<dyn MetadataResolver>> {
        if !self.enrichment.enabled {
            return None;
        }
        dialects::get_registry().get(self.dialect())
    }

    fn context<'a>(&'a self, trace_id: TraceId, operation: &'a str) -> ResolveContext<'a> {
        ResolveContext::new(
            &self.driver,
            &self.tracer,
            trace_id,
            operation,
            self.enrichment.batch_size,
        )
    }

    fn trace_out<T: Serialize>(&self, id: &TraceId, operation: &str, value: &T) {
        if !self.tracer.is_enabled() {
            return;
        }
        match serde_json::to_string(value) {
            Ok(json) => self.tracer.end(id, operation, json),
            Err(e) => self.tracer.end(id, operation, format!("<unserializable: {}>", e)),
        }
    }

    fn primary_failed(&self, id: &TraceId, operation: &str, error: DriverError) -> DriverError {
        debug!("{} failed: {}", operation, error);
        self.tracer.end(id, operation, format!("error: {}", error));
        error
    }
}

fn rewrite(resolver: Option<&Arc<dyn MetadataResolver>>, condition: &Condition) -> Condition {
    match resolver {
        Some(r) => r.rewrite_condition(condition),
        None => condition.clone(),
    }
}

/// Enriched value, or the baseline after logging why enrichment failed.
fn settle<T>(
    ctx: &ResolveContext<'_>,
    step: &str,
    outcome: Result<T, EnrichmentError>,
    baseline: T,
) -> T {
    match outcome {
        Ok(value) => value,
        Err(e) => {
            ctx.skipped(step, &e);
            baseline
        }
    }
}
