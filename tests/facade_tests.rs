mod common;

use common::connected;
use omnidb::dialects::postgres::PostgresResolver;
use omnidb::dialects::{self, Dialect, MetadataResolver, ResolveContext};
use omnidb::executor::scripted::{rows, ScriptedDriver};
use omnidb::model::{
    sql_type, Column, Condition, Config, PrimaryKey, QueryColumn, QueryOptions, QueryResult,
    Records, Table,
};
use omnidb::trace::{TraceId, Tracer};
use omnidb::OmniDb;

const UNBOUNDED: u64 = 9_007_199_254_740_990;

fn table(schema: &str, name: &str, remarks: &str) -> Table {
    Table {
        remarks: remarks.to_string(),
        ..Table::new("", schema, name)
    }
}

fn table_comments(data: &[&[Option<&str>]]) -> Records {
    Records::new(&["name", "schema_name", "table_name", "remarks"], rows(data))
}

#[test]
fn test_detection_is_case_insensitive_for_every_product() {
    for dbms in [
        "DB2/400 SQL",
        "MySQL 8.0",
        "MariaDB",
        "PostgreSQL 16",
        "Microsoft SQL Server",
        "Oracle",
    ] {
        let dialect = dialects::detect(dbms);
        assert_ne!(dialect, Dialect::Generic, "{}", dbms);
        assert_eq!(dialects::detect(&dbms.to_lowercase()), dialect);
        assert_eq!(dialects::detect(&dbms.to_uppercase()), dialect);
    }
}

#[tokio::test]
async fn test_mysql_tables_catalog_mirrors_schema() {
    let driver = ScriptedDriver::new("MySQL", "libmaodbc.so")
        .with_tables(vec![Table::new("", "test", "t1")]);
    let db = connected(driver).await;

    let tables = db.tables(&Condition::new().schema("test")).await.unwrap();
    assert_eq!(tables, vec![Table::new("test", "test", "t1")]);

    // The catalog filter is filled in before the driver sees the condition
    let sent = &db.surface().conditions()[0];
    assert_eq!(sent.catalog.as_deref(), Some("test"));
    assert_eq!(sent.schema.as_deref(), Some("test"));
}

#[tokio::test]
async fn test_mysql_primary_keys_are_merged() {
    let key = PrimaryKey {
        catalog: "shop".to_string(),
        table: "orders".to_string(),
        column: "id".to_string(),
        seq: 1,
        primary_key: "PRIMARY".to_string(),
        ..PrimaryKey::default()
    };
    let driver = ScriptedDriver::new("MariaDB", "").with_primary_keys(vec![key]);
    let db = connected(driver).await;

    let keys = db.primary_keys(&Condition::new().table("orders")).await.unwrap();
    assert_eq!(keys[0].catalog, "shop");
    assert_eq!(keys[0].schema, "shop");
    assert_eq!(keys[0].primary_key, "PRIMARY");
}

#[tokio::test]
async fn test_oracle_schemas_exclude_system_accounts() {
    let driver = ScriptedDriver::new("Oracle", "").with_tables(vec![
        Table::new("", "SYS", "DUAL"),
        Table::new("", "APP1", "EMP"),
        Table::new("", "APP1", "DEPT"),
    ]);
    let db = connected(driver).await;

    let schemas = db.schemas(&Condition::new()).await.unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].name, "APP1");
    assert_eq!(schemas[0].remarks, "");
}

#[tokio::test]
async fn test_postgres_schema_comments() {
    let driver = ScriptedDriver::new("PostgreSQL", "")
        .with_tables(vec![Table::new("", "public", "t1"), Table::new("", "sales", "t2")])
        .respond(
            "pg_namespace",
            Records::new(
                &["schema_name", "schema_comment"],
                rows(&[&[Some("sales"), Some("Sales data")]]),
            ),
        );
    let db = connected(driver).await;

    let schemas = db.schemas(&Condition::new()).await.unwrap();
    let names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["public", "sales"]);
    assert_eq!(schemas[0].remarks, "");
    assert_eq!(schemas[1].remarks, "Sales data");
}

#[tokio::test]
async fn test_existing_remarks_survive_and_order_is_kept() {
    let driver = ScriptedDriver::new("PostgreSQL", "")
        .with_tables(vec![
            table("app", "t2", "kept"),
            table("app", "t1", ""),
            table("app", "t3", ""),
        ])
        .respond(
            "pg_class",
            table_comments(&[
                &[Some("app.t1"), Some("app"), Some("t1"), Some("first")],
                &[Some("app.t2"), Some("app"), Some("t2"), Some("replacement")],
            ]),
        );
    let db = connected(driver).await;

    let tables = db.tables(&Condition::new().schema("app")).await.unwrap();
    let summary: Vec<_> = tables
        .iter()
        .map(|t| (t.name.as_str(), t.remarks.as_str()))
        .collect();
    assert_eq!(summary, vec![("t2", "kept"), ("t1", "first"), ("t3", "")]);
}

#[tokio::test]
async fn test_table_enrichment_is_idempotent() {
    let driver = ScriptedDriver::new("PostgreSQL", "").connected().respond(
        "pg_class",
        table_comments(&[&[Some("app.t1"), Some("app"), Some("t1"), Some("first")]]),
    );
    let tracer = Tracer::disabled();
    let ctx = ResolveContext::new(&driver, &tracer, TraceId::generate(), "tables", 500);
    let input = vec![table("app", "t1", ""), table("app", "t9", "")];

    let once = PostgresResolver.enrich_tables(&ctx, &input).await.unwrap();
    let twice = PostgresResolver.enrich_tables(&ctx, &once).await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.len(), input.len());
}

#[tokio::test]
async fn test_empty_filter_set_issues_no_statement() {
    let driver = ScriptedDriver::new("PostgreSQL", "")
        .with_tables(vec![table("", "t1", ""), table("app", "", "")])
        .with_columns(vec![Column::new("", "", "t1", "id")]);
    let db = connected(driver).await;

    let tables = db.tables(&Condition::new()).await.unwrap();
    let columns = db.columns(&Condition::new()).await.unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(columns.len(), 1);
    assert!(db.surface().issued().is_empty());
}

#[tokio::test]
async fn test_failed_enrichment_returns_baseline() {
    let baseline = vec![table("app", "t1", ""), table("app", "t2", "")];
    let driver = ScriptedDriver::new("PostgreSQL", "")
        .with_tables(baseline.clone())
        .fail("pg_class", "permission denied for table pg_description");
    let db = connected(driver).await;

    let tables = db.tables(&Condition::new()).await.unwrap();
    assert_eq!(tables, baseline);
}

#[tokio::test]
async fn test_filter_lists_are_batched() {
    let tables: Vec<Table> = (1..=5).map(|i| table("app", &format!("t{}", i), "")).collect();
    let driver = ScriptedDriver::new("PostgreSQL", "").with_tables(tables);
    let mut config = Config::default();
    config.enrichment.batch_size = 2;
    let mut db = OmniDb::with_config(driver, &config);
    db.connect("DSN=pg").await.unwrap();

    db.tables(&Condition::new()).await.unwrap();
    assert_eq!(db.surface().count_matching("pg_class"), 3);
}

#[tokio::test]
async fn test_freetds_zero_sizes_become_unbounded() {
    let mut text = Column::new("", "dbo", "notes", "body");
    text.size = 0;
    let mut code = Column::new("", "dbo", "notes", "code");
    code.size = 40;
    let driver = ScriptedDriver::new("Microsoft SQL Server", "/usr/lib/libtdsodbc.so")
        .with_columns(vec![text.clone(), code.clone()])
        .fail("sys.extended_properties", "permission denied");
    let db = connected(driver).await;
    assert_eq!(db.dialect(), Dialect::MsSqlFreeTds);

    let columns = db.columns(&Condition::new()).await.unwrap();
    assert_eq!(columns[0].size, UNBOUNDED);
    assert_eq!(columns[1].size, 40);
}

#[tokio::test]
async fn test_native_mssql_keeps_zero_sizes() {
    let text = Column::new("", "dbo", "notes", "body");
    let driver = ScriptedDriver::new("Microsoft SQL Server", "msodbcsql18").with_columns(vec![text]);
    let db = connected(driver).await;
    assert_eq!(db.dialect(), Dialect::MsSql);

    let columns = db.columns(&Condition::new()).await.unwrap();
    assert_eq!(columns[0].size, 0);
}

#[tokio::test]
async fn test_oracle_query_lineage_through_facade() {
    let result = QueryResult {
        columns: vec![QueryColumn::named("ENAME")],
        ..QueryResult::default()
    };
    let driver = ScriptedDriver::new("Oracle", "")
        .with_query_result(result)
        .respond(
            "OBJECT_INSTANCE",
            Records::new(
                &["OBJECT_OWNER", "OBJECT_NAME", "PROJECTION"],
                rows(&[&[Some("APP"), Some("EMP"), Some(r#""EMP"."ENAME"[VARCHAR2,10]"#)]]),
            ),
        );
    let db = connected(driver).await;

    let described = db
        .query("SELECT ENAME FROM EMP WHERE EMPNO = ?", &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(described.columns[0].guessed_schema.as_deref(), Some("APP"));
    assert_eq!(described.columns[0].guessed_table.as_deref(), Some("EMP"));
    assert_eq!(db.surface().count_matching("DELETE FROM"), 1);
}

#[tokio::test]
async fn test_current_schema_by_dialect() {
    let driver = ScriptedDriver::new("PostgreSQL", "").respond(
        "current_schema()",
        Records::new(&["current_schema"], rows(&[&[Some("public")]])),
    );
    let db = connected(driver).await;
    assert_eq!(db.current_schema().await.unwrap(), "public");

    // No row yields an empty schema
    let db = connected(ScriptedDriver::new("Microsoft SQL Server", "")).await;
    assert_eq!(db.current_schema().await.unwrap(), "");

    let failing = ScriptedDriver::new("MySQL", "").fail("DATABASE()", "gone away");
    let db = connected(failing).await;
    assert_eq!(db.current_schema().await.unwrap(), "");
}

#[tokio::test]
async fn test_generic_dialect_passes_through() {
    let baseline = vec![table("main", "t1", "")];
    let driver = ScriptedDriver::new("SQLite", "").with_tables(baseline.clone());
    let db = connected(driver).await;
    assert_eq!(db.dialect(), Dialect::Generic);

    assert_eq!(db.tables(&Condition::new()).await.unwrap(), baseline);
    assert_eq!(db.current_schema().await.unwrap(), "");
    let schemas = db.schemas(&Condition::new()).await.unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].name, "main");
    assert!(db.surface().issued().is_empty());
}

#[tokio::test]
async fn test_column_enrichment_is_idempotent_and_keeps_order() {
    let mut tags = Column::new("", "app", "t1", "tags");
    tags.type_name = sql_type::SQL_VARCHAR.to_string();
    tags.size = 255;
    let id = Column::new("", "app", "t1", "id");
    let orphan = Column::new("", "app", "t9", "x");
    let driver = ScriptedDriver::new("PostgreSQL", "").connected().respond(
        "pg_stat_user_tables",
        Records::new(
            &["name", "schema_name", "table_name", "column_name", "data_type", "remarks"],
            rows(&[
                &[Some("app.t1"), Some("app"), Some("t1"), Some("id"), Some("integer"), Some("key")],
                &[Some("app.t1"), Some("app"), Some("t1"), Some("tags"), Some("ARRAY"), None],
            ]),
        ),
    );
    let tracer = Tracer::disabled();
    let ctx = ResolveContext::new(&driver, &tracer, TraceId::generate(), "columns", 500);
    let input = vec![tags, orphan, id];

    let once = PostgresResolver.enrich_columns(&ctx, &input).await.unwrap();
    let twice = PostgresResolver.enrich_columns(&ctx, &once).await.unwrap();
    assert_eq!(once, twice);

    let names: Vec<_> = once.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["tags", "x", "id"]);
    assert_eq!(once[0].type_name, sql_type::SQL_LONGVARCHAR);
    assert_eq!(once[2].remarks, "key");
    assert_eq!(once[1], input[1]);
}

#[tokio::test]
async fn test_oracle_table_comments_through_facade() {
    let driver = ScriptedDriver::new("Oracle", "")
        .with_tables(vec![table("APP", "EMP", ""), table("APP", "DEPT", "")])
        .respond(
            "ALL_TAB_COMMENTS",
            Records::new(
                &["NAME", "SCHEMA_NAME", "TABLE_NAME", "REMARKS"],
                rows(&[&[Some("APP.EMP"), Some("APP"), Some("EMP"), Some("Employees")]]),
            ),
        );
    let db = connected(driver).await;

    let tables = db.tables(&Condition::new().schema("APP")).await.unwrap();
    assert_eq!(tables[0].remarks, "Employees");
    assert_eq!(tables[1].remarks, "");

    let issued = db.surface().issued();
    assert_eq!(issued.len(), 1);
    assert!(issued[0].contains("'APP.EMP','APP.DEPT'"));
}

#[tokio::test]
async fn test_mssql_column_comments_are_patched() {
    let mut body = Column::new("", "dbo", "notes", "body");
    body.size = 0;
    let code = Column::new("", "dbo", "notes", "code");
    let driver = ScriptedDriver::new("Microsoft SQL Server", "/usr/lib/libtdsodbc.so")
        .with_columns(vec![body, code])
        .respond(
            "sys.columns",
            Records::new(
                &["schema_name", "table_name", "name", "column_name", "remarks"],
                rows(&[&[
                    Some("dbo"),
                    Some("notes"),
                    Some("dbo.notes"),
                    Some("body"),
                    Some("Note text"),
                ]]),
            ),
        );
    let db = connected(driver).await;

    let columns = db.columns(&Condition::new().table("notes")).await.unwrap();
    assert_eq!(columns[0].remarks, "Note text");
    assert_eq!(columns[0].size, UNBOUNDED);
    assert_eq!(columns[1].remarks, "");
}
