use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// DBMS and driver names reported by the live connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionIdentity {
    pub dbms: String,
    pub driver: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub catalog: String,
    pub name: String,
    pub remarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub catalog: String,
    pub schema: String,
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: String,
    pub remarks: String,
}

impl Table {
    pub fn new(catalog: &str, schema: &str, name: &str) -> Self {
        Self {
            catalog: catalog.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
            table_type: "TABLE".to_string(),
            remarks: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_class: String,
    pub size: u64,
    pub decimal_digits: i16,
    pub num_prec: i16,
    pub remarks: String,
    pub default: String,
    pub nullable: bool,
}

impl Column {
    pub fn new(catalog: &str, schema: &str, table: &str, name: &str) -> Self {
        Self {
            catalog: catalog.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub column: String,
    pub seq: i16,
    /// Constraint name.
    pub primary_key: String,
}

/// One result column of a described statement.
///
/// `catalog`, `schema`, `table` and `column` name the physical source when
/// the driver can report it. `guessed_schema` and `guessed_table` are only
/// filled by lineage resolution when the exact source is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryColumn {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_class: String,
    pub nullable: bool,
    pub auto_increment: bool,
    pub size: u64,
    pub decimal_digits: i16,
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guessed_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guessed_table: Option<String>,
}

impl QueryColumn {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// True when neither an exact nor a guessed source is known.
    pub fn lacks_source(&self) -> bool {
        self.schema.is_empty()
            && self.table.is_empty()
            && self.guessed_schema.is_none()
            && self.guessed_table.is_none()
    }

    /// Base column name, falling back to the result column name.
    pub fn source_column(&self) -> &str {
        if self.column.is_empty() {
            &self.name
        } else {
            &self.column
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParam {
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_class: String,
    pub size: u64,
    pub decimal_digits: i16,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<QueryColumn>,
    pub params: Vec<QueryParam>,
    pub records: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Report column labels alongside names.
    #[serde(default)]
    pub label: bool,
    /// Execute the statement and return its rows, not only its shape.
    #[serde(default)]
    pub fetch: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub success: bool,
}

/// Rows of an ad hoc statement plus a name to position index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Records {
    pub records: Vec<Vec<Option<String>>>,
    pub column_index: HashMap<String, usize>,
}

impl Records {
    pub fn new(columns: &[&str], records: Vec<Vec<Option<String>>>) -> Self {
        let mut column_index = HashMap::new();
        for (i, name) in columns.iter().enumerate() {
            column_index.entry(name.to_string()).or_insert(i);
        }
        Self {
            records,
            column_index,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a column, matched exactly first and then ignoring ASCII
    /// case. Among names differing only by case the leftmost column wins.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied().or_else(|| {
            self.column_index
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, i)| *i)
                .min()
        })
    }

    /// Non-null text at `(row, column)`.
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.records
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|v| v.as_deref())
    }

    /// First column of the first row, if any.
    pub fn first_value(&self) -> Option<&str> {
        self.value(0, 0)
    }

    /// Append the rows of another result of the same statement shape.
    pub fn extend(&mut self, other: Records) {
        if self.column_index.is_empty() {
            self.column_index = other.column_index;
        }
        self.records.extend(other.records);
    }
}

/// Filter for catalog calls.
///
/// `None` means "driver default / current"; a value is either exact or a
/// `%` wildcard pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn table_type(mut self, table_type: impl Into<String>) -> Self {
        self.table_type = Some(table_type.into());
        self
    }

    /// Blank strings are treated the same as omitted fields.
    pub fn normalized(&self) -> Self {
        fn keep(v: &Option<String>) -> Option<String> {
            v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
        }
        Self {
            catalog: keep(&self.catalog),
            schema: keep(&self.schema),
            table: keep(&self.table),
            column: keep(&self.column),
            table_type: keep(&self.table_type),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}
