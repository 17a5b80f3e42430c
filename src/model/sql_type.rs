//! ODBC SQL type codes mapped to their constant names and a coarse class.

pub const SQL_VARCHAR: &str = "SQL_VARCHAR";
pub const SQL_WVARCHAR: &str = "SQL_WVARCHAR";
pub const SQL_LONGVARCHAR: &str = "SQL_LONGVARCHAR";
pub const SQL_WLONGVARCHAR: &str = "SQL_WLONGVARCHAR";

pub const CLASS_STRING: &str = "String";
pub const CLASS_UNKNOWN: &str = "Unknown";

const SQL_TYPES: &[(i16, &str, &str)] = &[
    (1, "SQL_CHAR", "String"),
    (12, SQL_VARCHAR, "String"),
    (-1, SQL_LONGVARCHAR, "String"),
    (-8, "SQL_WCHAR", "String"),
    (-9, SQL_WVARCHAR, "String"),
    (-10, SQL_WLONGVARCHAR, "String"),
    (3, "SQL_DECIMAL", "Number"),
    (2, "SQL_NUMERIC", "Number"),
    (5, "SQL_SMALLINT", "Number"),
    (4, "SQL_INTEGER", "Number"),
    (7, "SQL_REAL", "Number"),
    (6, "SQL_FLOAT", "Number"),
    (8, "SQL_DOUBLE", "Number"),
    (-7, "SQL_BIT", "Number"),
    (-6, "SQL_TINYINT", "Number"),
    (-5, "SQL_BIGINT", "Number"),
    (-2, "SQL_BINARY", "Binary"),
    (-3, "SQL_VARBINARY", "Binary"),
    (-4, "SQL_LONGVARBINARY", "Binary"),
    (91, "SQL_TYPE_DATE", "Date"),
    (9, "SQL_TYPE_DATE", "Date"),
    (92, "SQL_TYPE_TIME", "Time"),
    (10, "SQL_TYPE_TIME", "Time"),
    (93, "SQL_TYPE_TIMESTAMP", "DateTime"),
    (11, "SQL_TYPE_TIMESTAMP", "DateTime"),
    (101, "SQL_INTERVAL_YEAR", "Number"),
    (102, "SQL_INTERVAL_MONTH", "Number"),
    (103, "SQL_INTERVAL_DAY", "Number"),
    (104, "SQL_INTERVAL_HOUR", "Number"),
    (105, "SQL_INTERVAL_MINUTE", "Number"),
    (106, "SQL_INTERVAL_SECOND", "Number"),
    (107, "SQL_INTERVAL_YEAR_TO_MONTH", "Number"),
    (108, "SQL_INTERVAL_DAY_TO_HOUR", "Number"),
    (109, "SQL_INTERVAL_DAY_TO_MINUTE", "Number"),
    (110, "SQL_INTERVAL_DAY_TO_SECOND", "Number"),
    (111, "SQL_INTERVAL_HOUR_TO_MINUTE", "Number"),
    (112, "SQL_INTERVAL_HOUR_TO_SECOND", "Number"),
    (113, "SQL_INTERVAL_MINUTE_TO_SECOND", "Number"),
    (-11, "SQL_GUID", "Guid"),
];

pub fn type_name(code: i16) -> &'static str {
    lookup(code).map(|(_, name, _)| *name).unwrap_or("SQL_UNKNOWN_TYPE")
}

pub fn type_class(code: i16) -> &'static str {
    lookup(code).map(|(_, _, class)| *class).unwrap_or(CLASS_UNKNOWN)
}

fn lookup(code: i16) -> Option<&'static (i16, &'static str, &'static str)> {
    SQL_TYPES.iter().find(|(c, _, _)| *c == code)
}
