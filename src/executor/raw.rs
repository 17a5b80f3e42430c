//! ODBC calls that odbc-api does not wrap: `SQLPrimaryKeys` and the string
//! valued column attributes.

use odbc_api::handles::{slice_to_cow_utf8, AsStatementRef, SqlChar, SqlResult, SqlText, Statement};
use odbc_api::sys::{Desc, HStmt, Len, Pointer, SmallInt, SqlReturn};
use odbc_api::{CursorImpl, Error};
use std::mem::size_of;
use std::ptr::{null, null_mut};

#[cfg(not(windows))]
use odbc_api::sys::SQLColAttribute as sql_col_attribute;
#[cfg(windows)]
use odbc_api::sys::SQLColAttributeW as sql_col_attribute;

/// Initial buffer for string attributes, in characters.
const ATTRIBUTE_BUFFER_CHARS: usize = 256;

#[cfg_attr(windows, link(name = "odbc32"))]
#[cfg_attr(not(windows), link(name = "odbc"))]
unsafe extern "system" {
    #[cfg_attr(not(windows), link_name = "SQLPrimaryKeys")]
    #[cfg_attr(windows, link_name = "SQLPrimaryKeysW")]
    fn sql_primary_keys(
        statement_handle: HStmt,
        catalog_name: *const SqlChar,
        catalog_name_length: SmallInt,
        schema_name: *const SqlChar,
        schema_name_length: SmallInt,
        table_name: *const SqlChar,
        table_name_length: SmallInt,
    ) -> SqlReturn;
}

fn sql_result(ret: SqlReturn, function: &'static str) -> SqlResult<()> {
    match ret {
        SqlReturn::SUCCESS => SqlResult::Success(()),
        SqlReturn::SUCCESS_WITH_INFO => SqlResult::SuccessWithInfo(()),
        _ => SqlResult::Error { function },
    }
}

/// Pointer and length of an optional argument; `None` is passed as NULL.
fn text_arg(text: Option<&SqlText>) -> (*const SqlChar, SmallInt) {
    match text {
        Some(text) => (
            text.ptr(),
            SmallInt::try_from(text.len_char()).unwrap_or(SmallInt::MAX),
        ),
        None => (null(), 0),
    }
}

/// Cursor over `SQLPrimaryKeys`, with the standard columns `TABLE_CAT`,
/// `TABLE_SCHEM`, `TABLE_NAME`, `COLUMN_NAME`, `KEY_SEQ` and `PK_NAME`.
pub fn primary_keys<S>(
    mut statement: S,
    catalog: Option<&str>,
    schema: Option<&str>,
    table: &str,
) -> Result<CursorImpl<S>, Error>
where
    S: AsStatementRef,
{
    let catalog = catalog.map(SqlText::new);
    let schema = schema.map(SqlText::new);
    let table = SqlText::new(table);
    let (catalog_ptr, catalog_len) = text_arg(catalog.as_ref());
    let (schema_ptr, schema_len) = text_arg(schema.as_ref());
    let (table_ptr, table_len) = text_arg(Some(&table));

    let stmt = statement.as_stmt_ref();
    let ret = unsafe {
        sql_primary_keys(
            stmt.as_sys(),
            catalog_ptr,
            catalog_len,
            schema_ptr,
            schema_len,
            table_ptr,
            table_len,
        )
    };
    sql_result(ret, "SQLPrimaryKeys").into_result(&stmt)?;

    // SQLPrimaryKeys leaves the statement in cursor state.
    Ok(unsafe { CursorImpl::new(statement) })
}

/// A character valued column attribute such as `SQL_DESC_BASE_TABLE_NAME`.
/// Drivers that do not know the attribute report an empty string.
pub fn string_col_attribute(
    stmt: &impl Statement,
    attribute: Desc,
    column_number: u16,
) -> Result<String, Error> {
    let mut buffer: Vec<SqlChar> = vec![0; ATTRIBUTE_BUFFER_CHARS];
    loop {
        let mut length_in_bytes: SmallInt = 0;
        let buffer_bytes = SmallInt::try_from(buffer.len() * size_of::<SqlChar>())
            .unwrap_or(SmallInt::MAX);
        let ret = unsafe {
            sql_col_attribute(
                stmt.as_sys(),
                column_number,
                attribute,
                buffer.as_mut_ptr() as Pointer,
                buffer_bytes,
                &mut length_in_bytes,
                null_mut::<Len>(),
            )
        };
        sql_result(ret, "SQLColAttribute").into_result(stmt)?;

        let required = attribute_chars(length_in_bytes);
        if required >= buffer.len() && buffer.len() < SmallInt::MAX as usize / 2 {
            buffer.resize(required + 1, 0);
            continue;
        }
        return Ok(decode_attribute(&buffer, required));
    }
}

/// `SQL_DESC_AUTO_UNIQUE_VALUE` as a flag.
pub fn auto_unique_value(stmt: &impl Statement, column_number: u16) -> bool {
    // AutoUniqueValue is a numeric attribute.
    match unsafe { stmt.numeric_col_attribute(Desc::AutoUniqueValue, column_number) } {
        SqlResult::Success(value) | SqlResult::SuccessWithInfo(value) => value != 0,
        _ => false,
    }
}

/// Reported length in characters. Some drivers report characters where
/// bytes are expected, so the byte count is not divided for wide builds.
fn attribute_chars(length_in_bytes: SmallInt) -> usize {
    length_in_bytes.max(0) as usize
}

/// Text up to `chars` characters or the first terminating zero.
fn decode_attribute(buffer: &[SqlChar], chars: usize) -> String {
    let end = buffer
        .iter()
        .take(chars)
        .position(|c| *c == 0)
        .unwrap_or(chars.min(buffer.len()));
    slice_to_cow_utf8(&buffer[..end]).into_owned()
}
