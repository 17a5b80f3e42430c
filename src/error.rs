use odbc_api::Error as OdbcError;

/// Errors raised by the driver surface on the primary path.
///
/// Connect and disconnect failures surface as `ConnectionFailed` (or `Odbc`),
/// rejected statements and failed catalog calls as `QueryFailed`. The facade
/// hands these back to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("ODBC error: {0}")]
    Odbc(#[from] OdbcError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Query execution failed: {0}")]
    QueryFailed(String),
}

impl DriverError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DriverError::ConnectionFailed(_) | DriverError::NotConnected)
    }
}
