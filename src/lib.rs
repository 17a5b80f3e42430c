//! Dialect-aware ODBC metadata normalization.
//!
//! [`OmniDb`] wraps a [`DriverSurface`] and corrects the catalog metadata it
//! reports (schemas, tables, columns, primary keys and described queries)
//! with the per-engine resolvers in [`dialects`].

pub mod dialects;
pub mod error;
pub mod executor;
pub mod facade;
pub mod model;
pub mod sql;
pub mod trace;

pub use dialects::Dialect;
pub use error::DriverError;
pub use executor::{DriverSurface, OdbcDriver};
pub use facade::OmniDb;
pub use model::{Condition, Config};
