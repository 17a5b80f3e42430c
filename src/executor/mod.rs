pub mod connection;
pub mod driver;
mod raw;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use connection::OdbcDriver;
pub use driver::DriverSurface;
#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedDriver;
