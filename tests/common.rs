#![allow(dead_code)]

use assert_cmd::Command;
use omnidb::executor::ScriptedDriver;
use omnidb::OmniDb;

/// Returns a configured Command for `omnidb`
pub fn omnidb_cmd() -> Command {
    Command::cargo_bin("omnidb").expect("Binary not found")
}

/// Facade over a scripted driver that is already connected.
pub async fn connected(driver: ScriptedDriver) -> OmniDb<ScriptedDriver> {
    let mut db = OmniDb::new(driver);
    assert!(db.connect("DSN=scripted").await.expect("scripted connect"));
    db
}
