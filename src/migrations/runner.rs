//! Migration runner
//!
//! Applies pending migrations upward in order, or reverts downward in reverse
//! order, one ledger entry per migration. A failed statement stops the run
//! with everything before it left applied.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Mutex;

use super::errors::{MigrationError, MigrationResult};
use super::{Migration, LEDGER_TABLE_DDL};
use crate::observability::Event;

/// Where migration statements run and where the ledger lives
pub trait SchemaTarget: Send + Sync {
    fn execute(&self, statement: &str) -> Result<(), String>;

    /// Versions currently recorded in the ledger
    fn recorded_versions(&self) -> Result<BTreeSet<u32>, String>;

    fn record_version(&self, version: u32) -> Result<(), String>;

    fn forget_version(&self, version: u32) -> Result<(), String>;
}

/// The only schema contract the rest of the service depends on
pub trait SchemaVersioning {
    /// Highest recorded version, 0 when nothing is applied
    fn current_version(&self) -> MigrationResult<u32>;

    /// Migrate up or down to exactly `version`
    fn apply_to(&self, version: u32) -> MigrationResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// One migration the runner would apply or revert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub version: u32,
    pub description: &'static str,
    pub direction: Direction,
    pub statement: &'static str,
}

pub struct MigrationRunner<'t> {
    migrations: &'static [Migration],
    target: &'t dyn SchemaTarget,
}

impl<'t> MigrationRunner<'t> {
    pub fn new(migrations: &'static [Migration], target: &'t dyn SchemaTarget) -> Self {
        Self { migrations, target }
    }

    /// Newest known version, 0 for an empty list
    pub fn latest_version(&self) -> u32 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    /// Steps that move the schema from `from` to `to`, in execution order
    pub fn plan(&self, from: u32, to: u32) -> MigrationResult<Vec<PlannedStep>> {
        self.check_known(from)?;
        self.check_known(to)?;

        let steps = if to >= from {
            self.migrations
                .iter()
                .filter(|m| m.version > from && m.version <= to)
                .map(|m| PlannedStep {
                    version: m.version,
                    description: m.description,
                    direction: Direction::Up,
                    statement: m.up,
                })
                .collect()
        } else {
            self.migrations
                .iter()
                .rev()
                .filter(|m| m.version <= from && m.version > to)
                .map(|m| PlannedStep {
                    version: m.version,
                    description: m.description,
                    direction: Direction::Down,
                    statement: m.down,
                })
                .collect()
        };
        Ok(steps)
    }

    fn check_known(&self, version: u32) -> MigrationResult<()> {
        if version == 0 || self.migrations.iter().any(|m| m.version == version) {
            Ok(())
        } else {
            Err(MigrationError::UnknownVersion(version))
        }
    }

    fn ensure_ledger(&self) -> MigrationResult<()> {
        self.target
            .execute(LEDGER_TABLE_DDL)
            .map_err(MigrationError::Ledger)
    }
}

impl SchemaVersioning for MigrationRunner<'_> {
    fn current_version(&self) -> MigrationResult<u32> {
        self.ensure_ledger()?;
        let versions = self
            .target
            .recorded_versions()
            .map_err(MigrationError::Ledger)?;
        Ok(versions.last().copied().unwrap_or(0))
    }

    fn apply_to(&self, version: u32) -> MigrationResult<()> {
        let current = self.current_version()?;

        for step in self.plan(current, version)? {
            let version = step.version;
            self.target
                .execute(step.statement)
                .map_err(|message| MigrationError::Statement { version, message })?;

            let v = version.to_string();
            match step.direction {
                Direction::Up => {
                    self.target
                        .record_version(version)
                        .map_err(MigrationError::Ledger)?;
                    Event::MigrationApplied
                        .emit(&[("version", &v), ("description", step.description)]);
                }
                Direction::Down => {
                    self.target
                        .forget_version(version)
                        .map_err(MigrationError::Ledger)?;
                    Event::MigrationReverted
                        .emit(&[("version", &v), ("description", step.description)]);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordedSchema {
    statements: Vec<String>,
    versions: BTreeSet<u32>,
    fail_on: Option<String>,
}

/// Target that records statements instead of running them
///
/// Used by `schema-plan` dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemorySchemaTarget {
    inner: Mutex<RecordedSchema>,
}

impl InMemorySchemaTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `versions` already in the ledger
    pub fn with_versions(versions: impl IntoIterator<Item = u32>) -> Self {
        let target = Self::default();
        if let Ok(mut inner) = target.inner.lock() {
            inner.versions.extend(versions);
        }
        target
    }

    /// Make any statement containing `fragment` fail
    pub fn fail_on(&self, fragment: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_on = Some(fragment.to_string());
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.statements.clone())
            .unwrap_or_default()
    }
}

impl SchemaTarget for InMemorySchemaTarget {
    fn execute(&self, statement: &str) -> Result<(), String> {
        let mut inner = self.inner.lock().map_err(|_| "Lock poisoned".to_string())?;
        if let Some(fragment) = &inner.fail_on {
            if statement.contains(fragment.as_str()) {
                return Err(format!("statement rejected: {}", fragment));
            }
        }
        inner.statements.push(statement.to_string());
        Ok(())
    }

    fn recorded_versions(&self) -> Result<BTreeSet<u32>, String> {
        let inner = self.inner.lock().map_err(|_| "Lock poisoned".to_string())?;
        Ok(inner.versions.clone())
    }

    fn record_version(&self, version: u32) -> Result<(), String> {
        let mut inner = self.inner.lock().map_err(|_| "Lock poisoned".to_string())?;
        inner.versions.insert(version);
        Ok(())
    }

    fn forget_version(&self, version: u32) -> Result<(), String> {
        let mut inner = self.inner.lock().map_err(|_| "Lock poisoned".to_string())?;
        inner.versions.remove(&version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::USERS_MIGRATIONS;

    static THREE: &[Migration] = &[
        Migration {
            version: 1,
            description: "one",
            up: "UP 1",
            down: "DOWN 1",
        },
        Migration {
            version: 2,
            description: "two",
            up: "UP 2",
            down: "DOWN 2",
        },
        Migration {
            version: 3,
            description: "three",
            up: "UP 3",
            down: "DOWN 3",
        },
    ];

    fn migration_statements(target: &InMemorySchemaTarget) -> Vec<String> {
        target
            .statements()
            .into_iter()
            .filter(|s| s != LEDGER_TABLE_DDL)
            .collect()
    }

    #[test]
    fn test_fresh_target_is_version_zero() {
        let target = InMemorySchemaTarget::new();
        let runner = MigrationRunner::new(THREE, &target);
        assert_eq!(runner.current_version().unwrap(), 0);
        assert_eq!(target.statements(), vec![LEDGER_TABLE_DDL.to_string()]);
    }

    #[test]
    fn test_apply_up_in_order() {
        let target = InMemorySchemaTarget::new();
        let runner = MigrationRunner::new(THREE, &target);
        runner.apply_to(2).unwrap();
        assert_eq!(runner.current_version().unwrap(), 2);
        assert_eq!(migration_statements(&target), vec!["UP 1", "UP 2"]);

        runner.apply_to(3).unwrap();
        assert_eq!(migration_statements(&target), vec!["UP 1", "UP 2", "UP 3"]);
    }

    #[test]
    fn test_revert_down_in_reverse() {
        let target = InMemorySchemaTarget::with_versions([1, 2, 3]);
        let runner = MigrationRunner::new(THREE, &target);
        runner.apply_to(1).unwrap();
        assert_eq!(runner.current_version().unwrap(), 1);
        assert_eq!(migration_statements(&target), vec!["DOWN 3", "DOWN 2"]);

        runner.apply_to(0).unwrap();
        assert_eq!(runner.current_version().unwrap(), 0);
    }

    #[test]
    fn test_same_version_is_noop() {
        let target = InMemorySchemaTarget::with_versions([1, 2]);
        let runner = MigrationRunner::new(THREE, &target);
        runner.apply_to(2).unwrap();
        assert!(migration_statements(&target).is_empty());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let target = InMemorySchemaTarget::new();
        let runner = MigrationRunner::new(THREE, &target);
        assert_eq!(runner.apply_to(7), Err(MigrationError::UnknownVersion(7)));
        assert!(migration_statements(&target).is_empty());
    }

    #[test]
    fn test_failure_keeps_earlier_migrations() {
        let target = InMemorySchemaTarget::new();
        target.fail_on("UP 2");
        let runner = MigrationRunner::new(THREE, &target);

        let err = runner.apply_to(3).unwrap_err();
        assert!(matches!(err, MigrationError::Statement { version: 2, .. }));
        assert_eq!(runner.current_version().unwrap(), 1);
    }

    #[test]
    fn test_plan_users_migrations() {
        let target = InMemorySchemaTarget::new();
        let runner = MigrationRunner::new(USERS_MIGRATIONS, &target);
        assert_eq!(runner.latest_version(), 2);

        let up = runner.plan(0, 2).unwrap();
        assert_eq!(up.len(), 2);
        assert!(up[0].statement.contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(up[1].statement.contains("minio_access_key"));

        let down = runner.plan(2, 0).unwrap();
        assert_eq!(down[0].version, 2);
        assert_eq!(down[0].direction, Direction::Down);
        assert_eq!(down[1].statement, "DROP TABLE IF EXISTS users;");

        // Planning never touches the target
        assert!(target.statements().is_empty());
    }

    #[test]
    fn test_runners_are_isolated() {
        let a = InMemorySchemaTarget::new();
        let b = InMemorySchemaTarget::new();
        MigrationRunner::new(THREE, &a).apply_to(3).unwrap();
        MigrationRunner::new(USERS_MIGRATIONS, &b).apply_to(1).unwrap();
        assert_eq!(MigrationRunner::new(THREE, &a).current_version().unwrap(), 3);
        assert_eq!(MigrationRunner::new(USERS_MIGRATIONS, &b).current_version().unwrap(), 1);
    }
}
