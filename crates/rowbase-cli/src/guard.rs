//! Safety checks run before destructive commands.

use crate::cli::MigrateAction;
use crate::project::Project;
use rowbase::{DbConfig, Orm, OrmError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    /// Ask the operator; carries the prompt.
    Confirm(String),
    /// Refuse outright; carries the reason.
    Refuse(String),
}

/// Remote or protected databases need `--force`; production needs a
/// confirmation unless in maintenance mode. `status` is always allowed.
pub fn migrate_decision(
    action: Option<MigrateAction>,
    force: bool,
    config: &DbConfig,
    orm: &Orm,
) -> Decision {
    if force || action == Some(MigrateAction::Status) {
        return Decision::Proceed;
    }
    if !config.is_localhost() {
        return Decision::Refuse("Canceled migration (not on localhost)".to_string());
    }
    if config.protected {
        return Decision::Refuse("Canceled migration (protected)".to_string());
    }
    if orm.is_production() && !orm.maintenance_mode() {
        return Decision::Confirm("App is in production! Are you sure you want to migrate?".to_string());
    }
    Decision::Proceed
}

pub fn seed_decision(force: bool, orm: &Orm) -> Decision {
    if !force && orm.is_production() {
        return Decision::Confirm("App is in production! Are you sure you want to seed?".to_string());
    }
    Decision::Proceed
}

/// Turn a decision into a go-ahead or an [`OrmError::Guard`].
pub async fn enforce(decision: Decision, project: &Project, canceled: &str) -> Result<(), OrmError> {
    match decision {
        Decision::Proceed => Ok(()),
        Decision::Refuse(reason) => Err(OrmError::guard(reason)),
        Decision::Confirm(prompt) => {
            if project.confirm(&prompt).await {
                Ok(())
            } else {
                Err(OrmError::guard(canceled))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowbase::{Mode, MockExecutor};

    fn orm(mode: Mode, maintenance: bool) -> Orm {
        Orm::builder()
            .mode(mode)
            .maintenance_mode(maintenance)
            .executor(MockExecutor::new())
            .build()
            .unwrap()
    }

    #[test]
    fn remote_and_protected_need_force() {
        let dev = orm(Mode::Development, false);
        let remote = DbConfig::new("app").host("db.internal");
        assert_eq!(
            migrate_decision(None, false, &remote, &dev),
            Decision::Refuse("Canceled migration (not on localhost)".to_string())
        );
        assert_eq!(migrate_decision(None, true, &remote, &dev), Decision::Proceed);

        let protected = DbConfig::new("app").protected(true);
        assert!(matches!(
            migrate_decision(Some(MigrateAction::Fresh), false, &protected, &dev),
            Decision::Refuse(_)
        ));
    }

    #[test]
    fn status_is_always_allowed() {
        let prod = orm(Mode::Production, false);
        let remote = DbConfig::new("app").host("db.internal").protected(true);
        assert_eq!(
            migrate_decision(Some(MigrateAction::Status), false, &remote, &prod),
            Decision::Proceed
        );
    }

    #[test]
    fn production_asks_unless_in_maintenance() {
        let local = DbConfig::new("app");
        assert!(matches!(
            migrate_decision(Some(MigrateAction::Up), false, &local, &orm(Mode::Production, false)),
            Decision::Confirm(_)
        ));
        assert_eq!(
            migrate_decision(Some(MigrateAction::Up), false, &local, &orm(Mode::Production, true)),
            Decision::Proceed
        );
    }

    #[test]
    fn seeding_in_production_asks_even_in_maintenance() {
        assert!(matches!(seed_decision(false, &orm(Mode::Production, true)), Decision::Confirm(_)));
        assert_eq!(seed_decision(true, &orm(Mode::Production, false)), Decision::Proceed);
        assert_eq!(seed_decision(false, &orm(Mode::Development, false)), Decision::Proceed);
    }
}
