use crate::cli::{MigrateAction, MigrateArgs};
use crate::guard;
use crate::project::Project;
use anyhow::Context;
use rowbase::{MigrationStatus, Migrator, display_name};

pub async fn run(args: MigrateArgs, project: &Project) -> anyhow::Result<()> {
    let core = project.resolve_database(args.database.as_deref())?;
    let db = project.orm().db(&core)?;

    let decision = guard::migrate_decision(args.action, args.force, db.config(), project.orm());
    guard::enforce(decision, project, "Canceled migration (app in production)").await?;

    let migrator = Migrator::new(db, project.migrations_for(&core))
        .with_context(|| format!("invalid migrations for {core}"))?;

    match args.action {
        Some(MigrateAction::Status) => {
            let status = migrator.status().await?;
            print_status(&core, &status);
        }
        Some(MigrateAction::Drop) => drop_all(&migrator, &core).await?,
        Some(MigrateAction::Fresh) => {
            let done = migrator.fresh(args.steps).await?;
            println!("Dropped all tables from {core}");
            report_up(&done);
        }
        Some(MigrateAction::Down) => {
            let done = migrator.down(args.steps.unwrap_or(1)).await?;
            if done.is_empty() {
                println!("Nothing to roll back");
            }
            for name in &done {
                println!("Rolled back {}", display_name(name));
            }
        }
        Some(MigrateAction::Up) => report_up(&migrator.up(Some(args.steps.unwrap_or(1))).await?),
        None => report_up(&migrator.up(args.steps).await?),
    }
    Ok(())
}

async fn drop_all(migrator: &Migrator, core: &str) -> anyhow::Result<()> {
    migrator.drop_all().await?;
    println!("Dropped all tables from {core}");
    Ok(())
}

fn report_up(done: &[String]) {
    if done.is_empty() {
        println!("Already up to date");
    }
    for name in done {
        println!("Migrated {}", display_name(name));
    }
}

/// One line per local migration, with its date when applied.
pub fn format_status(core: &str, status: &MigrationStatus) -> Vec<String> {
    if status.local.is_empty() {
        return vec![format!("{core} has no migrations")];
    }
    let names: Vec<String> = status.local.iter().map(|n| display_name(n)).collect();
    let width = names.iter().map(String::len).max().unwrap_or(4).max(4);

    let mut lines = vec![format!(" ✓  {:<width$}  Date Migrated", "Name")];
    for (local, name) in status.local.iter().zip(&names) {
        match status.applied.iter().find(|m| &m.name == local) {
            Some(applied) => {
                let at = applied
                    .migrated_at
                    .map(|at| at.format("%b %e %Y %l:%M%P").to_string())
                    .unwrap_or_default();
                lines.push(format!(" ✓  {name:<width$}  {at}"));
            }
            None => lines.push(format!("    {name}")),
        }
    }
    for missing in &status.missing_local {
        lines.push(format!(" ?  {}  (not defined locally)", display_name(&missing.name)));
    }
    lines
}

fn print_status(core: &str, status: &MigrationStatus) {
    for line in format_status(core, status) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rowbase::AppliedMigration;

    #[test]
    fn status_lines() {
        let status = MigrationStatus {
            local: vec![
                "2024_01_01_120000_create_post".to_string(),
                "2024_02_01_120000_create_tag".to_string(),
            ],
            applied: vec![AppliedMigration {
                name: "2024_01_01_120000_create_post".to_string(),
                migrated_at: NaiveDate::from_ymd_opt(2024, 1, 5)
                    .and_then(|d| d.and_hms_opt(15, 4, 0)),
            }],
            pending: vec!["2024_02_01_120000_create_tag".to_string()],
            missing_local: Vec::new(),
        };
        let lines = format_status("main", &status);
        assert_eq!(lines[0], " ✓  Name         Date Migrated");
        assert_eq!(lines[1], " ✓  create post  Jan  5 2024  3:04pm");
        assert_eq!(lines[2], "    create tag");
    }

    #[test]
    fn no_migrations() {
        assert_eq!(
            format_status("main", &MigrationStatus::default()),
            vec!["main has no migrations"]
        );
    }
}
