use crate::cli::SeedArgs;
use crate::guard;
use crate::project::{Project, Seed};
use std::sync::Arc;
use std::time::Instant;

pub async fn run(args: SeedArgs, project: &Project) -> anyhow::Result<()> {
    let core = project.resolve_database(args.database.as_deref())?;
    let db = project.orm().db(&core)?;

    guard::enforce(guard::seed_decision(args.force, project.orm()), project, "Seed canceled").await?;

    let available = project.seeds_for(&core);
    let selected: Vec<&Arc<dyn Seed>> = match args.name.as_deref() {
        Some(name) => {
            let Some(seed) = available.iter().find(|s| s.name() == name) else {
                anyhow::bail!("Seed \"{name}\" not found");
            };
            vec![seed]
        }
        None => available.iter().collect(),
    };
    if selected.is_empty() {
        println!("No seeds available");
        return Ok(());
    }

    let count = args.count.unwrap_or(1);
    for seed in selected {
        match seed.description() {
            Some(description) => println!("Seeding {} ({description})...", seed.name()),
            None => println!("Seeding {}...", seed.name()),
        }
        let started = Instant::now();
        seed.exec(&db, count).await?;
        println!("Seeded {} x{count} in {:?}", seed.name(), started.elapsed());
    }
    Ok(())
}
