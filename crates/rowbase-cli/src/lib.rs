//! `migrate` and `seed` commands for applications built on rowbase.
//!
//! Migrations and seeds live in the host application, so this crate ships
//! no binary: the host registers them on a [`Project`] and hands over argv.

mod cli;
mod guard;
mod migrate_cmd;
mod project;
mod seed_cmd;

pub use cli::{Command, HelpTopic, MigrateAction, MigrateArgs, SeedArgs, parse_args};
pub use guard::{Decision, migrate_decision, seed_decision};
pub use migrate_cmd::format_status;
pub use project::{Confirm, Project, Seed};

pub async fn run(args: Vec<String>, project: &Project) -> anyhow::Result<()> {
    match cli::parse_args(&args)? {
        Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        Command::Migrate(args) => migrate_cmd::run(args, project).await,
        Command::Seed(args) => seed_cmd::run(args, project).await,
    }
}

/// Like [`run`], but prints the error and returns a process exit code.
pub async fn run_with_exit_code(args: Vec<String>, project: &Project) -> i32 {
    match run(args, project).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{e:#}");
            1
        }
    }
}
