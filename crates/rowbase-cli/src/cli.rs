#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Migrate,
    Seed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help(HelpTopic),
    Migrate(MigrateArgs),
    Seed(SeedArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateAction {
    Up,
    Down,
    Drop,
    Fresh,
    Status,
}

impl MigrateAction {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "up" => Self::Up,
            "down" => Self::Down,
            "drop" => Self::Drop,
            "fresh" => Self::Fresh,
            "status" => Self::Status,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrateArgs {
    /// `None` migrates all the way forward.
    pub action: Option<MigrateAction>,
    pub steps: Option<usize>,
    pub force: bool,
    pub database: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeedArgs {
    /// `None` runs every seed of the database.
    pub name: Option<String>,
    pub count: Option<usize>,
    pub force: bool,
    pub database: Option<String>,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" => Ok(Command::Help(HelpTopic::Root)),
        "migrate" => parse_migrate(it.map(|s| s.as_str())),
        "seed" => parse_seed(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

fn parse_count(token: &str, what: &str) -> anyhow::Result<usize> {
    token
        .parse::<usize>()
        .map_err(|_| anyhow::anyhow!("{what} must be a non-negative integer, got '{token}'"))
}

fn parse_migrate<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut args = MigrateArgs::default();

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Migrate)),
            "-f" | "--force" => args.force = true,
            "--database" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--database requires a value");
                };
                args.database = Some(v.to_string());
            }
            _ if token.starts_with("--database=") => {
                args.database = Some(token.trim_start_matches("--database=").to_string());
            }
            _ if token.starts_with('-') => anyhow::bail!("unknown argument: {token}"),
            _ if args.action.is_none() && args.steps.is_none() => {
                match MigrateAction::parse(token) {
                    Some(action) => args.action = Some(action),
                    None if token.parse::<usize>().is_ok() => {
                        args.steps = Some(parse_count(token, "steps")?);
                    }
                    None => anyhow::bail!("unknown migrate action: {token}"),
                }
            }
            _ if args.steps.is_none() => args.steps = Some(parse_count(token, "steps")?),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    Ok(Command::Migrate(args))
}

fn parse_seed<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut args = SeedArgs::default();

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Seed)),
            "-f" | "--force" => args.force = true,
            "--database" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--database requires a value");
                };
                args.database = Some(v.to_string());
            }
            _ if token.starts_with("--database=") => {
                args.database = Some(token.trim_start_matches("--database=").to_string());
            }
            _ if token.starts_with('-') => anyhow::bail!("unknown argument: {token}"),
            _ if args.name.is_none() && args.count.is_none() => {
                // A lone number is the count for every seed.
                if token.parse::<usize>().is_ok() {
                    args.count = Some(parse_count(token, "count")?);
                } else {
                    args.name = Some(token.to_string());
                }
            }
            _ if args.count.is_none() => args.count = Some(parse_count(token, "count")?),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    Ok(Command::Seed(args))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
USAGE:
  <app> <COMMAND> [OPTIONS]

COMMANDS:
  migrate       Migrate database tables
  seed          Seed database with sample data

Run `<app> <command> --help` for more."
            );
        }
        HelpTopic::Migrate => {
            println!(
                "\
USAGE:
  <app> migrate [ACTION] [STEPS] [OPTIONS]

ACTIONS:
  up                    Migrate forward <steps> migrations (default 1)
  down                  Roll back <steps> migrations (default 1)
  drop                  Drop all tables
  fresh                 Drop all tables and migrate from scratch
  status                List all migrations and show current

OPTIONS:
  --database <NAME>     Database to migrate (default: the project's default)
  -f, --force           Migrate even when in production, protected, or not on localhost
  -h, --help            Print help

Specify no action or steps to migrate all the way forward."
            );
        }
        HelpTopic::Seed => {
            println!(
                "\
USAGE:
  <app> seed [NAME] [COUNT] [OPTIONS]

OPTIONS:
  --database <NAME>     Database to seed (default: the project's default)
  -f, --force           Seed even when in production
  -h, --help            Print help

If no name is provided, every seed runs."
            );
        }
    }
}
