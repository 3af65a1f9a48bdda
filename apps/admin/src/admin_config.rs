use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{DEFAULT_LANGUAGES, LocaleFallback};
use rolegate_infrastructure::{MorphColumns, SchemaNames, TableNames};
use tracing_subscriber::EnvFilter;

/// Administration commands for the access-control schema and data.
#[derive(Parser, Debug)]
#[command(name = "rolegate-admin", about, long_about = None)]
pub struct AdminArgs {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommand selected on the command line.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Install or update the access-control tables.
    Migrate,

    /// Load guards, roles, groups and assignments from a JSON file.
    Seed {
        /// Seed file path.
        path: PathBuf,
    },

    /// List registered permission gates.
    Gates,

    /// Evaluate one permission gate for a subject.
    Check {
        /// Subject type, such as "user".
        subject_type: String,

        /// Numeric subject id.
        subject_id: i64,

        /// Permission key of the gate.
        permission: String,
    },
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub command: Command,
    pub database_url: String,
    pub max_connections: u32,
    pub locale: String,
    pub fallback: LocaleFallback,
    pub schema: SchemaNames,
}

impl AdminConfig {
    pub fn load(command: Command) -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value.parse::<u32>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid DATABASE_MAX_CONNECTIONS value '{value}': {error}"
                ))
            })?,
            Err(_) => 5,
        };

        let locale = env::var("ROLEGATE_LOCALE").unwrap_or_else(|_| "en".to_owned());
        let fallback = match env::var("ROLEGATE_LANGUAGES") {
            Ok(value) => LocaleFallback::new(parse_languages(value.as_str())),
            Err(_) => LocaleFallback::new(DEFAULT_LANGUAGES),
        };

        let schema = SchemaNames {
            tables: TableNames {
                permission_guards: env_or("ROLEGATE_TABLE_PERMISSION_GUARDS", "permission_guards"),
                permissions: env_or("ROLEGATE_TABLE_PERMISSIONS", "permissions"),
                roles: env_or("ROLEGATE_TABLE_ROLES", "roles"),
                groups: env_or("ROLEGATE_TABLE_GROUPS", "groups"),
                role_assignments: env_or("ROLEGATE_TABLE_ROLE_ASSIGNMENTS", "role_assignments"),
                permission_assignments: env_or(
                    "ROLEGATE_TABLE_PERMISSION_ASSIGNMENTS",
                    "permission_assignments",
                ),
                groupables: env_or("ROLEGATE_TABLE_GROUPABLES", "groupables"),
            },
            columns: MorphColumns {
                model_id: env_or("ROLEGATE_MODEL_MORPH_KEY", "model_id"),
                groupable_id: env_or("ROLEGATE_GROUP_MORPH_KEY", "groupable_id"),
            },
        };
        schema.validate()?;

        Ok(Self {
            command,
            database_url,
            max_connections,
            locale,
            fallback,
            schema,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_languages(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|language| !language.is_empty())
        .map(str::to_owned)
        .collect()
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::{AdminArgs, Command, parse_languages};

    fn command(args: &[&str]) -> Option<Command> {
        AdminArgs::try_parse_from(std::iter::once("rolegate-admin").chain(args.iter().copied()))
            .ok()
            .map(|parsed| parsed.command)
    }

    #[test]
    fn parses_every_subcommand() {
        assert_eq!(command(&["migrate"]), Some(Command::Migrate));
        assert_eq!(command(&["gates"]), Some(Command::Gates));
        assert_eq!(
            command(&["seed", "access.json"]),
            Some(Command::Seed {
                path: PathBuf::from("access.json")
            })
        );
        assert_eq!(
            command(&["check", "user", "42", "edit-post"]),
            Some(Command::Check {
                subject_type: "user".to_owned(),
                subject_id: 42,
                permission: "edit-post".to_owned(),
            })
        );
    }

    #[test]
    fn rejects_unknown_or_incomplete_commands() {
        assert_eq!(command(&[]), None);
        assert_eq!(command(&["seed"]), None);
        assert_eq!(command(&["check", "user", "alice", "edit-post"]), None);
        assert_eq!(command(&["serve"]), None);
    }

    #[test]
    fn language_list_skips_blank_entries() {
        assert_eq!(parse_languages(" ar, en ,,fr"), vec!["ar", "en", "fr"]);
    }
}
