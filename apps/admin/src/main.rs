//! Rolegate administration binary.

#![forbid(unsafe_code)]

mod admin_config;
mod seed;

use std::sync::Arc;

use clap::Parser;

use rolegate_application::{AccessControl, PermissionRelation};
use rolegate_core::{AppError, AppResult, SubjectRef};
use rolegate_domain::{EntityRef, LocaleFallback};
use rolegate_infrastructure::PostgresAccessRepository;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::admin_config::{AdminArgs, AdminConfig, Command, init_tracing};
use crate::seed::SeedFile;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = AdminArgs::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AdminConfig::load(args.command)?;
    let pool = connect_pool(config.database_url.as_str(), config.max_connections).await?;
    let repository = Arc::new(PostgresAccessRepository::with_names(
        pool,
        config.schema.clone(),
    )?);
    let access = AccessControl::from_repository(repository.clone());

    match config.command {
        Command::Migrate => {
            repository.install_schema().await?;
            info!("access-control schema is up to date");
            Ok(())
        }
        Command::Seed { path } => {
            let seed = SeedFile::read(&path).await?;
            seed::apply(&access, seed).await.map(|_| ())
        }
        Command::Gates => list_gates(&access, &config.fallback, config.locale.as_str()).await,
        Command::Check {
            subject_type,
            subject_id,
            permission,
        } => {
            let subject = SubjectRef::new(subject_type, subject_id)?;
            check_gate(&access, &subject, permission.as_str()).await
        }
    }
}

async fn connect_pool(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn list_gates(
    access: &AccessControl,
    fallback: &LocaleFallback,
    locale: &str,
) -> AppResult<()> {
    let gates = access.register_gates().await?;
    info!(count = gates.len(), "permission gates registered");

    for key in gates.keys() {
        let record = access
            .admin()
            .show_permission(EntityRef::key(key), &[PermissionRelation::Guard])
            .await?;
        let Some(record) = record else {
            continue;
        };

        let guard = record
            .guard
            .as_ref()
            .map(|guard| guard.key.as_str())
            .unwrap_or("-");
        let name = fallback
            .resolve(&record.permission.name, locale)
            .unwrap_or_default();
        println!("{guard}\t{key}\t{name}");
    }

    Ok(())
}

async fn check_gate(
    access: &AccessControl,
    subject: &SubjectRef,
    permission: &str,
) -> AppResult<()> {
    let gates = access.register_gates().await?;
    if !gates.is_defined(permission) {
        return Err(AppError::NotFound(format!(
            "no gate is registered for permission '{permission}'"
        )));
    }

    let allowed = gates.allows(Some(subject), permission).await?;
    info!(subject = %subject, permission, allowed, "gate evaluated");
    println!("{}", if allowed { "allowed" } else { "denied" });

    Ok(())
}
