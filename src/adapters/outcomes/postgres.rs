//! Downstream tracking tables in PostgreSQL
//!
//! Every outcome adds a row to `ltcf_submissions`. Successful submissions
//! also update `ltcf_resource_ids` according to each resource's operation:
//!
//! | operation          | PASS                                    |
//! |--------------------|-----------------------------------------|
//! | CREATE, CORRECTION | upsert the identifier mapping           |
//! | UPDATE             | touch `last_submitted_at`               |
//! | DELETE             | set `deleted_at`                        |
//! | USE                | nothing                                 |
//!
//! A failed file changes no mapping.

use super::{Outcome, OutcomeRecorder};
use crate::config::PostgreSQLConfig;
use crate::domain::{BridgeError, Operation, ResourceType, Result};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::NoTls;

const SCHEMA_SQL: &str = include_str!("../../../migrations/001_outcomes.sql");

const INSERT_SUBMISSION: &str = "INSERT INTO ltcf_submissions \
    (source_file, status, bundle_id, document_sha256, catalog_version, http_status, error, \
     fiscal, quarter, submitter_id, routed_to, recorded_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";

const UPSERT_MAPPING: &str = "INSERT INTO ltcf_resource_ids \
    (resource_type, resource_id, source_file, operation, fiscal, quarter, created_at, last_submitted_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
    ON CONFLICT (resource_type, resource_id) DO UPDATE SET \
    source_file = EXCLUDED.source_file, operation = EXCLUDED.operation, \
    last_submitted_at = EXCLUDED.last_submitted_at, deleted_at = NULL";

const TOUCH_MAPPING: &str = "UPDATE ltcf_resource_ids \
    SET last_submitted_at = $3, operation = 'UPDATE', source_file = $4 \
    WHERE resource_type = $1 AND resource_id = $2";

const DELETE_MAPPING: &str = "UPDATE ltcf_resource_ids \
    SET deleted_at = $3, operation = 'DELETE', source_file = $4 \
    WHERE resource_type = $1 AND resource_id = $2";

/// Change to the identifier mapping of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityUpdate {
    Upsert {
        resource: ResourceType,
        id: String,
        operation: Operation,
    },
    Touch {
        resource: ResourceType,
        id: String,
    },
    MarkDeleted {
        resource: ResourceType,
        id: String,
    },
}

/// Mapping changes implied by an outcome
pub fn planned_updates(outcome: &Outcome) -> Vec<IdentityUpdate> {
    if !outcome.is_pass() {
        return Vec::new();
    }
    outcome
        .identities
        .iter()
        .filter_map(|identity| {
            let resource = identity.resource;
            let id = identity.id.to_string();
            match identity.operation {
                Operation::Create | Operation::Correction => Some(IdentityUpdate::Upsert {
                    resource,
                    id,
                    operation: identity.operation,
                }),
                Operation::Update => Some(IdentityUpdate::Touch { resource, id }),
                Operation::Delete => Some(IdentityUpdate::MarkDeleted { resource, id }),
                Operation::Use => None,
            }
        })
        .collect()
}

fn db_error(context: &str) -> impl Fn(tokio_postgres::Error) -> BridgeError + '_ {
    move |e| BridgeError::Outcome(format!("{context}: {e}"))
}

/// Applies outcomes to the PostgreSQL tracking tables
pub struct PostgresOutcomeRecorder {
    pool: Pool,
}

impl PostgresOutcomeRecorder {
    /// Creates the connection pool and checks connectivity
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for an invalid connection string and
    /// an `Outcome` error when no connection can be established.
    pub async fn connect(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_str()
            .parse()
            .map_err(|e| {
                BridgeError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;
        pg_config.options(&format!(
            "-c statement_timeout={}s",
            config.statement_timeout_seconds
        ));

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Some(Duration::from_secs(config.connection_timeout_seconds));
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Outcome(format!("Failed to create connection pool: {e}")))?;

        let recorder = Self { pool };
        recorder.test_connection().await?;
        Ok(recorder)
    }

    async fn connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| BridgeError::Outcome(format!("Failed to get connection from pool: {e}")))
    }

    /// Runs `SELECT 1`
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.connection().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(db_error("Connection test failed"))?;
        tracing::info!("PostgreSQL connection test successful");
        Ok(())
    }

    /// Creates the tracking tables when missing
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.connection().await?;
        client
            .batch_execute(SCHEMA_SQL)
            .await
            .map_err(db_error("Failed to apply outcome schema"))?;
        tracing::info!("PostgreSQL outcome schema ready");
        Ok(())
    }
}

#[async_trait]
impl OutcomeRecorder for PostgresOutcomeRecorder {
    async fn record(&self, outcome: &Outcome) -> Result<()> {
        let updates = planned_updates(outcome);
        if outcome.dry_run {
            tracing::info!(
                file = %outcome.file,
                mapping_updates = updates.len(),
                "DRY RUN: outcome not written to PostgreSQL"
            );
            return Ok(());
        }

        let mut client = self.connection().await?;
        let tx = client
            .transaction()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        let http_status = outcome.http_status.map(i32::from);
        tx.execute(
            INSERT_SUBMISSION,
            &[
                &outcome.file,
                &outcome.status.as_str(),
                &outcome.bundle_id,
                &outcome.document_sha256,
                &outcome.catalog_version,
                &http_status,
                &outcome.error,
                &outcome.fiscal,
                &outcome.quarter,
                &outcome.submitter_id,
                &outcome.routed_to,
                &outcome.recorded_at,
            ],
        )
        .await
        .map_err(db_error("Failed to insert submission row"))?;

        for update in &updates {
            match update {
                IdentityUpdate::Upsert {
                    resource,
                    id,
                    operation,
                } => {
                    tx.execute(
                        UPSERT_MAPPING,
                        &[
                            &resource.as_str(),
                            id,
                            &outcome.file,
                            &operation.as_str(),
                            &outcome.fiscal,
                            &outcome.quarter,
                            &outcome.recorded_at,
                        ],
                    )
                    .await
                    .map_err(db_error("Failed to upsert identifier mapping"))?;
                }
                IdentityUpdate::Touch { resource, id } => {
                    let rows = tx
                        .execute(
                            TOUCH_MAPPING,
                            &[&resource.as_str(), id, &outcome.recorded_at, &outcome.file],
                        )
                        .await
                        .map_err(db_error("Failed to update identifier mapping"))?;
                    if rows == 0 {
                        tracing::warn!(
                            resource = %resource,
                            id = %id,
                            "UPDATE submitted for an identifier with no mapping"
                        );
                    }
                }
                IdentityUpdate::MarkDeleted { resource, id } => {
                    tx.execute(
                        DELETE_MAPPING,
                        &[&resource.as_str(), id, &outcome.recorded_at, &outcome.file],
                    )
                    .await
                    .map_err(db_error("Failed to mark identifier deleted"))?;
                }
            }
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit outcome"))?;

        tracing::debug!(
            file = %outcome.file,
            status = %outcome.status,
            mapping_updates = updates.len(),
            "Outcome written to PostgreSQL"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgresql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outcomes::OutcomeStatus;
    use crate::core::bundle::{AssemblyOptions, BundleAssembler};
    use crate::core::catalog::FieldCatalog;
    use crate::domain::{AdminMetadata, ParsedRecord, SequentialIdSource};

    fn outcome_for(admin_fields: &[(&str, &str)], status: OutcomeStatus) -> Outcome {
        let mut record = ParsedRecord::new();
        record.patient.insert("A3", "1950-01-01");
        record.encounter.insert("B2", "2024-01-15");
        record.section_mut("SECTION C").insert("C1", "1");
        for (key, value) in admin_fields {
            record.admin.insert(key, *value);
        }
        let catalog = FieldCatalog::standard().unwrap();
        let admin = AdminMetadata::from_record(&record).unwrap();
        let mut ids = SequentialIdSource::default();
        let assembled = BundleAssembler::new(&catalog, AssemblyOptions::default())
            .assemble(&record, &admin, &mut ids)
            .unwrap();

        let mut outcome = Outcome::new("a.txt", catalog.version.clone(), false).with_admin(&admin);
        outcome.identities = assembled.identities;
        outcome.status = status;
        outcome
    }

    #[test]
    fn test_failed_outcome_changes_no_mapping() {
        let outcome = outcome_for(&[], OutcomeStatus::Fail);
        assert!(planned_updates(&outcome).is_empty());
    }

    #[test]
    fn test_updates_follow_operations() {
        let outcome = outcome_for(
            &[
                ("PatOper", "USE"),
                ("PatID", "pat-1"),
                ("EncOper", "UPDATE"),
                ("EncID", "enc-1"),
                ("QROper", "DELETE"),
                ("QRID", "qr-1"),
            ],
            OutcomeStatus::Pass,
        );

        let updates = planned_updates(&outcome);
        assert_eq!(
            updates,
            vec![
                IdentityUpdate::Touch {
                    resource: ResourceType::Encounter,
                    id: "enc-1".to_string()
                },
                IdentityUpdate::MarkDeleted {
                    resource: ResourceType::QuestionnaireResponse,
                    id: "qr-1".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_created_resources_are_upserted_with_generated_ids() {
        let outcome = outcome_for(&[("EncOper", "CORRECTION")], OutcomeStatus::Pass);
        let updates = planned_updates(&outcome);
        assert_eq!(updates.len(), 3);
        assert!(updates.iter().all(|u| matches!(u, IdentityUpdate::Upsert { .. })));
        assert!(updates.contains(&IdentityUpdate::Upsert {
            resource: ResourceType::Encounter,
            id: outcome
                .identities
                .get(ResourceType::Encounter)
                .unwrap()
                .id
                .to_string(),
            operation: Operation::Correction,
        }));
    }
}
