pub mod config;
pub mod items;
pub mod lead;
pub mod migrate;
pub mod price;
pub mod quote;
pub mod seed;

use std::future::Future;
use std::sync::Arc;

use loomline_core::audit::InMemoryAuditSink;
use loomline_core::config::{AppConfig, LoadOptions};
use loomline_core::cpq::catalog::Catalog;
use loomline_core::domain::lead::LeadId;
use loomline_core::domain::quote::QuoteId;
use loomline_core::errors::{ApplicationError, DomainError};
use loomline_core::repository::InMemorySalesRepository;
use loomline_core::revisions::QuoteRevisionManager;
use loomline_db::repositories::{RepositoryError, SqlCatalogRepository};
use loomline_db::{connect_with_config, migrations, CommitSummary, DbPool, SalesWorkspace};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Recorded as the actor on every audit event the CLI produces.
pub const CLI_ACTOR: &str = "loomline-cli";

/// `(error_class, message, exit_code)`
pub type CommandFailure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\
             \"message\":\"{}\",\"data\":null}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Successful body of a database-backed command.
#[derive(Debug)]
pub struct Reply {
    pub message: String,
    pub data: Option<Value>,
}

impl Reply {
    pub fn message(message: impl Into<String>) -> Self {
        Self { message: message.into(), data: None }
    }

    pub fn with_data<T: Serialize>(
        message: impl Into<String>,
        data: &T,
    ) -> Result<Self, CommandFailure> {
        let data = serde_json::to_value(data)
            .map_err(|error| ("serialization", error.to_string(), 1u8))?;
        Ok(Self { message: message.into(), data: Some(data) })
    }
}

/// Loads config, opens the database with pending migrations applied, and runs
/// `body` on a current-thread runtime.
pub fn execute<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: Future<Output = Result<Reply, CommandFailure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let outcome = body(config, pool.clone()).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(reply) => CommandResult::success_with_data(command, reply.message, reply.data),
        Err((error_class, message, exit_code)) => {
            debug!(command, error_class, exit_code, "command failed");
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

pub fn application_failure(error: ApplicationError) -> CommandFailure {
    let exit_code = match &error {
        ApplicationError::Domain(_) => 1,
        ApplicationError::Configuration(_) => 2,
        ApplicationError::Persistence(_) => 7,
    };
    (error.error_class(), error.to_string(), exit_code)
}

pub fn persistence_failure(error: RepositoryError) -> CommandFailure {
    ("persistence", error.to_string(), 7)
}

/// Revision manager bound to one lead's records loaded from SQLite.
pub struct SalesSession {
    workspace: SalesWorkspace,
    audit: InMemoryAuditSink,
    manager: QuoteRevisionManager<InMemorySalesRepository, Catalog>,
}

impl SalesSession {
    pub async fn open(pool: &DbPool, config: &AppConfig) -> Result<Self, CommandFailure> {
        let catalog = SqlCatalogRepository::new(pool.clone())
            .load_catalog()
            .await
            .map_err(persistence_failure)?;
        let workspace = SalesWorkspace::new(pool.clone());
        let audit = InMemoryAuditSink::default();
        let manager = QuoteRevisionManager::new(
            workspace.repository().clone(),
            catalog,
            Arc::new(audit.clone()),
        )
        .with_settings(config.sales.quoting_settings())
        .with_actor(CLI_ACTOR);

        Ok(Self { workspace, audit, manager })
    }

    pub fn manager(&self) -> &QuoteRevisionManager<InMemorySalesRepository, Catalog> {
        &self.manager
    }

    pub async fn load_lead(&self, lead_id: &LeadId) -> Result<(), CommandFailure> {
        if self.workspace.load_lead(lead_id).await.map_err(persistence_failure)? {
            Ok(())
        } else {
            Err(application_failure(DomainError::LeadNotFound(lead_id.clone()).into()))
        }
    }

    /// Loads the lead owning `quote_id` together with every quote it has.
    pub async fn load_quote(&self, quote_id: &QuoteId) -> Result<LeadId, CommandFailure> {
        self.workspace
            .load_lead_for_quote(quote_id)
            .await
            .map_err(persistence_failure)?
            .ok_or_else(|| application_failure(DomainError::QuoteNotFound(quote_id.clone()).into()))
    }

    /// Commits the workspace and the audit trail whether or not `outcome`
    /// succeeded, so rejected attempts stay on record.
    pub async fn settle<T>(
        &self,
        outcome: Result<T, ApplicationError>,
    ) -> Result<(T, CommitSummary), CommandFailure> {
        let events = self.audit.drain();
        let summary = match self.workspace.commit(&events).await {
            Ok(summary) => summary,
            Err(error) => {
                warn!(
                    event_name = "cli.commit_failed",
                    error = %error,
                    audit_events = events.len(),
                    "sales workspace commit failed"
                );
                return Err(persistence_failure(error));
            }
        };

        outcome.map(|value| (value, summary)).map_err(application_failure)
    }
}

#[cfg(test)]
mod tests {
    use loomline_core::domain::lead::LeadId;
    use loomline_core::errors::{ApplicationError, DomainError};
    use serde_json::{json, Value};

    use super::{application_failure, CommandResult};

    #[test]
    fn envelopes_always_carry_a_data_field() {
        let ok = CommandResult::success_with_data("price", "priced", Some(json!({"rate": "90"})));
        let failed = CommandResult::failure("price", "item_not_found", "missing", 1);

        let ok: Value = serde_json::from_str(&ok.output).expect("json");
        let failed: Value = serde_json::from_str(&failed.output).expect("json");

        assert_eq!(ok["data"]["rate"], "90");
        assert!(ok["error_class"].is_null());
        assert!(failed.get("data").is_some_and(Value::is_null));
        assert_eq!(failed["status"], "error");
    }

    #[test]
    fn domain_and_persistence_failures_use_distinct_exit_codes() {
        let missing = ApplicationError::from(DomainError::LeadNotFound(LeadId("L-1".to_string())));
        let storage = ApplicationError::Persistence("disk full".to_string());

        let (class, _, code) = application_failure(missing);
        assert_eq!((class, code), ("not_found", 1));
        assert_eq!(application_failure(storage).2, 7);
    }
}
