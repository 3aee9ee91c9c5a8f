use std::sync::Arc;

use serde::Serialize;

use offerdesk_core::access::AccessCodeIssuer;
use offerdesk_core::config::{AppConfig, LoadOptions};
use offerdesk_core::errors::EngineError;
use offerdesk_db::repositories::SqlAccessCodeStore;
use offerdesk_db::{connect_with_settings, migrations};

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct InviteOutput {
    access_code: String,
    email: String,
    role: String,
    expires_at: String,
}

pub fn run(email: &str, name: &str, role: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "invite",
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
                "invite",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let issuer = AccessCodeIssuer::new(
            Arc::new(SqlAccessCodeStore::new(pool.clone())),
            config.access.code_length,
            config.access.expiry_days,
        );

        let issued = issuer.issue(email, name, role).await.map_err(|error| match error {
            EngineError::Domain(domain) => ("validation", domain.to_string(), 2u8),
            EngineError::Storage(message) => ("storage", message, 4u8),
        })?;

        pool.close().await;

        serde_json::to_string(&InviteOutput {
            access_code: issued.code,
            email: issued.email,
            role: issued.role.as_str().to_string(),
            expires_at: issued.expires_at.to_rfc3339(),
        })
        .map_err(|error| ("serialization", error.to_string(), 3u8))
    });

    match result {
        Ok(output) => CommandResult::success("invite", output),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("invite", error_class, message, exit_code)
        }
    }
}
