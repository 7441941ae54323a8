use loomline_core::config::AppConfig;
use loomline_db::{DbPool, DemoSeedDataset, SeedResult};

use crate::commands::{execute, CommandFailure, CommandResult, Reply};

pub fn run() -> CommandResult {
    execute("seed", seed_demo_dataset)
}

async fn seed_demo_dataset(_config: AppConfig, pool: DbPool) -> Result<Reply, CommandFailure> {
    let seed_result = DemoSeedDataset::load(&pool)
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let verification = DemoSeedDataset::verify(&pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if !verification.all_present {
        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
            .collect::<Vec<_>>();
        return Err(("seed_verification", verification_failure_message(&failed_checks), 6));
    }

    Reply::with_data(seed_message(&seed_result), &seed_result)
}

fn seed_message(seed_result: &SeedResult) -> String {
    let lead_descriptions = seed_result
        .leads_seeded
        .iter()
        .map(|lead| {
            format!("  - {}: {} ({})", lead.lead_id, lead.conversion_status, lead.description)
        })
        .collect::<Vec<_>>();
    format!(
        "demo dataset loaded: {} catalog items and {} leads:\n{}",
        seed_result.catalog_items_seeded,
        seed_result.leads_seeded.len(),
        lead_descriptions.join("\n")
    )
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let message =
            verification_failure_message(&["LEAD-DEMO-003-quotes", "LEAD-DEMO-003-audit"]);

        assert_eq!(
            message,
            "Seed verification failed for checks: LEAD-DEMO-003-quotes, LEAD-DEMO-003-audit"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_failure_message(&[]), "Some seed data failed to load");
    }
}
