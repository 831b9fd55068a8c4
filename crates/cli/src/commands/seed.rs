use crate::commands::{connect_and_migrate, startup, CommandFailure, CommandResult};
use tandem_store::{DemoSeedDataset, SeedResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match startup("seed") {
        Ok(pair) => pair,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;

        let outcome: Result<SeedResult, CommandFailure> = async {
            let summary = DemoSeedDataset::load(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

            let verification = DemoSeedDataset::verify(&pool)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
            if !verification.all_present {
                let message = verification_failure_message(&verification.checks);
                return Err(("seed_verification", message, 6u8));
            }

            Ok(summary)
        }
        .await;

        pool.close().await;
        outcome
    });

    match result {
        Ok(summary) => CommandResult::success(
            "seed",
            format!(
                "demo dataset loaded and verified: {} catalog items, {} baskets replayed",
                summary.items_seeded, summary.baskets_replayed
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed: Vec<&str> =
        checks.iter().filter(|(_, passed)| !passed).map(|(check, _)| *check).collect();

    if failed.is_empty() {
        "seed verification reported missing data".to_string()
    } else {
        format!("seed verification failed for: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn failure_message_names_every_failed_check() {
        let checks =
            [("catalog-count", true), ("weight-pot-grinder", false), ("top-for-moka-pot", false)];

        assert_eq!(
            verification_failure_message(&checks),
            "seed verification failed for: weight-pot-grinder, top-for-moka-pot"
        );
    }

    #[test]
    fn failure_message_has_a_fallback_when_no_check_is_flagged() {
        let checks = [("catalog-count", true), ("association-rows", true)];

        assert_eq!(
            verification_failure_message(&checks),
            "seed verification reported missing data"
        );
    }
}
