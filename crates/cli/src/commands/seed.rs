use chrono::Utc;
use clarity_core::domain::record::UserId;
use clarity_db::{seed_demo_dataset, SeedSummary};

use crate::commands::{build_runtime, load_config, open_database, CommandResult, EXIT_SEED};

pub fn run(user: &str) -> CommandResult {
    let user_id = UserId::from(user);
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let summary = seed_demo_dataset(&pool, &user_id, Utc::now())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED));
        pool.close().await;
        summary
    });

    match result {
        Ok(summary) => CommandResult::success("seed", summary_message(&summary)),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn summary_message(summary: &SeedSummary) -> String {
    format!(
        "seeded demo data for `{}`: {} activities, {} app usage records, {} transactions, {} budgets",
        summary.user_id,
        summary.activities,
        summary.application_usage,
        summary.transactions,
        summary.budgets
    )
}

#[cfg(test)]
mod tests {
    use clarity_db::SeedSummary;

    use super::summary_message;

    #[test]
    fn summary_message_lists_every_table() {
        let summary = SeedSummary {
            user_id: "demo".to_string(),
            activities: 34,
            application_usage: 86,
            transactions: 19,
            budgets: 3,
        };

        assert_eq!(
            summary_message(&summary),
            "seeded demo data for `demo`: 34 activities, 86 app usage records, 19 transactions, 3 budgets"
        );
    }
}
