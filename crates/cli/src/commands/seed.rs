use roomwise_db::{migrations, DemoDataset};

use crate::commands::{
    open_pool, prepare, CommandResult, StepFailure, EXIT_EXECUTION, EXIT_VERIFICATION,
};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_EXECUTION))?;

        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_EXECUTION))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_VERIFICATION))?;

        let run_result: Result<String, StepFailure> = if verification.all_present {
            Ok(seed_message(&seeded.rooms_seeded, seeded.users_seeded.len()))
        } else {
            Err(("seed_verification", verification_message(&verification.checks), EXIT_VERIFICATION))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err(failure) => CommandResult::from_step("seed", failure),
    }
}

fn seed_message(rooms: &[&str], user_count: usize) -> String {
    format!(
        "demo dataset loaded: {} rooms ({}) and {} users",
        rooms.len(),
        rooms.join(", "),
        user_count
    )
}

fn verification_message(checks: &[(&str, bool)]) -> String {
    let failed = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed.is_empty() {
        "some seed rows failed to load".to_string()
    } else {
        format!("seed verification failed for: {}", failed.join(", "))
    }
}
