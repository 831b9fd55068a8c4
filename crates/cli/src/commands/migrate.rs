use crate::commands::{connect_and_migrate, startup, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match startup("migrate") {
        Ok(pair) => pair,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;
        pool.close().await;
        Ok::<(), CommandFailure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
