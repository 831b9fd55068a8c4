use std::sync::Arc;

use tandem_core::{Catalog, PurchaseLedger, ScoreStore};
use tandem_store::{SqlCatalog, SqlScoreStore};

use crate::commands::{connect_and_migrate, startup, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match startup("reset") {
        Ok(pair) => pair,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;

        let store = Arc::new(SqlScoreStore::new(pool.clone())) as Arc<dyn ScoreStore>;
        let catalog = SqlCatalog::new(pool.clone());

        let outcome = async {
            PurchaseLedger::new(store)
                .clear_history()
                .await
                .map_err(|error| ("reset_execution", error.to_string(), 5u8))?;
            let known = catalog
                .all_known_ids()
                .await
                .map_err(|error| ("reset_execution", error.to_string(), 5u8))?;
            Ok::<usize, CommandFailure>(known.len())
        }
        .await;

        pool.close().await;
        outcome
    });

    match result {
        Ok(catalog_items) => CommandResult::success(
            "reset",
            format!(
                "cleared all co-purchase history; catalog still lists {catalog_items} item(s)"
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("reset", error_class, message, exit_code)
        }
    }
}
