use std::sync::Arc;

use tandem_core::{Basket, PurchaseLedger, ScoreStore};
use tandem_store::SqlScoreStore;

use crate::commands::{connect_and_migrate, parse_id_list, startup, CommandResult};

pub fn run(items: &str) -> CommandResult {
    let basket = match parse_id_list(items) {
        Ok(ids) => Basket::new(ids),
        Err(message) => return CommandResult::failure("record", "argument_parse", message, 2),
    };

    let (config, runtime) = match startup("record") {
        Ok(pair) => pair,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;

        let store = Arc::new(SqlScoreStore::new(pool.clone())) as Arc<dyn ScoreStore>;
        let outcome = PurchaseLedger::new(store)
            .record_purchase(&basket)
            .await
            .map_err(|error| ("record_execution", error.to_string(), 5u8));

        pool.close().await;
        outcome
    });

    match result {
        Ok(()) => {
            let distinct = basket.len();
            let pairs = distinct * distinct.saturating_sub(1) / 2;
            CommandResult::success(
                "record",
                format!("recorded basket of {distinct} distinct item(s), {pairs} co-purchase pair(s)"),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("record", error_class, message, exit_code)
        }
    }
}
