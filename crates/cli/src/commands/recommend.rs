use std::sync::Arc;

use serde::Serialize;

use tandem_core::{Catalog, EngineError, ItemId, Recommender, ScoreStore, Weight};
use tandem_store::{DbPool, SqlCatalog, SqlScoreStore};

use crate::commands::{
    connect_and_migrate, parse_id_list, startup, CommandFailure, CommandResult,
};

#[derive(Debug, Serialize)]
struct RecommendReport {
    seeds: Vec<u64>,
    k: usize,
    items: Vec<RecommendedEntry>,
}

#[derive(Debug, Serialize)]
struct RecommendedEntry {
    rank: usize,
    id: u64,
    name: String,
    slug: String,
    weight: Weight,
    available: bool,
}

pub fn run(seeds: &str, k: Option<usize>, json_output: bool) -> CommandResult {
    let seed_ids = match parse_id_list(seeds) {
        Ok(ids) => ids,
        Err(message) => return CommandResult::failure("recommend", "argument_parse", message, 2),
    };

    let (config, runtime) = match startup("recommend") {
        Ok(pair) => pair,
        Err(result) => return result,
    };
    let k =
        k.unwrap_or(config.recommender.default_max_results).min(config.recommender.max_results_cap);

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;
        let outcome = query(&pool, &seed_ids, k).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(entries) => render(&seed_ids, k, entries, json_output),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("recommend", error_class, message, exit_code)
        }
    }
}

async fn query(
    pool: &DbPool,
    seeds: &[ItemId],
    k: usize,
) -> Result<Vec<RecommendedEntry>, CommandFailure> {
    let store = Arc::new(SqlScoreStore::new(pool.clone())) as Arc<dyn ScoreStore>;
    let catalog = Arc::new(SqlCatalog::new(pool.clone())) as Arc<dyn Catalog>;
    let recommender = Recommender::new(store, Arc::clone(&catalog));

    let ranked = recommender.recommend_ids(seeds, k).await.map_err(query_failure)?;

    let ids: Vec<ItemId> = ranked.iter().map(|&(id, _)| id).collect();
    let mut resolved = catalog
        .resolve_ids(&ids)
        .await
        .map_err(|error| query_failure(EngineError::from(error)))?;

    // Candidates the catalog does not know drop out; ranks stay contiguous.
    Ok(ranked
        .into_iter()
        .filter_map(|(id, weight)| resolved.remove(&id).map(|item| (item, weight)))
        .enumerate()
        .map(|(index, (item, weight))| RecommendedEntry {
            rank: index + 1,
            id: item.id.0,
            name: item.name,
            slug: item.slug,
            weight,
            available: item.available,
        })
        .collect())
}

fn query_failure(error: EngineError) -> CommandFailure {
    ("query_execution", error.to_string(), 5u8)
}

fn render(
    seeds: &[ItemId],
    k: usize,
    items: Vec<RecommendedEntry>,
    json_output: bool,
) -> CommandResult {
    let report = RecommendReport { seeds: seeds.iter().map(|id| id.0).collect(), k, items };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        return CommandResult { exit_code: 0, output };
    }

    let seed_list = report.seeds.iter().map(u64::to_string).collect::<Vec<_>>().join(", ");
    let mut lines = vec![format!("recommendations for seed(s) {seed_list} (limit {k}):")];
    if report.items.is_empty() {
        lines.push("  (none recorded yet)".to_string());
    } else {
        for entry in &report.items {
            lines.push(format!(
                "  {}. {} [id {}, weight {}]{}",
                entry.rank,
                entry.name,
                entry.id,
                entry.weight,
                if entry.available { "" } else { " (unavailable)" }
            ));
        }
    }
    CommandResult { exit_code: 0, output: lines.join("\n") }
}
