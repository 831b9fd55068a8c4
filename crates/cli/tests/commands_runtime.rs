use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use tempfile::TempDir;

use tandem_cli::commands::{config, migrate, recommend, record, reset, seed};

#[test]
fn migrate_succeeds_against_a_fresh_database() {
    with_env(&[("TANDEM_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_config_failure_for_an_unsupported_database_url() {
    with_env(&[("TANDEM_DATABASE_URL", "postgres://localhost/tandem")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_and_verifies_the_demo_dataset() {
    with_env(&[("TANDEM_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("5 catalog items"));
        assert!(message.contains("6 baskets replayed"));
    });
}

#[test]
fn seed_reports_the_same_summary_on_every_run() {
    with_env(&[("TANDEM_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(parse_payload(&first.output), parse_payload(&second.output));
    });
}

#[test]
fn record_rejects_a_non_numeric_item_list() {
    with_env(&[], || {
        let result = record::run("1,moka");
        assert_eq!(result.exit_code, 2, "expected argument parse failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "record");
        assert_eq!(payload["error_class"], "argument_parse");
        assert!(payload["message"].as_str().unwrap_or("").contains("moka"));
    });
}

#[test]
fn recommend_rejects_a_blank_seed_list() {
    with_env(&[], || {
        let result = recommend::run(" , ", None, false);
        assert_eq!(result.exit_code, 2, "expected argument parse failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "recommend");
        assert_eq!(payload["error_class"], "argument_parse");
    });
}

#[test]
fn record_of_a_single_item_is_a_noop() {
    with_env(&[("TANDEM_DATABASE_URL", "sqlite::memory:")], || {
        let result = record::run("7,7");
        assert_eq!(result.exit_code, 0, "single-item baskets are valid no-ops");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("1 distinct item"));
        assert!(message.contains("0 co-purchase pair"));
    });
}

#[test]
fn recommend_honors_the_configured_default_and_cap() {
    with_env(
        &[
            ("TANDEM_DATABASE_URL", "sqlite::memory:"),
            ("TANDEM_RECOMMENDER_DEFAULT_MAX_RESULTS", "2"),
            ("TANDEM_RECOMMENDER_MAX_RESULTS_CAP", "3"),
        ],
        || {
            let defaulted = recommend::run("1", None, true);
            assert_eq!(defaulted.exit_code, 0);
            let payload = parse_payload(&defaulted.output);
            assert_eq!(payload["k"], 2);
            assert!(payload["items"].as_array().expect("items array").is_empty());

            let capped = recommend::run("1", Some(50), true);
            let payload = parse_payload(&capped.output);
            assert_eq!(payload["k"], 3);
        },
    );
}

#[test]
fn seed_record_recommend_round_trip_on_a_shared_database() {
    let dir = TempDir::new().expect("create temp dir");
    let db_path = dir.path().join("tandem-cli.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    with_env(&[("TANDEM_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed");

        // Demo weights give the moka pot (id 2) the row {1: 2, 3: 2, 4: 1}.
        let ranked = recommend::run("2", Some(3), true);
        assert_eq!(ranked.exit_code, 0);
        let payload = parse_payload(&ranked.output);
        assert_eq!(payload["k"], 3);
        assert_eq!(item_ids(&payload), vec![1, 3, 4]);
        assert_eq!(payload["items"][0]["name"], "Espresso Cup");
        assert_eq!(payload["items"][0]["weight"], 2);

        // A new basket pairing the pot with the scale promotes item 5 into the row.
        assert_eq!(record::run("2,5").exit_code, 0);

        let widened = recommend::run("2", Some(4), true);
        let payload = parse_payload(&widened.output);
        assert_eq!(item_ids(&payload), vec![1, 3, 4, 5]);
        assert_eq!(payload["items"][3]["available"], false);
    });
}

#[test]
fn reset_clears_history_but_keeps_the_catalog() {
    let dir = TempDir::new().expect("create temp dir");
    let db_path = dir.path().join("tandem-reset.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    with_env(&[("TANDEM_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "seed should succeed");

        let result = reset::run();
        assert_eq!(result.exit_code, 0, "expected reset success");
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "reset");
        assert!(payload["message"].as_str().unwrap_or("").contains("5 item(s)"));

        let after = recommend::run("2", Some(5), true);
        let payload = parse_payload(&after.output);
        assert!(payload["items"].as_array().expect("items array").is_empty());
    });
}

#[test]
fn config_renders_sources_and_redacts_the_admin_token() {
    with_env(
        &[
            ("TANDEM_DATABASE_URL", "sqlite::memory:"),
            ("TANDEM_SERVER_ADMIN_TOKEN", "super-secret-token"),
        ],
        || {
            let output = config::run();

            assert!(output
                .contains("- database.url = sqlite::memory: (source: env (TANDEM_DATABASE_URL))"));
            assert!(output.contains(
                "- server.admin_token = <redacted> (source: env (TANDEM_SERVER_ADMIN_TOKEN))"
            ));
            assert!(!output.contains("super-secret-token"));
            assert!(output.contains("- server.port = 8080 (source: default)"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn item_ids(payload: &Value) -> Vec<u64> {
    payload["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|item| item["id"].as_u64().expect("numeric id"))
        .collect()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TANDEM_DATABASE_URL",
        "TANDEM_DATABASE_MAX_CONNECTIONS",
        "TANDEM_DATABASE_TIMEOUT_SECS",
        "TANDEM_SERVER_BIND_ADDRESS",
        "TANDEM_SERVER_PORT",
        "TANDEM_SERVER_ADMIN_TOKEN",
        "TANDEM_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "TANDEM_RECOMMENDER_DEFAULT_MAX_RESULTS",
        "TANDEM_RECOMMENDER_MAX_RESULTS_CAP",
        "TANDEM_LOGGING_LEVEL",
        "TANDEM_LOGGING_FORMAT",
        "TANDEM_LOG_LEVEL",
        "TANDEM_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
