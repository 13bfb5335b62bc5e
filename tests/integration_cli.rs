use std::env;
use std::fs;
use std::io::Write;

use serde_json::json;
use serial_test::serial;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use movekit::api::{CliHandler, Commands, CursorsArgs, SimulateArgs, TrackArgs};
use movekit::config::AppConfig;
use movekit::database::{CursorKey, CursorStore};
use movekit::error::{ConfigError, GatewayError, MovekitError, SystemError, TrackError};

const ENV_KEYS: [&str; 8] = [
    "CONFIG_FILE",
    "MOVEKIT_NETWORK",
    "RPC_TIMEOUT_SECONDS",
    "TRACK_INTERVAL_MS",
    "TRACK_PAGE_LIMIT",
    "TRACK_CURSOR_DB",
    "LOG_LEVEL",
    "LOG_FORMAT",
];

fn clear_env() {
    for key in ENV_KEYS {
        env::remove_var(key);
    }
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write config");
    file
}

#[test]
#[serial]
fn test_config_file_then_env_precedence() {
    clear_env();
    let file = config_file(
        r#"
[network]
default = "devnet"

[network.endpoints]
staging = "https://staging.example.com/v1"

[tracker]
poll_interval_ms = 1500
"#,
    );

    env::set_var("TRACK_INTERVAL_MS", "750");
    let config = AppConfig::load_from(Some(file.path())).expect("config should load");
    clear_env();

    assert_eq!(config.network.default, "devnet");
    assert_eq!(config.tracker.poll_interval_ms, 750);
    assert_eq!(config.tracker.page_limit, 50);
    assert_eq!(config.rpc.timeout_seconds, 30);
    assert_eq!(
        config.network_registry().url_for("staging"),
        Some("https://staging.example.com/v1")
    );
}

#[test]
#[serial]
fn test_config_file_env_variable_is_used() {
    clear_env();
    let file = config_file("[tracker]\ndefault_module = \"refinery\"\n");

    env::set_var("CONFIG_FILE", file.path());
    let config = AppConfig::load().expect("config should load");
    clear_env();

    assert_eq!(config.tracker.default_module, "refinery");
}

#[test]
#[serial]
fn test_invalid_config_values_rejected() {
    clear_env();

    let bad_url = config_file("[network.endpoints]\nbroken = \"ftp://nope\"\n");
    assert!(matches!(
        AppConfig::load_from(Some(bad_url.path())),
        Err(ConfigError::InvalidUrl(_))
    ));

    let zero_interval = config_file("[tracker]\npoll_interval_ms = 0\n");
    assert!(matches!(
        AppConfig::load_from(Some(zero_interval.path())),
        Err(ConfigError::InvalidValue { .. })
    ));

    let unparsable = config_file("[tracker\n");
    assert!(matches!(
        AppConfig::load_from(Some(unparsable.path())),
        Err(ConfigError::Parsing(_))
    ));

    env::set_var("TRACK_PAGE_LIMIT", "lots");
    let result = AppConfig::load_from(None);
    clear_env();
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
#[serial]
fn test_explicit_missing_config_file_is_an_error() {
    clear_env();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let missing = temp_dir.path().join("absent.toml");

    assert!(matches!(
        AppConfig::load_from(Some(&missing)),
        Err(ConfigError::FileNotFound(_))
    ));
}

#[test]
fn test_sample_config_loads_back() {
    let sample = AppConfig::generate_sample_config().expect("sample config");
    let file = config_file(&sample);
    let config = AppConfig::load_from_path(file.path()).expect("sample should parse");

    assert_eq!(config.network.default, "testnet");
    assert!(config.validate().is_ok());
}

#[tokio::test]
async fn test_track_without_address_fails_before_polling() {
    let handler = CliHandler::new(AppConfig::default());
    let err = handler
        .execute_command(&Commands::Track(TrackArgs::default()))
        .await
        .unwrap_err();

    assert!(matches!(err, MovekitError::Track(TrackError::MissingAddress)));
    assert!(err.to_string().contains("--address"));
}

#[tokio::test]
async fn test_simulate_against_configured_endpoint() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transactions/simulate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "success": true,
            "gas_used": "7",
            "gas_unit_price": "100",
            "vm_status": "Executed successfully",
            "changes": [],
            "events": []
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = AppConfig::default();
    config.network.endpoints.insert("mock".to_string(), mock_server.uri());

    let txn = config_file(r#"{"sender": "0xabc"}"#);
    let handler = CliHandler::new(config);
    handler
        .execute_command(&Commands::Simulate(SimulateArgs {
            file: txn.path().to_path_buf(),
            network: Some("mock".to_string()),
        }))
        .await
        .expect("simulation should succeed");
}

#[tokio::test]
async fn test_simulate_rejects_bad_input() {
    let handler = CliHandler::new(AppConfig::default());

    let not_json = config_file("sender = 0xabc");
    let err = handler
        .execute_command(&Commands::Simulate(SimulateArgs {
            file: not_json.path().to_path_buf(),
            network: None,
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, MovekitError::System(SystemError::InvalidInput { .. })));

    let txn = config_file("{}");
    let err = handler
        .execute_command(&Commands::Simulate(SimulateArgs {
            file: txn.path().to_path_buf(),
            network: Some("moonnet".to_string()),
        }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MovekitError::Gateway(GatewayError::UnknownNetwork { .. })
    ));
}

#[tokio::test]
async fn test_cursors_command_reads_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("cursors.db");
    {
        let store = CursorStore::open(&db_path).expect("Failed to open cursor store");
        store
            .save(&CursorKey::new("testnet", "0xabc", Some("oil_supply_chain"), None), 9)
            .unwrap();
    }

    let handler = CliHandler::new(AppConfig::default());
    handler
        .execute_command(&Commands::Cursors(CursorsArgs { db: Some(db_path.clone()) }))
        .await
        .expect("cursors should list");

    assert!(fs::metadata(&db_path).is_ok());

    let err = handler
        .execute_command(&Commands::Cursors(CursorsArgs { db: None }))
        .await
        .unwrap_err();
    assert!(matches!(err, MovekitError::Config(ConfigError::InvalidValue { .. })));
}

#[tokio::test]
async fn test_networks_and_config_commands() {
    let handler = CliHandler::new(AppConfig::default());
    handler.execute_command(&Commands::Networks).await.expect("networks");
    handler.execute_command(&Commands::Config).await.expect("config");
}
