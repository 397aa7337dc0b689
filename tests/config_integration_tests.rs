// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use multistore::config::{BackendKind, ConfigLoader, ValidationStrategy};
use multistore::{
    load_config, load_config_with_env, EncryptionAlgorithm, LoadBalancingStrategy, ObjectClient,
    ReplicationMode, ValidationPolicy,
};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("multistore.yaml");
    fs::write(&path, content).expect("Failed to write temp config");
    path
}

#[test]
fn test_full_config_with_env_vars() {
    let dir = TempDir::new().unwrap();
    let config = format!(
        r#"
client:
  replication: async
  load_balancing: round_robin
  operation_timeout_seconds: 15

cache:
  enabled: true
  max_size_mb: 8
  ttl_seconds: 120
  max_items: 50
  validation:
    strategy: sampling
    sampling_percent: 25
    interval_seconds: 60

backends:
  - name: disk
    type: filesystem
    base_path: {}
    properties:
      is_main_instance: true
      save_compress: gzip
  - name: gateway
    type: http
    url: ${{MULTISTORE_IT_GATEWAY:-http://default-gateway:9000}}
    api_token: ${{MULTISTORE_IT_TOKEN}}
    properties:
      save_encrypt: aes256
      encrypt_key: ${{MULTISTORE_IT_KEY:-fallback-key}}

logging:
  level: debug
  format: json
"#,
        dir.path().join("objects").display()
    );
    let path = write_config(&dir, &config);

    std::env::set_var("MULTISTORE_IT_GATEWAY", "http://gateway.internal:9000");

    let config = load_config(&path).expect("config should load");

    assert_eq!(config.client.replication, ReplicationMode::Async);
    assert_eq!(config.client.load_balancing, LoadBalancingStrategy::RoundRobin);
    assert_eq!(config.client.operation_timeout(), Some(Duration::from_secs(15)));

    let options = config.cache.to_options();
    assert!(options.enabled);
    assert_eq!(options.max_size_mb, 8);
    assert_eq!(options.ttl, Duration::from_secs(120));
    assert_eq!(options.max_items, 50);
    assert_eq!(config.cache.validation.strategy, ValidationStrategy::Sampling);
    assert_eq!(
        options.validation,
        ValidationPolicy::Sampling {
            percent: 25,
            interval: Duration::from_secs(60)
        }
    );

    match &config.backends[1].kind {
        BackendKind::Http(http) => {
            assert_eq!(http.url, "http://gateway.internal:9000");
            // Unset variable without default is kept verbatim
            assert_eq!(http.api_token.as_deref(), Some("${MULTISTORE_IT_TOKEN}"));
            assert_eq!(http.timeout_seconds, 300);
        }
        other => panic!("expected http backend, got {}", other.type_name()),
    }
    assert_eq!(
        config.backends[1].properties.encrypt_key.as_deref(),
        Some("fallback-key")
    );
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");

    std::env::remove_var("MULTISTORE_IT_GATEWAY");
}

#[test]
fn test_encrypt_key_from_environment() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
backends:
  - name: vault
    type: memory
    properties:
      is_main_instance: true
      save_encrypt: aes256
"#,
    );

    // Missing key fails validation
    assert!(load_config(&path).is_err());

    std::env::set_var("MULTISTORE_ENCRYPT_KEY", "from-env");
    let config = load_config_with_env(&path);
    std::env::remove_var("MULTISTORE_ENCRYPT_KEY");

    let config = config.expect("env key should satisfy validation");
    let props = &config.backends[0].properties;
    assert_eq!(props.save_encrypt, EncryptionAlgorithm::Aes256);
    assert_eq!(props.encrypt_key.as_deref(), Some("from-env"));
}

#[test]
fn test_validation_errors() {
    let cases = [
        ("backends: []", "at least one backend"),
        (
            "backends:\n  - {name: a, type: memory}\n  - {name: a, type: memory}",
            "duplicate backend name",
        ),
        ("backends:\n  - {name: a, type: http, url: ''}", "url"),
        (
            "cache:\n  max_items: 0\nbackends:\n  - {name: a, type: memory}",
            "max_items",
        ),
    ];

    for (yaml, expected) in cases {
        let config = ConfigLoader::parse_str(yaml).expect("yaml should parse");
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(
            err.to_string().contains(expected),
            "expected '{}' in '{}'",
            expected,
            err
        );
    }
}

#[tokio::test]
async fn test_filesystem_containers_must_exist_by_default() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
backends:
  - name: disk
    type: filesystem
    base_path: {}
    properties:
      is_main_instance: true
"#,
            dir.path().join("objects").display()
        ),
    );

    let config = load_config(&path).unwrap();
    match &config.backends[0].kind {
        BackendKind::Filesystem(fs_config) => assert!(!fs_config.create_containers),
        other => panic!("expected filesystem backend, got {}", other.type_name()),
    }

    let client = ObjectClient::from_config(&config).await.unwrap();
    let err = client
        .put_object("docs", "a.txt", &b"x"[..])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("container 'docs' does not exist"), "{}", err);

    fs::create_dir_all(dir.path().join("objects/docs")).unwrap();
    client.put_object("docs", "a.txt", &b"x"[..]).await.unwrap();
}

#[test]
fn test_missing_file() {
    assert!(load_config("/nonexistent/multistore.yaml").is_err());
}

#[tokio::test]
async fn test_client_from_config_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
cache:
  enabled: true
backends:
  - name: disk
    type: filesystem
    base_path: {}
    create_containers: true
    properties:
      is_main_instance: true
      save_compress: gzip
      save_encrypt: aes256
      encrypt_key: disk-key
  - name: mirror
    type: memory
    containers: [docs]
    properties:
      is_main_instance: true
"#,
            dir.path().join("objects").display()
        ),
    );

    let config = load_config(&path).unwrap();
    let client = ObjectClient::from_config(&config).await.unwrap();
    assert_eq!(client.backends().len(), 2);
    assert!(client.cache().is_enabled());

    client
        .put_object("docs", "notes/today.txt", &b"written through config"[..])
        .await
        .unwrap();

    let on_disk = fs::read(dir.path().join("objects/docs/notes/today.txt")).unwrap();
    assert_ne!(on_disk.as_slice(), b"written through config");

    assert_eq!(
        client.get_object("docs", "notes/today.txt").await.unwrap(),
        "written through config"
    );
    assert!(client.exists_object("docs", "notes/today.txt").await.unwrap());

    client.remove_object("docs", "notes/today.txt").await.unwrap();
    assert!(!client.exists_object("docs", "notes/today.txt").await.unwrap());
    assert!(!dir.path().join("objects/docs/notes/today.txt").exists());

    client.shutdown().await;
}
