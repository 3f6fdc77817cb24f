//! Seed file loading tests against on-disk TOML fixtures.
//!
//! The binary crate does not export a library, so these tests exercise the
//! same record shapes through `netvine-core` deserialization that the
//! daemon's seed loader relies on.

use std::io::Write;

use netvine_core::storage::{MemoryStore, Storage};
use netvine_core::types::{Field, FieldKind, InterfaceConfig, NftRule, Rule};

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SeedShape {
    fields: Vec<Field>,
    rules: Vec<Rule>,
    nft_rules: Vec<NftRule>,
    interfaces: Vec<InterfaceConfig>,
}

const SAMPLE: &str = r#"
[[fields]]
name = "tag"
offset = 40
length = 6
type = "hex"

[[fields]]
name = "src_ip"
type = "builtin"

[[rules]]
name = "retag"
priority = 10
match_condition = 'tag == "aabbccddeeff"'
actions = '[{"field": "tag", "op": "set", "value": "112233445566"}]'
output_options = '["compute_checksum"]'

[[nft_rules]]
name = "steer-http"
protocol = "tcp"
dst_port = "80"
action = "queue"
queue_num = "0-3"

[[interfaces]]
out_interface = "eth1"
link_type = "access"
vlan_id = "10"
"#;

#[test]
fn sample_seed_parses_and_stores() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();

    let raw = std::fs::read_to_string(file.path()).unwrap();
    let seed: SeedShape = toml::from_str(&raw).unwrap();

    assert_eq!(seed.fields.len(), 2);
    assert_eq!(seed.fields[0].kind, FieldKind::Hex);
    assert_eq!(seed.fields[1].kind, FieldKind::Builtin);
    assert_eq!(seed.rules[0].priority, 10);
    assert_eq!(seed.nft_rules[0].dst_port, "80");

    let store = MemoryStore::new();
    for field in &seed.fields {
        store.insert_field(field.clone()).unwrap();
    }
    for rule in &seed.rules {
        store.insert_rule(rule.clone()).unwrap();
    }
    for rule in &seed.nft_rules {
        store.insert_nft_rule(rule.clone()).unwrap();
    }
    for config in &seed.interfaces {
        store.upsert_interface_config(config.clone()).unwrap();
    }

    assert_eq!(store.fields().unwrap().len(), 2);
    assert_eq!(store.enabled_rules().unwrap().len(), 1);
    assert_eq!(store.enabled_nft_rules().unwrap().len(), 1);
    assert!(store.interface_config("eth1").unwrap().is_some());
}

#[test]
fn unknown_field_type_falls_back_to_hex() {
    let seed: SeedShape = toml::from_str(
        r#"
[[fields]]
name = "odd"
offset = 0
length = 2
type = "octal"
"#,
    )
    .unwrap();
    assert_eq!(seed.fields[0].kind, FieldKind::Hex);
}

#[test]
fn missing_sections_default_to_empty() {
    let seed: SeedShape = toml::from_str("").unwrap();
    assert!(seed.fields.is_empty());
    assert!(seed.rules.is_empty());
    assert!(seed.nft_rules.is_empty());
    assert!(seed.interfaces.is_empty());
}
