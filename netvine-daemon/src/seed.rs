//! Declarative seeding of the in-process store.
//!
//! The administration surface is an external collaborator; at daemon
//! startup the record sets it would normally manage (fields, rules,
//! classifier rules, interface configs) are loaded from a TOML seed file
//! into the `MemoryStore`.

use std::path::Path;

use serde::Deserialize;

use netvine_core::error::{ConfigError, NetvineError};
use netvine_core::storage::Storage;
use netvine_core::types::{Field, FieldKind, InterfaceConfig, LinkType, NftRule, Rule};

/// Seed file contents. All sections are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    /// Field definitions.
    pub fields: Vec<Field>,
    /// Packet rewriting rules.
    pub rules: Vec<Rule>,
    /// Classifier rules.
    pub nft_rules: Vec<NftRule>,
    /// Interface VLAN configurations.
    pub interfaces: Vec<InterfaceConfig>,
}

/// Counts of applied records, for the startup log line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedCounts {
    pub fields: usize,
    pub rules: usize,
    pub nft_rules: usize,
    pub interfaces: usize,
}

impl SeedFile {
    /// Parse a seed file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::ParseFailed {
                    reason: e.to_string(),
                }
            }
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// Validate the records and insert them into the store.
    pub fn apply(&self, storage: &dyn Storage) -> Result<SeedCounts, NetvineError> {
        let mut counts = SeedCounts::default();

        for field in &self.fields {
            validate_field(field)?;
            storage.insert_field(field.clone())?;
            counts.fields += 1;
        }

        for rule in &self.rules {
            if rule.name.is_empty() {
                return Err(invalid("rules", "rule name must not be empty"));
            }
            storage.insert_rule(rule.clone())?;
            counts.rules += 1;
        }

        for rule in &self.nft_rules {
            if rule.name.is_empty() {
                return Err(invalid("nft_rules", "rule name must not be empty"));
            }
            storage.insert_nft_rule(rule.clone())?;
            counts.nft_rules += 1;
        }

        for config in &self.interfaces {
            // access + vlan_id "0" is the removal form of the admin
            // contract; at boot there is nothing to remove.
            if config.link_type == LinkType::Access && config.vlan_id == "0" {
                tracing::debug!(
                    interface = config.out_interface.as_str(),
                    "skipping removal-form interface entry in seed"
                );
                continue;
            }
            storage.upsert_interface_config(config.clone())?;
            counts.interfaces += 1;
        }

        Ok(counts)
    }
}

fn validate_field(field: &Field) -> Result<(), NetvineError> {
    if field.name.is_empty() {
        return Err(invalid("fields", "field name must not be empty"));
    }
    if field.kind != FieldKind::Builtin && field.length == 0 {
        return Err(invalid(
            "fields",
            &format!("field '{}' must have a non-zero length", field.name),
        ));
    }
    Ok(())
}

fn invalid(section: &str, reason: &str) -> NetvineError {
    ConfigError::InvalidValue {
        field: section.to_owned(),
        reason: reason.to_owned(),
    }
    .into()
}
