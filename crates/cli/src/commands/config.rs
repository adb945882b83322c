//! Effective configuration, secrets masked

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use qatrain_common::HarnessConfig;

use crate::output::{print_list, print_serialized, OutputFormat, TableDisplay};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
}

impl TableDisplay for SettingRow {
    fn headers() -> Vec<&'static str> {
        vec!["Setting", "Value"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.key.clone(), self.value.clone()]
    }
}

/// Flatten nested settings into dotted keys
pub fn flatten(prefix: &str, value: &Value, rows: &mut Vec<SettingRow>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&key, child, rows);
            }
        }
        Value::Null => rows.push(SettingRow {
            key: prefix.to_string(),
            value: "-".to_string(),
        }),
        Value::String(s) => rows.push(SettingRow {
            key: prefix.to_string(),
            value: s.clone(),
        }),
        other => rows.push(SettingRow {
            key: prefix.to_string(),
            value: other.to_string(),
        }),
    }
}

pub fn execute(config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let redacted = config.redacted();
    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_serialized(&redacted, format),
        OutputFormat::Table | OutputFormat::Plain => {
            let mut rows = Vec::new();
            flatten("", &serde_json::to_value(&redacted)?, &mut rows);
            print_list(&rows, format);
        }
    }
    Ok(())
}
