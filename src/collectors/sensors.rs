use super::{run_command, ExternalToolError};
use crate::config::CommandConfig;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Префикс ключей, которые `sensors -j` использует для температурных датчиков.
pub const SENSOR_PREFIX: &str = "temp";
pub const INPUT_SUFFIX: &str = "_input";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SensorNode {
    Number(f64),
    Object(HashMap<String, SensorNode>),
    /// Строки, массивы, null и прочие метаданные адаптеров.
    Other(IgnoredAny),
}

pub type SensorTree = HashMap<String, SensorNode>;

#[derive(Debug, Error)]
#[error("некорректный JSON в выводе sensors: {0}")]
pub struct MalformedDataError(#[from] serde_json::Error);

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub label: String,
    pub value: f64,
}

pub async fn read_sensors(cmd: &CommandConfig) -> Result<String, ExternalToolError> {
    run_command(cmd).await
}

pub fn parse_sensor_tree(raw: &str) -> Result<SensorTree, MalformedDataError> {
    Ok(serde_json::from_str(raw)?)
}

/// Разбирает вывод sensors и ищет первое показание выше порога.
pub fn exceeds_limit(raw: &str, limit: f64) -> Result<Option<Reading>, MalformedDataError> {
    let tree = parse_sensor_tree(raw)?;
    Ok(find_breach(&tree, limit))
}

pub fn find_breach(tree: &SensorTree, limit: f64) -> Option<Reading> {
    for (key, node) in tree {
        let SensorNode::Object(children) = node else {
            continue;
        };

        if key.starts_with(SENSOR_PREFIX) {
            let input_key = format!("{key}{INPUT_SUFFIX}");
            if let Some(SensorNode::Number(value)) = children.get(&input_key) {
                if *value > limit {
                    return Some(Reading {
                        label: key.clone(),
                        value: *value,
                    });
                }
            }
        } else if let Some(reading) = find_breach(children, limit) {
            return Some(reading);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
   "coretemp-isa-0000":{
      "Adapter": "ISA adapter",
      "Package id 0":{
         "temp1_input": 48.000,
         "temp1_max": 100.000
      },
      "Core 0":{
         "temp2_input": 45.000,
         "temp2_max": 100.000,
         "temp2_crit_alarm": 0.000
      },
      "Core 1":{
         "temp3_input": 83.000,
         "temp3_max": 100.000
      }
   },
   "acpitz-acpi-0":{
      "Adapter": "ACPI interface",
      "temp1":{
         "temp1_input": 27.800,
         "temp1_crit": 119.000
      }
   },
   "nvme-pci-0100":{
      "Adapter": "PCI adapter",
      "Composite":{
         "temp1_input": 39.850,
         "temp1_alarm": 0.000
      }
   }
}"#;

    #[test]
    fn direct_reading_above_limit_is_breach() {
        let found = exceeds_limit(r#"{"temp1": {"temp1_input": 85.0}}"#, 80.0).expect("json");
        assert_eq!(
            found,
            Some(Reading {
                label: "temp1".to_string(),
                value: 85.0
            })
        );
    }

    #[test]
    fn reading_below_limit_is_not_breach() {
        let found = exceeds_limit(r#"{"temp1": {"temp1_input": 70.0}}"#, 80.0).expect("json");
        assert!(found.is_none());
    }

    #[test]
    fn recurses_into_chip_groups() {
        let raw = r#"{"coretemp-isa-0000": {"temp1": {"temp1_input": 90.0}}}"#;
        assert!(exceeds_limit(raw, 80.0).expect("json").is_some());
    }

    #[test]
    fn reading_equal_to_limit_is_not_breach() {
        let raw = r#"{"temp1": {"temp1_input": 80.0}}"#;
        assert!(exceeds_limit(raw, 80.0).expect("json").is_none());
    }

    #[test]
    fn trees_without_sensor_keys_never_breach() {
        // Числа выше порога, но ни одного ключа с префиксом temp.
        let raw = r#"{
            "nvme-pci-0100": {"Adapter": "PCI adapter", "Composite": {"fan1_input": 5000.0}},
            "power": {"in0": {"in0_input": 999.0}},
            "flag": true,
            "list": [1, 2, 3],
            "nothing": null
        }"#;
        assert!(exceeds_limit(raw, 1.0).expect("json").is_none());
    }

    #[test]
    fn real_sensors_output_breaches_only_with_low_limit() {
        // Ключи вида "Core 1" не начинаются с temp, поэтому в них рекурсия.
        // Внутри них показания лежат листьями, а не объектами temp*.
        assert!(exceeds_limit(SAMPLE, 80.0).expect("json").is_none());
        assert_eq!(
            exceeds_limit(SAMPLE, 20.0).expect("json"),
            Some(Reading {
                label: "temp1".to_string(),
                value: 27.8
            })
        );
    }

    #[test]
    fn sensor_key_without_input_is_not_recursed() {
        let raw = r#"{"temp1": {"temp2": {"temp2_input": 95.0}}}"#;
        assert!(exceeds_limit(raw, 80.0).expect("json").is_none());
    }

    #[test]
    fn non_numeric_input_is_skipped() {
        let raw = r#"{"temp1": {"temp1_input": "95.0"}, "temp2": {"temp2_input": 96.0}}"#;
        assert_eq!(
            exceeds_limit(raw, 80.0).expect("json").map(|r| r.label),
            Some("temp2".to_string())
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(exceeds_limit("sensors: command not found", 80.0).is_err());
        assert!(exceeds_limit("", 80.0).is_err());
    }

    #[test]
    fn non_object_root_is_malformed() {
        assert!(exceeds_limit("[1, 2]", 80.0).is_err());
        assert!(exceeds_limit("85.0", 80.0).is_err());
    }
}
