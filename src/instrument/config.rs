//! Type-safe configuration value objects for the instrument-family adapters.
//!
//! Raw cycler exports differ in file layout, column headers, condition codes and
//! current sign convention. Everything that varies between installations lives
//! here so the adapters themselves stay layout-agnostic.

use crate::core::Condition;
use crate::error::{AppResult, CyclerError};
use serde::{Deserialize, Serialize};

/// Maps raw header names to sample fields.
///
/// # Examples
///
/// ```toml
/// [continuous.columns]
/// time = "PassTime[Sec]"
/// voltage = "Voltage[V]"
/// current = "Current[mA]"
/// capacity = "Capacity[mAh]"
/// condition = "Condition"
/// temperature = "Temp1[Deg]"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ColumnMap {
    /// Elapsed time in seconds
    pub time: String,
    /// Terminal voltage in volts
    pub voltage: String,
    /// Current in milliamps
    pub current: String,
    /// Cumulative capacity in mAh
    pub capacity: String,
    /// Condition code (rest / charge / discharge)
    pub condition: String,
    /// Temperature in °C; optional in the file even when configured
    #[serde(default)]
    pub temperature: Option<String>,
}

/// Textual condition codes used by one instrument family.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConditionCodes {
    pub rest: String,
    pub charge: String,
    pub discharge: String,
}

impl ConditionCodes {
    /// Decodes a raw condition field.
    pub fn decode(&self, raw: &str) -> Option<Condition> {
        let code = raw.trim();
        if code == self.rest {
            Some(Condition::Rest)
        } else if code == self.charge {
            Some(Condition::Charge)
        } else if code == self.discharge {
            Some(Condition::Discharge)
        } else {
            None
        }
    }

    fn validate(&self, section: &str) -> AppResult<()> {
        let codes = [&self.rest, &self.charge, &self.discharge];
        if codes.iter().any(|c| c.trim().is_empty()) {
            return Err(CyclerError::Configuration(format!(
                "{section}.condition_codes must not be empty"
            )));
        }
        if self.rest == self.charge || self.rest == self.discharge || self.charge == self.discharge
        {
            return Err(CyclerError::Configuration(format!(
                "{section}.condition_codes must be distinct, got {:?}",
                codes
            )));
        }
        Ok(())
    }
}

/// How the raw current column encodes direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentSign {
    /// Current is already signed (discharge negative).
    Signed,
    /// Current is a magnitude; direction comes from the condition code.
    ByCondition,
}

impl CurrentSign {
    /// Applies the sign convention to a raw current reading.
    pub fn apply(self, raw_ma: f64, condition: Condition) -> f64 {
        match self {
            CurrentSign::Signed => raw_ma,
            CurrentSign::ByCondition => match condition {
                Condition::Discharge => -raw_ma.abs(),
                Condition::Charge => raw_ma.abs(),
                Condition::Rest => raw_ma,
            },
        }
    }
}

/// Layout shared by both families' delimited text tables.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TableLayout {
    /// Field delimiter (single ASCII character)
    pub delimiter: char,
    pub columns: ColumnMap,
    pub condition_codes: ConditionCodes,
    pub current_sign: CurrentSign,
}

impl TableLayout {
    /// The delimiter as the byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> AppResult<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                CyclerError::Configuration(format!(
                    "delimiter must be a single ASCII character, got {:?}",
                    self.delimiter
                ))
            })
    }

    fn validate(&self, section: &str) -> AppResult<()> {
        self.delimiter_byte()?;
        self.condition_codes.validate(section)?;
        let required = [
            &self.columns.time,
            &self.columns.voltage,
            &self.columns.current,
            &self.columns.capacity,
            &self.columns.condition,
        ];
        if required.iter().any(|c| c.trim().is_empty()) {
            return Err(CyclerError::Configuration(format!(
                "{section}.columns must name every required column"
            )));
        }
        Ok(())
    }
}

/// Configuration for the segmented (one file per cycle) family.
///
/// # Examples
///
/// ```toml
/// [segmented]
/// marker_dir = "Pattern"
/// sub_path = "Restore"
/// file_prefix = "SaveData"
/// file_extension = "csv"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SegmentedConfig {
    /// Directory whose presence beside the data identifies this family
    pub marker_dir: String,
    /// Sub-path holding the per-cycle files
    pub sub_path: String,
    /// Filename prefix preceding the cycle number
    pub file_prefix: String,
    /// Filename extension following the cycle number
    pub file_extension: String,
    #[serde(flatten)]
    pub layout: TableLayout,
}

impl SegmentedConfig {
    /// Human-readable naming scheme used in error messages.
    pub fn naming_scheme(&self) -> String {
        format!("{}<N>.{}", self.file_prefix, self.file_extension)
    }

    /// Creates a configuration from a TOML value.
    pub fn from_toml(config: &toml::Value) -> AppResult<Self> {
        config
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| CyclerError::Configuration(e.to_string()))
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> AppResult<()> {
        if self.marker_dir.trim().is_empty() {
            return Err(CyclerError::Configuration(
                "segmented.marker_dir must not be empty".into(),
            ));
        }
        if self.file_prefix.is_empty() || self.file_extension.is_empty() {
            return Err(CyclerError::Configuration(
                "segmented.file_prefix and segmented.file_extension must not be empty".into(),
            ));
        }
        self.layout.validate("segmented")
    }
}

impl Default for SegmentedConfig {
    fn default() -> Self {
        Self {
            marker_dir: "Pattern".into(),
            sub_path: "Restore".into(),
            file_prefix: "SaveData".into(),
            file_extension: "csv".into(),
            layout: TableLayout {
                delimiter: ',',
                columns: ColumnMap {
                    time: "Time[s]".into(),
                    voltage: "Voltage[V]".into(),
                    current: "Current[mA]".into(),
                    capacity: "Capacity[mAh]".into(),
                    condition: "StepType".into(),
                    temperature: Some("Temp[C]".into()),
                },
                condition_codes: ConditionCodes {
                    rest: "3".into(),
                    charge: "1".into(),
                    discharge: "2".into(),
                },
                current_sign: CurrentSign::Signed,
            },
        }
    }
}

/// Configuration for the continuous-log (single raw table) family.
///
/// # Examples
///
/// ```toml
/// [continuous]
/// raw_file_names = ["rawdata.txt", "raw_data.txt"]
/// raw_extensions = ["txt", "csv"]
/// delimiter = "\t"
/// current_sign = "by_condition"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContinuousLogConfig {
    /// Conventional raw-table names, checked in order
    pub raw_file_names: Vec<String>,
    /// Extensions accepted when falling back to the first available file
    pub raw_extensions: Vec<String>,
    #[serde(flatten)]
    pub layout: TableLayout,
}

impl ContinuousLogConfig {
    /// Creates a configuration from a TOML value.
    pub fn from_toml(config: &toml::Value) -> AppResult<Self> {
        config
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| CyclerError::Configuration(e.to_string()))
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> AppResult<()> {
        if self.raw_extensions.is_empty() {
            return Err(CyclerError::Configuration(
                "continuous.raw_extensions must list at least one extension".into(),
            ));
        }
        self.layout.validate("continuous")
    }
}

impl Default for ContinuousLogConfig {
    fn default() -> Self {
        Self {
            raw_file_names: vec![
                "rawdata.txt".into(),
                "raw_data.txt".into(),
                "rawdata.csv".into(),
            ],
            raw_extensions: vec!["txt".into(), "csv".into()],
            layout: TableLayout {
                delimiter: '\t',
                columns: ColumnMap {
                    time: "PassTime[Sec]".into(),
                    voltage: "Voltage[V]".into(),
                    current: "Current[mA]".into(),
                    capacity: "Capacity[mAh]".into(),
                    condition: "Condition".into(),
                    temperature: Some("Temp1[Deg]".into()),
                },
                condition_codes: ConditionCodes {
                    rest: "0".into(),
                    charge: "1".into(),
                    discharge: "2".into(),
                },
                current_sign: CurrentSign::ByCondition,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SegmentedConfig::default().validate().is_ok());
        assert!(ContinuousLogConfig::default().validate().is_ok());
    }

    #[test]
    fn test_condition_decode_trims() {
        let codes = ContinuousLogConfig::default().layout.condition_codes;
        assert_eq!(codes.decode(" 1 "), Some(Condition::Charge));
        assert_eq!(codes.decode("0"), Some(Condition::Rest));
        assert_eq!(codes.decode("9"), None);
    }

    #[test]
    fn test_duplicate_condition_codes_rejected() {
        let mut config = ContinuousLogConfig::default();
        config.layout.condition_codes.charge = "0".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let mut config = SegmentedConfig::default();
        config.layout.delimiter = '§';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_current_sign_by_condition() {
        assert_eq!(
            CurrentSign::ByCondition.apply(250.0, Condition::Discharge),
            -250.0
        );
        assert_eq!(CurrentSign::ByCondition.apply(250.0, Condition::Charge), 250.0);
        assert_eq!(CurrentSign::Signed.apply(-250.0, Condition::Charge), -250.0);
    }

    #[test]
    fn test_from_toml() {
        let value: toml::Value = toml::from_str(
            r#"
            marker_dir = "Pattern"
            sub_path = "Restore"
            file_prefix = "Cyc"
            file_extension = "txt"
            delimiter = ";"
            current_sign = "signed"

            [columns]
            time = "t"
            voltage = "v"
            current = "i"
            capacity = "q"
            condition = "c"

            [condition_codes]
            rest = "R"
            charge = "C"
            discharge = "D"
            "#,
        )
        .unwrap();
        let config = SegmentedConfig::from_toml(&value).unwrap();
        assert_eq!(config.naming_scheme(), "Cyc<N>.txt");
        assert_eq!(config.layout.delimiter_byte().unwrap(), b';');
        assert_eq!(config.layout.columns.temperature, None);
    }
}
