//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::protocol::record::META_FIELDS;
use crate::storage::table::TableMode;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,

    pub baud_rate: u32,

    /// Port open/read timeout
    pub timeout_ms: u64,

    /// Poll cadence of the acquisition loop. An empty poll re-polls
    /// immediately; this is deliberately tight for a local serial link.
    pub poll_interval_ms: u64,
}

/// Acquisition configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Target sample count. Absent means unbounded streaming over a ring
    /// table; nothing is persisted in that mode.
    pub samples: Option<usize>,

    /// Channel readings per record, on top of the two bookkeeping fields
    pub channels: usize,

    /// Ring table row count when no sample target is configured
    pub ring_capacity: usize,
}

/// Data persistence configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,

    /// Lines per output file before rotation
    pub max_page_points: usize,
}

/// Live plot configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlotConfig {
    /// Channel indices per subplot, e.g. accelerometers on one, pressure
    /// transducers on another
    pub groups: Vec<Vec<usize>>,

    /// Expected y-axis range per subplot; must parallel `groups`
    pub ranges: Vec<[f64; 2]>,

    /// Redraw cadence of the visualization loop
    pub refresh_ms: u64,

    /// Width of the scrolling time window in bounded mode
    pub window_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 2000,
            poll_interval_ms: 1,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            samples: None,
            channels: 6,
            ring_capacity: 500,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            max_page_points: 100_000,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            groups: vec![vec![0, 1, 2], vec![3, 4, 5]],
            ranges: vec![[0.0, 1050.0], [0.0, 1050.0]],
            refresh_ms: 100,
            window_ms: 5000,
        }
    }
}

impl AcquisitionConfig {
    /// Fields per record: the two bookkeeping fields plus the channels
    pub fn record_width(&self) -> usize {
        META_FIELDS + self.channels
    }

    /// Table write discipline implied by the presence of a sample target
    pub fn table_mode(&self) -> TableMode {
        match self.samples {
            Some(target) => TableMode::Bounded { target },
            None => TableMode::Ring {
                capacity: self.ring_capacity,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "serial port cannot be empty",
            )));
        }

        if self.serial.baud_rate == 0 {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "baud_rate must be greater than 0",
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "timeout_ms must be between 1 and 10000",
            )));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 1000 {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "poll_interval_ms must be between 1 and 1000",
            )));
        }

        if self.acquisition.channels == 0 || self.acquisition.channels > 64 {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "channels must be between 1 and 64",
            )));
        }

        if self.acquisition.samples == Some(0) {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "samples must be greater than 0 when set",
            )));
        }

        if self.acquisition.ring_capacity == 0 {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "ring_capacity must be greater than 0",
            )));
        }

        if self.storage.data_dir.is_empty() {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "data_dir cannot be empty",
            )));
        }

        if self.storage.max_page_points == 0 {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "max_page_points must be greater than 0",
            )));
        }

        if self.plot.groups.is_empty() {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "plot groups cannot be empty",
            )));
        }

        if self.plot.groups.len() != self.plot.ranges.len() {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "plot ranges must have one [min, max] entry per group",
            )));
        }

        for group in &self.plot.groups {
            for &channel in group {
                if channel >= self.acquisition.channels {
                    return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                        format!(
                            "plot channel index {} is out of bounds (must be 0-{})",
                            channel,
                            self.acquisition.channels - 1
                        ),
                    )));
                }
            }
        }

        for range in &self.plot.ranges {
            if range[0] >= range[1] {
                return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                    "plot range min must be less than max",
                )));
            }
        }

        if self.plot.refresh_ms == 0 || self.plot.refresh_ms > 10000 {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "refresh_ms must be between 1 and 10000",
            )));
        }

        if self.plot.window_ms == 0 {
            return Err(crate::error::DaqError::Config(toml::de::Error::custom(
                "window_ms must be greater than 0",
            )));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            acquisition: AcquisitionConfig::default(),
            storage: StorageConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values_match_device_conventions() {
        let config = Config::default();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.timeout_ms, 2000);
        assert_eq!(config.acquisition.channels, 6);
        assert_eq!(config.acquisition.ring_capacity, 500);
        assert_eq!(config.storage.max_page_points, 100_000);
        assert_eq!(config.plot.groups, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(config.plot.window_ms, 5000);
    }

    #[test]
    fn test_record_width() {
        let config = Config::default();
        assert_eq!(config.acquisition.record_width(), 8);
    }

    #[test]
    fn test_table_mode_bounded_when_samples_set() {
        let mut config = Config::default();
        config.acquisition.samples = Some(1000);
        assert_eq!(
            config.acquisition.table_mode(),
            TableMode::Bounded { target: 1000 }
        );
    }

    #[test]
    fn test_table_mode_ring_when_samples_absent() {
        let config = Config::default();
        assert_eq!(
            config.acquisition.table_mode(),
            TableMode::Ring { capacity: 500 }
        );
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB0"

[acquisition]
samples = 1000
channels = 4

[storage]
max_page_points = 250

[plot]
groups = [[0, 1], [2, 3]]
ranges = [[0.0, 1050.0], [-500.0, 500.0]]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.acquisition.samples, Some(1000));
        assert_eq!(config.acquisition.record_width(), 6);
        assert_eq!(config.storage.max_page_points, 250);
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"").unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert!(config.acquisition.samples.is_none());
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_out_of_range() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());

        config.serial.timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_out_of_range() {
        let mut config = Config::default();
        config.serial.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.serial.poll_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_channels() {
        let mut config = Config::default();
        config.acquisition.channels = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_samples_rejected() {
        let mut config = Config::default();
        config.acquisition.samples = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ring_capacity() {
        let mut config = Config::default();
        config.acquisition.ring_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_page_points() {
        let mut config = Config::default();
        config.storage.max_page_points = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_groups_and_ranges_must_parallel() {
        let mut config = Config::default();
        config.plot.ranges = vec![[0.0, 1050.0]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_plot_channel_out_of_bounds() {
        let mut config = Config::default();
        config.plot.groups = vec![vec![0, 6]]; // channel 6 does not exist
        config.plot.ranges = vec![[0.0, 1050.0]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_plot_range() {
        let mut config = Config::default();
        config.plot.ranges = vec![[1050.0, 0.0], [0.0, 1050.0]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_window() {
        let mut config = Config::default();
        config.plot.window_ms = 0;
        assert!(config.validate().is_err());
    }
}
