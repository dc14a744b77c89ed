//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[sqlite]
path = /var/lib/arbot/segments.db

[signal]
buy_threshold = 8
sell_threshold = -5

[datasets]
source = bitfinex_btcusd
orderbook = kuna_orderbook
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/arbot/segments.db".to_string())
        );
        assert_eq!(
            adapter.get_string("datasets", "source"),
            Some("bitfinex_btcusd".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[signal]\nbuy_threshold = 8\n").unwrap();
        assert_eq!(adapter.get_string("signal", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value() {
        let adapter = FileConfigAdapter::from_string("[signal]\nlag_bars = 10\n").unwrap();
        assert_eq!(adapter.get_int("signal", "lag_bars", 0), 10);
    }

    #[test]
    fn get_int_returns_default_for_missing() {
        let adapter = FileConfigAdapter::from_string("[signal]\n").unwrap();
        assert_eq!(adapter.get_int("signal", "missing", 42), 42);
    }

    #[test]
    fn get_int_returns_default_for_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[signal]\nlag_bars = abc\n").unwrap();
        assert_eq!(adapter.get_int("signal", "lag_bars", 42), 42);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[trader]\ninitial_equity = 1000.5\n").unwrap();
        assert_eq!(adapter.get_double("trader", "initial_equity", 0.0), 1000.5);
    }

    #[test]
    fn get_double_returns_default_for_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[trader]\ninitial_equity = not_a_number\n").unwrap();
        assert_eq!(adapter.get_double("trader", "initial_equity", 99.9), 99.9);
    }

    #[test]
    fn get_bool_parses_common_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[store]\na = true\nb = yes\nc = 0\n").unwrap();
        assert!(adapter.get_bool("store", "a", false));
        assert!(adapter.get_bool("store", "b", false));
        assert!(!adapter.get_bool("store", "c", true));
        assert!(adapter.get_bool("store", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let content = "[sqlite]\npath = segments.db\n";
        let file = create_temp_config(content);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("segments.db".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }

    #[test]
    fn negative_threshold_survives_round_trip() {
        let adapter = FileConfigAdapter::from_string("[signal]\nsell_threshold = -5\n").unwrap();
        assert_eq!(adapter.get_double("signal", "sell_threshold", 0.0), -5.0);
    }
}
