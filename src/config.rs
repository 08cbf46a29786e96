use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub journal_file: String,
    /// Appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            journal_file: "clubres.wal".into(),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read `CLUBRES_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("CLUBRES_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            journal_file: lookup("CLUBRES_JOURNAL_FILE")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.journal_file),
            compact_threshold: lookup("CLUBRES_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: lookup("CLUBRES_METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join(&self.journal_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.journal_path(), PathBuf::from("./data/clubres.wal"));
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("CLUBRES_DATA_DIR", "/var/lib/clubres"),
            ("CLUBRES_JOURNAL_FILE", "club.wal"),
            ("CLUBRES_COMPACT_THRESHOLD", "50"),
            ("CLUBRES_METRICS_PORT", "9100"),
        ]));
        assert_eq!(config.journal_path(), PathBuf::from("/var/lib/clubres/club.wal"));
        assert_eq!(config.compact_threshold, 50);
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    fn garbage_numbers_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("CLUBRES_COMPACT_THRESHOLD", "lots"),
            ("CLUBRES_METRICS_PORT", "99999"),
        ]));
        assert_eq!(config.compact_threshold, 1000);
        assert_eq!(config.metrics_port, None);
    }
}
