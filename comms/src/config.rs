use std::{
    collections::BTreeMap,
    error::Error,
    fmt::{self, Display},
    str::FromStr,
};

use serde_json::Value;

/// The keys the runtime reads from the configuration.
pub mod keys {
    /// Index of the peer acting as coordinator.
    pub const COORDINATOR_INDEX: &str = "coordinator.index";
    /// Run mode, `train` or `test`.
    pub const MODE: &str = "mode";
    /// Registry key of the model constructor used by the workers.
    pub const MODEL_FACTORY: &str = "model.factory";
    /// Registry key of the driver invoked by the coordinator.
    pub const DRIVER: &str = "driver.entry_point";
    /// Whitespace separated weight vector broadcast by the bundled drivers.
    pub const DRIVER_WEIGHTS: &str = "driver.weights";
    /// Amount of training rounds run by the broadcast driver.
    pub const DRIVER_ROUNDS: &str = "driver.rounds";
    /// Size of the local cluster started by the binary.
    pub const PEERS: &str = "peers";
    /// Amount of classes of the bundled graph model.
    pub const MODEL_STATES: &str = "model.n_states";
    /// Width of the node feature rows of the bundled graph model.
    pub const MODEL_FEATURES: &str = "model.n_features";
    /// Width of the edge feature rows of the bundled graph model.
    pub const MODEL_EDGE_FEATURES: &str = "model.n_edge_features";
    /// Sweep limit of the iterated conditional modes inference.
    pub const MODEL_ICM_ITERATIONS: &str = "model.icm_iterations";
}

/// Errors produced while reading the configuration.
#[derive(Debug)]
pub enum ConfigErr {
    MissingKey(String),
    InvalidValue { key: String, value: String },
    Parse(String),
}

impl Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErr::MissingKey(key) => write!(f, "missing configuration key `{key}`"),
            ConfigErr::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for configuration key `{key}`")
            }
            ConfigErr::Parse(detail) => write!(f, "invalid configuration document: {detail}"),
        }
    }
}

impl Error for ConfigErr {}

/// Read-only run configuration, string keys mapped to their textual values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    entries: BTreeMap<String, String>,
}

impl Config {
    /// Parses a configuration out of a flat JSON object.
    ///
    /// Scalars (numbers and booleans) are stored in their textual form.
    ///
    /// # Arguments
    /// * `s` - The JSON document.
    ///
    /// # Returns
    /// The configuration or a `ConfigErr::Parse` if the document is not a flat object.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigErr> {
        let value: Value = serde_json::from_str(s).map_err(|e| ConfigErr::Parse(e.to_string()))?;

        let Value::Object(map) = value else {
            return Err(ConfigErr::Parse("expected a JSON object".into()));
        };

        let mut entries = BTreeMap::new();
        for (key, value) in map {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    let detail = format!("key `{key}` holds a non scalar value: {other}");
                    return Err(ConfigErr::Parse(detail));
                }
            };

            entries.insert(key, text);
        }

        Ok(Self { entries })
    }

    /// Looks up the raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Looks up a required value.
    ///
    /// # Returns
    /// The value or `ConfigErr::MissingKey`.
    pub fn get_str(&self, key: &str) -> Result<&str, ConfigErr> {
        self.get(key)
            .ok_or_else(|| ConfigErr::MissingKey(key.to_string()))
    }

    /// Looks up a required value and parses it into `T`.
    ///
    /// # Returns
    /// The parsed value, `ConfigErr::MissingKey` or `ConfigErr::InvalidValue`.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<T, ConfigErr> {
        let value = self.get_str(key)?;
        value.trim().parse().map_err(|_| ConfigErr::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Looks up a required unsigned integer.
    pub fn get_usize(&self, key: &str) -> Result<usize, ConfigErr> {
        self.get_parsed(key)
    }

    /// Looks up an optional value and parses it, falling back to `default` when absent.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigErr> {
        match self.get(key) {
            Some(_) => self.get_parsed(key),
            None => Ok(default),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Config
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_scalars_are_stored_as_text() {
        let cfg = Config::from_json_str(
            r#"{"coordinator.index": 0, "mode": "train", "verbose": true}"#,
        )
        .unwrap();

        assert_eq!(cfg.get("coordinator.index"), Some("0"));
        assert_eq!(cfg.get_usize(keys::COORDINATOR_INDEX).unwrap(), 0);
        assert_eq!(cfg.get_str(keys::MODE).unwrap(), "train");
        assert_eq!(cfg.get("verbose"), Some("true"));
    }

    #[test]
    fn nested_values_are_rejected() {
        let res = Config::from_json_str(r#"{"mode": ["train"]}"#);
        assert!(matches!(res, Err(ConfigErr::Parse(_))));

        let res = Config::from_json_str("[1, 2]");
        assert!(matches!(res, Err(ConfigErr::Parse(_))));
    }

    #[test]
    fn missing_and_invalid_values() {
        let cfg: Config = [("coordinator.index", "zero")].into_iter().collect();

        assert!(matches!(
            cfg.get_usize(keys::COORDINATOR_INDEX),
            Err(ConfigErr::InvalidValue { .. })
        ));
        assert!(matches!(cfg.get_str(keys::MODE), Err(ConfigErr::MissingKey(_))));
        assert_eq!(cfg.get_or(keys::DRIVER_ROUNDS, 3usize).unwrap(), 3);
    }
}
