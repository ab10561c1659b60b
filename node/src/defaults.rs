//! The models and drivers a node knows out of the box.

use comms::{Config, ConfigErr, config::keys};
use machine_learning::{GraphCrf, InferenceMethod, ModelRegistry};

use crate::driver::{BroadcastDriver, DriverRegistry, PredictDriver};

/// Graph model labeling every node on its own.
pub const GRAPH_CRF: &str = "graph_crf";
/// Graph model refined with iterated conditional modes.
pub const GRAPH_CRF_ICM: &str = "graph_crf.icm";

pub const BROADCAST: &str = "broadcast";
pub const PREDICT: &str = "predict";

const DEFAULT_STATES: usize = 2;
const DEFAULT_FEATURES: usize = 2;
const DEFAULT_EDGE_FEATURES: usize = 1;
const DEFAULT_ICM_ITERATIONS: usize = 10;

/// Registers the bundled graph models, sized after the configuration.
///
/// # Returns
/// The model registry or a `ConfigErr` if a model dimension is invalid.
pub fn models(config: &Config) -> Result<ModelRegistry, ConfigErr> {
    let n_states = config.get_or(keys::MODEL_STATES, DEFAULT_STATES)?;
    let n_features = config.get_or(keys::MODEL_FEATURES, DEFAULT_FEATURES)?;
    let n_edge_features = config.get_or(keys::MODEL_EDGE_FEATURES, DEFAULT_EDGE_FEATURES)?;
    let max_iter = config.get_or(keys::MODEL_ICM_ITERATIONS, DEFAULT_ICM_ITERATIONS)?;

    let mut models = ModelRegistry::new("model");
    models
        .register(GRAPH_CRF, move || {
            Box::new(GraphCrf::new(n_states, n_features, n_edge_features))
        })
        .register(GRAPH_CRF_ICM, move || {
            Box::new(
                GraphCrf::new(n_states, n_features, n_edge_features)
                    .with_inference(InferenceMethod::Icm { max_iter }),
            )
        });

    Ok(models)
}

/// Registers the bundled drivers.
pub fn drivers() -> DriverRegistry {
    let mut drivers = DriverRegistry::new("driver");
    drivers
        .register(BROADCAST, || Box::new(BroadcastDriver))
        .register(PREDICT, || Box::new(PredictDriver));

    drivers
}
