use std::{env, sync::Arc};

use comms::{Config, config::keys};
use log::info;
use tokio::fs;

use node::{NodeErr, Result, defaults, run_local, runner};

const DEFAULT_PEERS: usize = 2;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(config_path), Some(input_path)) = (args.next(), args.next()) else {
        return Err(NodeErr::Layout("usage: node <config.json> <input>".to_string()));
    };

    let config = Config::from_json_str(&fs::read_to_string(&config_path).await?)?;
    let input = fs::read_to_string(&input_path).await?;

    let size = config.get_or(keys::PEERS, DEFAULT_PEERS)?;
    let coordinator = config.get_usize(keys::COORDINATOR_INDEX)?;
    let shards = runner::shard(runner::read_records(&input), size, coordinator)?;

    let models = Arc::new(defaults::models(&config)?);
    let drivers = Arc::new(defaults::drivers());

    let cluster = run_local(config, shards, models, drivers).await?;
    info!(logged = cluster.logs().len(); "run finished");

    for record in cluster.outputs() {
        println!("{}\t{}", record.key, record.value);
    }

    Ok(())
}
