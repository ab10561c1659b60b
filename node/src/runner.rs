//! Runs every peer of a local cluster on its own task.

use std::{io, sync::Arc};

use comms::{Config, LocalCluster, Record};
use futures::future::join_all;
use log::info;
use machine_learning::ModelRegistry;

use crate::{Dispatcher, NodeErr, Result, driver::DriverRegistry};

const KEY_SEPARATOR: char = '\t';

/// Reads one record per non blank line.
///
/// A line is `key<TAB>value`, a line without a tab is keyed by its 1-based line number.
pub fn read_records(input: &str) -> Vec<Record> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| match line.split_once(KEY_SEPARATOR) {
            Some((key, value)) => Record::new(key, value),
            None => Record::new((i + 1).to_string(), line),
        })
        .collect()
}

/// Deals `records` round-robin to every peer but the coordinator.
///
/// # Arguments
/// * `records` - The whole input.
/// * `size` - The amount of peers.
/// * `coordinator` - The index of the peer that gets no records.
///
/// # Returns
/// One shard per peer, or `NodeErr::Layout` if there is no worker to deal to.
pub fn shard(records: Vec<Record>, size: usize, coordinator: usize) -> Result<Vec<Vec<Record>>> {
    if coordinator >= size {
        return Err(NodeErr::Layout(format!(
            "coordinator index {coordinator} out of range for {size} peers"
        )));
    }

    let workers: Vec<_> = (0..size).filter(|&index| index != coordinator).collect();
    if workers.is_empty() {
        return Err(NodeErr::Layout("a cluster needs at least one worker".to_string()));
    }

    let mut shards = vec![Vec::new(); size];
    for (i, record) in records.into_iter().enumerate() {
        shards[workers[i % workers.len()]].push(record);
    }

    Ok(shards)
}

/// Starts a local cluster over `shards` and runs every peer's role to completion.
///
/// # Arguments
/// * `config` - The configuration every peer sees.
/// * `shards` - The input of every peer.
/// * `models` - The models workers can be configured with.
/// * `drivers` - The drivers the coordinator can be configured with.
///
/// # Returns
/// The finished cluster, holding everything the peers logged and wrote.
pub async fn run_local(
    config: Config,
    shards: Vec<Vec<Record>>,
    models: Arc<ModelRegistry>,
    drivers: Arc<DriverRegistry>,
) -> Result<LocalCluster> {
    let (cluster, peers) = comms::cluster(config, shards);
    info!(peers = cluster.size(); "starting local cluster");

    let tasks = peers.into_iter().map(|mut peer| {
        let mut dispatcher = Dispatcher::new(Arc::clone(&models), Arc::clone(&drivers));

        tokio::spawn(async move {
            dispatcher.setup(&mut peer).await;
            dispatcher.bsp(&mut peer).await;
            dispatcher.cleanup(&mut peer).await;
        })
    });

    for joined in join_all(tasks).await {
        joined.map_err(io::Error::other)?;
    }

    Ok(cluster)
}
