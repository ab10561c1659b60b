//! Picks a peer's role and runs its lifecycle so that nothing the role does can
//! escape: every error and panic ends up as a single line in the peer's log.

use std::{any::Any, error::Error, future::Future, panic::AssertUnwindSafe, sync::Arc};

use comms::Peer;
use futures::FutureExt;
use log::{debug, info};
use machine_learning::ModelRegistry;
use worker::{PredictWorker, TrainWorker, Worker};

use crate::{
    Coordinator, NodeErr, Result,
    config::{RoleConfig, RoleKind},
    driver::DriverRegistry,
};

enum Role {
    Coordinator(Coordinator),
    Worker(Box<dyn Worker>),
}

impl Role {
    async fn setup(&mut self, peer: &mut dyn Peer) -> Result<()> {
        match self {
            Role::Coordinator(coordinator) => coordinator.setup(peer).await,
            Role::Worker(worker) => Ok(worker.setup(peer).await?),
        }
    }

    async fn bsp(&mut self, peer: &mut dyn Peer) -> Result<()> {
        match self {
            Role::Coordinator(coordinator) => coordinator.bsp(peer).await,
            Role::Worker(worker) => Ok(worker.bsp(peer).await?),
        }
    }

    async fn cleanup(&mut self, peer: &mut dyn Peer) -> Result<()> {
        match self {
            Role::Coordinator(coordinator) => coordinator.cleanup(peer).await,
            Role::Worker(worker) => Ok(worker.cleanup(peer).await?),
        }
    }
}

/// Folds an error and its sources into a single line.
fn flatten(err: &NodeErr) -> String {
    let mut line = err.to_string();

    let mut source = err.source();
    while let Some(e) = source {
        let text = e.to_string();
        if !line.contains(&text) {
            line.push_str(": ");
            line.push_str(&text);
        }

        source = e.source();
    }

    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let msg = match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => msg.to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    };

    format!("panicked: {}", msg.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Awaits `fut`, turning both its error and any panic into a single line.
async fn contain<F>(fut: F) -> std::result::Result<(), String>
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(flatten(&e)),
        Err(payload) => Err(panic_message(payload)),
    }
}

/// Runs the role configured for a peer.
///
/// None of the lifecycle calls fail: whatever goes wrong inside the role is logged
/// through `Peer::log` and the call returns normally.
pub struct Dispatcher {
    models: Arc<ModelRegistry>,
    drivers: Arc<DriverRegistry>,
    kind: Option<RoleKind>,
    role: Option<Role>,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`.
    ///
    /// # Arguments
    /// * `models` - The models workers can be configured with.
    /// * `drivers` - The drivers the coordinator can be configured with.
    ///
    /// # Returns
    /// A new `Dispatcher` instance without a role.
    pub fn new(models: Arc<ModelRegistry>, drivers: Arc<DriverRegistry>) -> Self {
        Self {
            models,
            drivers,
            kind: None,
            role: None,
        }
    }

    /// The role picked by `setup`, if it could be picked.
    pub fn role_kind(&self) -> Option<RoleKind> {
        self.kind
    }

    fn choose(&self, peer: &dyn Peer) -> Result<(RoleKind, Role)> {
        let roles = RoleConfig::from_config(peer.config())?;
        let kind = roles.kind(peer.peer_index());

        let role = match kind {
            RoleKind::Coordinator => Role::Coordinator(Coordinator::new(Arc::clone(&self.drivers))),
            RoleKind::TrainWorker => Role::Worker(Box::new(TrainWorker::new(
                roles.coordinator,
                Arc::clone(&self.models),
            ))),
            RoleKind::PredictWorker => Role::Worker(Box::new(PredictWorker::new(
                roles.coordinator,
                Arc::clone(&self.models),
            ))),
        };

        Ok((kind, role))
    }

    /// Picks the peer's role and runs its setup.
    pub async fn setup(&mut self, peer: &mut dyn Peer) {
        let (kind, role) = match self.choose(peer) {
            Ok(chosen) => chosen,
            Err(e) => {
                peer.log(&format!("setup failed: {}", flatten(&e)));
                return;
            }
        };

        info!(peer = peer.peer_index(); "playing the {kind:?} role");
        self.kind = Some(kind);
        let role = self.role.insert(role);

        if let Err(line) = contain(role.setup(peer)).await {
            peer.log(&format!("setup failed: {line}"));
        }
    }

    /// Runs the role's supersteps.
    pub async fn bsp(&mut self, peer: &mut dyn Peer) {
        let Some(role) = self.role.as_mut() else {
            debug!(peer = peer.peer_index(); "no role, skipping bsp");
            return;
        };

        if let Err(line) = contain(role.bsp(peer)).await {
            peer.log(&format!("bsp failed: {line}"));
        }
    }

    pub async fn cleanup(&mut self, peer: &mut dyn Peer) {
        let Some(role) = self.role.as_mut() else {
            return;
        };

        if let Err(line) = contain(role.cleanup(peer)).await {
            peer.log(&format!("cleanup failed: {line}"));
        }
    }
}
