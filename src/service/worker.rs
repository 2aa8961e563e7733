use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{HvacOptimizerService, TrainingRequest};
use crate::training::{SampleSource, TrainingJob};

/// Queue side of the background training worker. Clone freely; the worker
/// stops once every handle is dropped.
#[derive(Clone)]
pub struct TrainingHandle {
    sender: mpsc::Sender<TrainingJob>,
    service: Arc<HvacOptimizerService>,
}

impl TrainingHandle {
    /// Validate and enqueue a training request. Progress is visible through
    /// the training history of the request's location.
    pub async fn submit(&self, request: &TrainingRequest) -> Result<()> {
        let job = self.service.training_job(request)?;
        info!(location = %job.location, sensor_id = ?job.sensor_id, "training queued");
        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow!("training worker stopped"))
    }
}

/// Run queued training jobs one at a time, off the request path
pub fn spawn_training_worker(
    service: Arc<HvacOptimizerService>,
    source: Arc<dyn SampleSource>,
) -> (TrainingHandle, JoinHandle<()>) {
    let (sender, mut receiver) =
        mpsc::channel::<TrainingJob>(service.config().worker.queue_depth.max(1));
    let pipeline = service.pipeline();

    let task = tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            if let Err(e) = pipeline.train(&job, source.as_ref()).await {
                warn!(
                    location = %job.location,
                    error = %format!("{e:#}"),
                    "background training failed"
                );
            }
        }
        info!("training worker stopped");
    });

    (TrainingHandle { sender, service }, task)
}
