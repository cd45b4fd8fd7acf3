//! Batched hand-off of vegetation instances to the renderer.

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::Result;

use super::VegetationInstance;

/// Receiver of placed instances (the renderer's instancing layer).
/// Delivery can run on a spawned task, so sinks must be `Send`.
pub trait InstanceSink: Send {
    fn add_instance(&mut self, instance: &VegetationInstance) -> std::result::Result<(), String>;
}

impl InstanceSink for Vec<VegetationInstance> {
    fn add_instance(&mut self, instance: &VegetationInstance) -> std::result::Result<(), String> {
        self.push(instance.clone());
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    pub batches: usize,
}

/// Hand `instances` to `sink` in chunks of `batch_size`, yielding to the
/// scheduler between chunks. A failing instance is counted and skipped.
pub async fn deliver_in_batches(
    instances: &[VegetationInstance],
    sink: &mut dyn InstanceSink,
    batch_size: usize,
    cancel: &CancelToken,
) -> Result<DeliveryReport> {
    let mut report = DeliveryReport::default();

    for batch in instances.chunks(batch_size.max(1)) {
        cancel.check()?;

        for instance in batch {
            match sink.add_instance(instance) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("failed to create {} instance '{}': {}", instance.kind, instance.model, e);
                    report.failed += 1;
                }
            }
        }
        report.batches += 1;
        debug!("delivered batch {} ({} instances)", report.batches, batch.len());

        tokio::task::yield_now().await;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerrainError;
    use crate::vegetation::Vec3;

    fn instances(count: usize) -> Vec<VegetationInstance> {
        (0..count)
            .map(|i| VegetationInstance {
                kind: "forest".to_string(),
                model: if i % 10 == 3 { "broken" } else { "pine" }.to_string(),
                position: Vec3::new(i as f32, 0.0, 0.0),
                scale: 1.0,
                rotation: 0.0,
            })
            .collect()
    }

    /// Rejects one model and cancels after a number of deliveries
    struct PickySink {
        accepted: Vec<VegetationInstance>,
        cancel_after: Option<(usize, CancelToken)>,
    }

    impl InstanceSink for PickySink {
        fn add_instance(&mut self, instance: &VegetationInstance) -> std::result::Result<(), String> {
            if let Some((limit, token)) = &self.cancel_after {
                if self.accepted.len() + 1 >= *limit {
                    token.cancel();
                }
            }
            if instance.model == "broken" {
                return Err("missing model asset".to_string());
            }
            self.accepted.push(instance.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_batches_and_counts() {
        let all = instances(120);
        let mut sink: Vec<VegetationInstance> = Vec::new();
        let report = deliver_in_batches(&all, &mut sink, 50, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.delivered, 120);
        assert_eq!(sink, all);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_batch() {
        let all = instances(20);
        let mut sink = PickySink { accepted: Vec::new(), cancel_after: None };
        let report = deliver_in_batches(&all, &mut sink, 50, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 18);
        assert_eq!(sink.accepted.len(), 18);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_batches() {
        let all = instances(100);
        let token = CancelToken::new();
        let mut sink = PickySink {
            accepted: Vec::new(),
            cancel_after: Some((5, token.clone())),
        };
        let result = deliver_in_batches(&all, &mut sink, 10, &token).await;
        assert_eq!(result, Err(TerrainError::Cancelled));
        // The batch in flight completes, nothing after it
        assert!(sink.accepted.len() <= 10);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let mut sink: Vec<VegetationInstance> = Vec::new();
        let report = deliver_in_batches(&[], &mut sink, 50, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(report, DeliveryReport::default());
    }
}
