//! Batch processing with item-based partitioning
//!
//! This module provides the `BatchProcessor`, which replays a batch of
//! intents with as much concurrency as the engine's locking allows while
//! keeping the order of intents per item.
//!
//! # Design
//!
//! A batch is split into three phases:
//!
//! 1. **Setup** (`user`, `item`): applied first, in order.
//! 2. **Item partitions**: every rental intent grouped by the item it acts
//!    on. Partitions run concurrently on tokio tasks; intents inside a
//!    partition run in order.
//! 3. **Wallet** (`withdraw`): applied last, in order, once every partition
//!    has finished.
//!
//! Rental intents other than `request` only carry a label, so the processor
//! remembers which item each label was requested on, across batches. An
//! intent naming a label that no earlier `request` introduced fails where it
//! stands, as it would in a sequential replay.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, warn};

use crate::core::replay::IntentProcessor;
use crate::types::{Intent, ItemId, RentalError, RentalRef};

/// Result of replaying a single intent
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The intent that was applied
    pub intent: Intent,

    /// The result of applying it
    pub result: Result<(), RentalError>,
}

/// A batch split into its phases
#[derive(Debug, Default, PartialEq)]
pub struct PartitionedBatch {
    pub setup: Vec<Intent>,
    pub by_item: HashMap<ItemId, Vec<Intent>>,
    pub trailing: Vec<Intent>,
    pub unknown: Vec<Intent>,
}

#[derive(Debug, Clone)]
pub struct BatchProcessor {
    processor: IntentProcessor,
    label_items: Arc<DashMap<RentalRef, ItemId>>,
}

impl BatchProcessor {
    pub fn new(processor: IntentProcessor) -> Self {
        Self {
            processor,
            label_items: Arc::new(DashMap::new()),
        }
    }

    /// Split a batch into setup, per-item partitions, trailing intents and
    /// intents naming an unknown label
    pub fn partition_by_item(&self, batch: Vec<Intent>) -> PartitionedBatch {
        let mut partitioned = PartitionedBatch::default();

        for intent in batch {
            match &intent {
                Intent::RegisterUser { .. } | Intent::ListItem { .. } => {
                    partitioned.setup.push(intent);
                }
                Intent::Withdraw { .. } => partitioned.trailing.push(intent),
                Intent::Request { rental, item, .. } => {
                    self.label_items.entry(*rental).or_insert(*item);
                    partitioned.by_item.entry(*item).or_default().push(intent);
                }
                other => {
                    let item = other
                        .rental_ref()
                        .and_then(|label| self.label_items.get(&label).map(|item| *item.value()));
                    match item {
                        Some(item) => partitioned.by_item.entry(item).or_default().push(intent),
                        None => partitioned.unknown.push(intent),
                    }
                }
            }
        }

        partitioned
    }

    /// Apply intents in order
    pub async fn process_in_order(&self, intents: Vec<Intent>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(intents.len());
        for intent in intents {
            let result = self.processor.process(intent.clone());
            results.push(ProcessingResult { intent, result });
        }
        results
    }

    /// Replay a batch
    ///
    /// # Returns
    ///
    /// One result per intent. Results of different partitions are not in
    /// input order.
    pub async fn process_batch(&self, batch: Vec<Intent>) -> Vec<ProcessingResult> {
        let PartitionedBatch {
            setup,
            by_item,
            trailing,
            unknown,
        } = self.partition_by_item(batch);

        let mut results = self.process_in_order(setup).await;
        results.extend(unknown.into_iter().map(|intent| {
            let label = intent.rental_ref().unwrap_or_default();
            ProcessingResult {
                intent,
                result: Err(RentalError::validation(format!(
                    "unknown rental label {}",
                    label
                ))),
            }
        }));

        let mut tasks = Vec::with_capacity(by_item.len());
        for (_item, intents) in by_item {
            let processor = self.clone();
            tasks.push(tokio::spawn(
                async move { processor.process_in_order(intents).await },
            ));
        }
        for task in tasks {
            match task.await {
                Ok(item_results) => results.extend(item_results),
                Err(e) => {
                    error!(error = ?e, "item partition task panicked");
                }
            }
        }

        results.extend(self.process_in_order(trailing).await);

        for failed in results.iter().filter(|r| r.result.is_err()) {
            if let Err(e) = &failed.result {
                warn!(kind = failed.intent.kind(), rental = ?failed.intent.rental_ref(), error = %e, "intent failed");
            }
        }
        results
    }
}
