use crate::domain::model::{ClassificationOutcome, CustomerSummary, OutputMode, ResultBucketSet};
use tokio::sync::mpsc::UnboundedReceiver;

/// Collects classification outcomes into buckets.
///
/// The aggregator is owned by a single task and fed through a channel, so any
/// number of workers can append concurrently without sharing a lock. Buckets
/// can only be read through [`ResultAggregator::finish`], which consumes it.
#[derive(Debug)]
pub struct ResultAggregator {
    mode: OutputMode,
    invited: Vec<CustomerSummary>,
    excluded: Vec<CustomerSummary>,
}

impl ResultAggregator {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            invited: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Simple mode keeps invited customers only; excluded outcomes are dropped.
    pub fn append(&mut self, outcome: ClassificationOutcome) {
        match (outcome, self.mode) {
            (ClassificationOutcome::Included(summary), _) => self.invited.push(summary),
            (ClassificationOutcome::Excluded(summary), OutputMode::Detailed) => {
                self.excluded.push(summary)
            }
            (ClassificationOutcome::Excluded(_), OutputMode::Simple) => {}
        }
    }

    pub fn len(&self) -> usize {
        self.invited.len() + self.excluded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> ResultBucketSet {
        match self.mode {
            OutputMode::Simple => ResultBucketSet::Simple {
                invited: self.invited,
            },
            OutputMode::Detailed => ResultBucketSet::Detailed {
                invited: self.invited,
                excluded: self.excluded,
            },
        }
    }

    /// Drains the outcome channel until every sender is gone.
    pub async fn run(mut self, mut outcomes: UnboundedReceiver<ClassificationOutcome>) -> ResultBucketSet {
        while let Some(outcome) = outcomes.recv().await {
            self.append(outcome);
        }
        tracing::debug!(stored = self.len(), "result aggregator finished");
        self.finish()
    }
}
