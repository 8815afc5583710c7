use crate::config::ScanConfig;
use crate::domain::distance::{distance, Coordinates};
use crate::domain::model::{ClassificationOutcome, CustomerRecord};
use crate::utils::error::ScanError;
use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, UnboundedSender};
use tokio::sync::Mutex;

/// Decides which bucket a record belongs to.
///
/// Returns a validation error, and no outcome, when either coordinate does
/// not parse as a finite number.
pub fn classify(
    record: &CustomerRecord,
    config: &ScanConfig,
) -> Result<ClassificationOutcome, ScanError> {
    let (latitude, longitude) = match (record.parsed_latitude(), record.parsed_longitude()) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(ScanError::Validation {
                user_id: record.user_id,
                name: record.name.clone(),
            })
        }
    };

    let dist = distance(
        config.reference,
        Coordinates::new(latitude, longitude),
        config.unit,
    );
    tracing::trace!(
        user_id = record.user_id,
        distance = dist,
        unit = %config.unit,
        "customer distance computed"
    );

    if dist <= config.max_distance {
        Ok(ClassificationOutcome::Included(record.summary()))
    } else {
        Ok(ClassificationOutcome::Excluded(record.summary()))
    }
}

pub type WorkQueue = Arc<Mutex<Receiver<CustomerRecord>>>;

/// One member of the classification pool. Pulls records until the queue is
/// closed and drained, then returns how many it handled.
pub async fn run_worker(
    worker_id: usize,
    queue: WorkQueue,
    config: Arc<ScanConfig>,
    outcomes: UnboundedSender<ClassificationOutcome>,
    errors: UnboundedSender<ScanError>,
) -> usize {
    let mut processed = 0;

    loop {
        let next = { queue.lock().await.recv().await };
        let Some(record) = next else {
            break;
        };
        processed += 1;

        match classify(&record, &config) {
            Ok(outcome) => {
                if outcomes.send(outcome).is_err() {
                    tracing::warn!(worker = worker_id, "aggregator gone, stopping worker");
                    break;
                }
            }
            Err(err) => {
                tracing::debug!(worker = worker_id, "{}", err);
                let _ = errors.send(err);
            }
        }
    }

    tracing::debug!(worker = worker_id, processed, "classification worker finished");
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::distance::DistanceUnit;
    use crate::domain::ports::SourceDescriptor;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn config() -> ScanConfig {
        ScanConfig::new(SourceDescriptor::File(PathBuf::from("unused")))
            .with_reference(53.339428, -6.257664)
            .with_max_distance(100.0, DistanceUnit::Kilometers)
    }

    fn record(user_id: i64, name: &str, lat: &str, lon: &str) -> CustomerRecord {
        CustomerRecord {
            user_id,
            name: name.to_string(),
            latitude: lat.to_string(),
            longitude: lon.to_string(),
        }
    }

    #[test]
    fn test_near_customer_is_included() {
        let outcome = classify(&record(12, "Thomas Barret", "53.339111", "-6.257611"), &config());
        assert!(outcome.unwrap().is_included());
    }

    #[test]
    fn test_far_customer_is_excluded() {
        let outcome = classify(&record(1, "Michael Barret", "50.339428", "-3.257664"), &config());
        let outcome = outcome.unwrap();
        assert!(!outcome.is_included());
        assert_eq!(outcome.summary().name, "Michael Barret");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let config = config().with_max_distance(0.0001, DistanceUnit::Kilometers);
        let outcome = classify(&record(5, "Exact", "53.339428", "-6.257664"), &config).unwrap();
        assert!(outcome.is_included());
    }

    #[test]
    fn test_invalid_coordinates_produce_validation_error() {
        let err = classify(&record(9, "Broken", "north", "-6.25"), &config()).unwrap_err();
        assert!(matches!(
            err,
            ScanError::Validation { user_id: 9, ref name } if name == "Broken"
        ));
        assert!(classify(&record(9, "Broken", "53.3", ""), &config()).is_err());
    }

    #[tokio::test]
    async fn test_worker_drains_queue_and_reports_errors() {
        let (work_tx, work_rx) = mpsc::channel(4);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let (error_tx, mut error_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_worker(
            0,
            Arc::new(Mutex::new(work_rx)),
            Arc::new(config()),
            outcome_tx,
            error_tx,
        ));

        work_tx
            .send(record(12, "Thomas Barret", "53.339111", "-6.257611"))
            .await
            .unwrap();
        work_tx
            .send(record(13, "Bad Data", "x", "y"))
            .await
            .unwrap();
        drop(work_tx);

        assert_eq!(worker.await.unwrap(), 2);
        assert!(outcome_rx.recv().await.unwrap().is_included());
        assert!(outcome_rx.recv().await.is_none());
        assert!(matches!(
            error_rx.recv().await,
            Some(ScanError::Validation { user_id: 13, .. })
        ));
    }
}
