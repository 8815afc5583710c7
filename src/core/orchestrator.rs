use crate::adapters::transport::SchemeOpener;
use crate::config::ScanConfig;
use crate::core::aggregator::ResultAggregator;
use crate::core::classifier::{self, WorkQueue};
use crate::core::producer::{self, ProducerStats};
use crate::domain::model::{ResultBucketSet, ScanReport, Termination};
use crate::domain::ports::TransportOpener;
use crate::utils::error::ScanError;
use crate::utils::validation::Validate;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Lifecycle of a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Opening,
    Running,
    Terminating,
    Done,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::Opening => "opening",
            ScanState::Running => "running",
            ScanState::Terminating => "terminating",
            ScanState::Done => "done",
        };
        f.write_str(name)
    }
}

fn advance(state: &mut ScanState, next: ScanState) {
    tracing::debug!(from = %state, to = %next, "scan state change");
    *state = next;
}

/// Runs scans against sources resolved by its transport opener.
pub struct ScanOrchestrator<T: TransportOpener> {
    opener: T,
}

impl ScanOrchestrator<SchemeOpener> {
    pub fn with_default_transports() -> Self {
        Self::new(SchemeOpener::new())
    }
}

impl<T: TransportOpener> ScanOrchestrator<T> {
    pub fn new(opener: T) -> Self {
        Self { opener }
    }

    /// Scans the configured source and classifies every record it yields.
    ///
    /// An invalid config or a source that cannot be opened stops the scan
    /// before any record is read. Decode and validation failures end up in
    /// the report next to whatever was classified.
    pub async fn run(&self, config: &ScanConfig) -> ScanReport {
        let started_at = Utc::now();
        let mut state = ScanState::Idle;

        if let Err(err) = config.validate() {
            tracing::error!("❌ Refusing to scan {}: {}", config.source, err);
            advance(&mut state, ScanState::Done);
            return aborted_report(
                config,
                started_at,
                Termination::InvalidConfig,
                ScanError::InvalidConfig {
                    message: err.to_string(),
                },
            );
        }

        advance(&mut state, ScanState::Opening);
        let handle = match self.opener.open(&config.source).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!("❌ Unable to open source {}: {}", config.source, err);
                advance(&mut state, ScanState::Done);
                return aborted_report(
                    config,
                    started_at,
                    Termination::SourceUnavailable,
                    ScanError::SourceOpen(err),
                );
            }
        };

        advance(&mut state, ScanState::Running);
        tracing::info!(
            "📥 Scanning {} ({} workers, {} input, {:?} mode)",
            handle.label(),
            config.workers,
            config.input_format,
            config.read_mode
        );

        let shared = Arc::new(config.clone());
        let (record_tx, mut record_rx) = mpsc::channel(config.queue_capacity);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let error_collector = tokio::spawn(collect_errors(error_rx));
        let aggregator = tokio::spawn(ResultAggregator::new(config.output_mode).run(outcome_rx));
        let producer = tokio::spawn(producer::produce(
            handle,
            config.input_format,
            config.read_mode,
            record_tx,
            error_tx.clone(),
        ));

        let (work_tx, work_rx) = mpsc::channel(config.workers * 2);
        let work_queue: WorkQueue = Arc::new(Mutex::new(work_rx));
        let mut workers = JoinSet::new();
        for worker_id in 0..config.workers {
            workers.spawn(classifier::run_worker(
                worker_id,
                Arc::clone(&work_queue),
                Arc::clone(&shared),
                outcome_tx.clone(),
                error_tx.clone(),
            ));
        }
        drop(outcome_tx);

        // Consumer loop: the producer dropping its sender is the end-of-stream
        // signal; the idle timeout only bounds a source that goes quiet.
        let mut records_received = 0usize;
        let termination = loop {
            match tokio::time::timeout(config.idle_timeout, record_rx.recv()).await {
                Ok(Some(record)) => {
                    records_received += 1;
                    tracing::trace!(user_id = record.user_id, "record received");
                    if work_tx.send(record).await.is_err() {
                        let _ = error_tx.send(ScanError::Task(
                            "all classification workers stopped".to_string(),
                        ));
                        break Termination::EndOfStream;
                    }
                }
                Ok(None) => break Termination::EndOfStream,
                Err(_) => break Termination::IdleTimeout,
            }
        };

        advance(&mut state, ScanState::Terminating);
        drop(record_rx);
        // Datagram sources have no end-of-stream, so going quiet is how they finish
        let idle_is_end = config.source.is_datagram();
        if termination == Termination::IdleTimeout {
            if idle_is_end {
                tracing::info!(
                    "⏱️ {} quiet for {:?}, treating as end of stream",
                    config.source,
                    config.idle_timeout
                );
            } else {
                tracing::warn!(
                    "⏱️ No record received for {:?}, stopping scan of {}",
                    config.idle_timeout,
                    config.source
                );
                let _ = error_tx.send(ScanError::IdleTimeout {
                    idle: config.idle_timeout,
                });
            }
            producer.abort();
        }
        match producer.await {
            Ok(stats) => log_producer(&stats),
            Err(err) if err.is_cancelled() => {
                tracing::debug!("producer cancelled after idle timeout")
            }
            Err(err) => {
                let _ = error_tx.send(ScanError::Task(format!("producer failed: {}", err)));
            }
        }

        // Closing the work queue lets workers drain what is queued and exit.
        drop(work_tx);
        let mut classified = 0usize;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(processed) => classified += processed,
                Err(err) => {
                    let _ = error_tx.send(ScanError::Task(format!(
                        "classification worker failed: {}",
                        err
                    )));
                }
            }
        }

        let buckets = match aggregator.await {
            Ok(buckets) => buckets,
            Err(err) => {
                let _ = error_tx.send(ScanError::Task(format!("aggregator failed: {}", err)));
                ResultBucketSet::empty(config.output_mode)
            }
        };

        drop(error_tx);
        let errors = match error_collector.await {
            Ok(errors) => errors,
            Err(err) => vec![ScanError::Task(format!("error collector failed: {}", err))],
        };

        advance(&mut state, ScanState::Done);
        let completed = errors.is_empty()
            && (termination == Termination::EndOfStream
                || (termination == Termination::IdleTimeout && idle_is_end));
        tracing::info!(
            "✅ Scan finished: {} received, {} classified, {} invited, {} errors",
            records_received,
            classified,
            buckets.invited().len(),
            errors.len()
        );

        ScanReport {
            buckets,
            errors,
            completed,
            termination,
            records_received,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Report for a scan that stopped before any record was read.
fn aborted_report(
    config: &ScanConfig,
    started_at: DateTime<Utc>,
    termination: Termination,
    error: ScanError,
) -> ScanReport {
    ScanReport {
        buckets: ResultBucketSet::empty(config.output_mode),
        errors: vec![error],
        completed: false,
        termination,
        records_received: 0,
        started_at,
        finished_at: Utc::now(),
    }
}

fn log_producer(stats: &ProducerStats) {
    tracing::debug!(
        sent = stats.sent,
        failed = stats.failed,
        "producer finished"
    );
}

/// Sole owner of the error list for the lifetime of a scan.
async fn collect_errors(mut errors: UnboundedReceiver<ScanError>) -> Vec<ScanError> {
    let mut collected = Vec::new();
    while let Some(err) = errors.recv().await {
        tracing::warn!("⚠️ {}", err);
        collected.push(err);
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::OutputMode;
    use crate::domain::ports::{SourceDescriptor, SourceHandle};
    use crate::utils::error::SourceOpenError;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Serves a fixed in-memory payload for any descriptor.
    struct MemoryOpener {
        payload: &'static [u8],
    }

    #[async_trait]
    impl TransportOpener for MemoryOpener {
        async fn open(&self, _source: &SourceDescriptor) -> Result<SourceHandle, SourceOpenError> {
            Ok(SourceHandle::new("memory", Box::new(self.payload)))
        }
    }

    struct FailingOpener;

    #[async_trait]
    impl TransportOpener for FailingOpener {
        async fn open(&self, _source: &SourceDescriptor) -> Result<SourceHandle, SourceOpenError> {
            Err(SourceOpenError::UnsupportedScheme("test".to_string()))
        }
    }

    fn config() -> ScanConfig {
        ScanConfig::new(SourceDescriptor::File(PathBuf::from("memory")))
            .with_workers(3)
            .with_idle_timeout(Duration::from_secs(5))
    }

    const TWO_CUSTOMERS: &[u8] = b"{\"latitude\": \"53.339111\", \"user_id\": 12, \"name\": \"Thomas Barret\", \"longitude\": \"-6.257611\"}\n{\"latitude\": \"50.339428\", \"user_id\": 1, \"name\": \"Michael Barret\", \"longitude\": \"-3.257664\"}\n";

    #[tokio::test]
    async fn test_scan_completes_on_end_of_stream() {
        let orchestrator = ScanOrchestrator::new(MemoryOpener {
            payload: TWO_CUSTOMERS,
        });

        let started = std::time::Instant::now();
        let report = orchestrator.run(&config()).await;

        // End of stream ends the scan without waiting out the idle window
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(report.completed);
        assert_eq!(report.termination, Termination::EndOfStream);
        assert_eq!(report.records_received, 2);
        assert_eq!(report.buckets.invited().len(), 1);
        assert_eq!(report.buckets.invited()[0].user_id, 12);
    }

    #[tokio::test]
    async fn test_detailed_mode_partitions_every_valid_record() {
        let orchestrator = ScanOrchestrator::new(MemoryOpener {
            payload: TWO_CUSTOMERS,
        });
        let report = orchestrator
            .run(&config().with_output_mode(OutputMode::Detailed))
            .await;

        let invited = report.buckets.invited().len();
        let excluded = report.buckets.excluded().unwrap().len();
        assert_eq!(invited + excluded, 2);
        assert_eq!(excluded, 1);
    }

    #[tokio::test]
    async fn test_open_failure_is_fatal() {
        let orchestrator = ScanOrchestrator::new(FailingOpener);
        let report = orchestrator
            .run(&config().with_output_mode(OutputMode::Detailed))
            .await;

        assert!(!report.completed);
        assert_eq!(report.termination, Termination::SourceUnavailable);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_fatal());
        assert!(report.buckets.is_detailed());
        assert!(report.buckets.invited().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_records_are_collected_not_fatal() {
        let orchestrator = ScanOrchestrator::new(MemoryOpener {
            payload: b"{\"user_id\": 4, \"name\": \"Ian Kehoe\", \"latitude\": \"abc\", \"longitude\": \"-6.2\"}\ngarbage\n{\"user_id\": 5, \"name\": \"Nora Dempsey\", \"latitude\": \"53.2451022\", \"longitude\": \"-6.238335\"}\n",
        });
        let report = orchestrator
            .run(&config().with_output_mode(OutputMode::Detailed))
            .await;

        assert!(!report.completed);
        assert_eq!(report.errors.len(), 2);
        let validation = report
            .errors
            .iter()
            .filter(|e| matches!(e, ScanError::Validation { user_id: 4, .. }))
            .count();
        assert_eq!(validation, 1);
        assert_eq!(report.buckets.invited().len(), 1);
        assert!(report.buckets.excluded().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_reported_without_panicking() {
        let orchestrator = ScanOrchestrator::new(MemoryOpener {
            payload: TWO_CUSTOMERS,
        });

        for bad in [config().with_workers(0), config().with_queue_capacity(0)] {
            let report = orchestrator.run(&bad).await;
            assert!(!report.completed);
            assert_eq!(report.termination, Termination::InvalidConfig);
            assert_eq!(report.records_received, 0);
            assert_eq!(report.errors.len(), 1);
            assert!(matches!(report.errors[0], ScanError::InvalidConfig { .. }));
            assert!(report.errors[0].is_fatal());
        }
    }

    /// Writes one record then leaves the stream open, like a datagram feed
    /// that has gone quiet.
    struct QuietOpener {
        writers: std::sync::Mutex<Vec<tokio::io::DuplexStream>>,
    }

    #[async_trait]
    impl TransportOpener for QuietOpener {
        async fn open(&self, _source: &SourceDescriptor) -> Result<SourceHandle, SourceOpenError> {
            use tokio::io::AsyncWriteExt;

            let (client, mut server) = tokio::io::duplex(1024);
            server
                .write_all(&TWO_CUSTOMERS[..TWO_CUSTOMERS.iter().position(|b| *b == b'\n').unwrap() + 1])
                .await
                .unwrap();
            self.writers.lock().unwrap().push(server);
            Ok(SourceHandle::new("quiet", Box::new(client)))
        }
    }

    #[tokio::test]
    async fn test_quiet_datagram_source_completes_cleanly() {
        let orchestrator = ScanOrchestrator::new(QuietOpener {
            writers: std::sync::Mutex::new(Vec::new()),
        });
        let config = ScanConfig::new(SourceDescriptor::Udp("127.0.0.1:19099".to_string()))
            .with_workers(2)
            .with_idle_timeout(Duration::from_millis(150));

        let report = orchestrator.run(&config).await;
        assert_eq!(report.termination, Termination::IdleTimeout);
        assert!(report.errors.is_empty());
        assert!(report.completed);
        assert_eq!(report.records_received, 1);
        assert_eq!(report.buckets.invited()[0].user_id, 12);
    }

    #[tokio::test]
    async fn test_quiet_stream_source_reports_timeout() {
        let orchestrator = ScanOrchestrator::new(QuietOpener {
            writers: std::sync::Mutex::new(Vec::new()),
        });
        let config = config().with_idle_timeout(Duration::from_millis(150));

        let report = orchestrator.run(&config).await;
        assert_eq!(report.termination, Termination::IdleTimeout);
        assert!(!report.completed);
        assert!(matches!(report.errors[..], [ScanError::IdleTimeout { .. }]));
    }
}
