use crate::adapters::codec::{encode_report, Format};
use crate::config::ScanConfig;
use crate::core::orchestrator::ScanOrchestrator;
use crate::domain::model::{ScanReport, Termination};
use crate::domain::ports::TransportOpener;
use crate::utils::error::{InviteError, Result, ScanError};
use crate::utils::monitor::{ScanPhase, SystemMonitor};

/// Runs a scan and renders its result, logging resource usage per phase.
pub struct InviteEngine<T: TransportOpener> {
    orchestrator: ScanOrchestrator<T>,
    monitor: SystemMonitor,
}

impl<T: TransportOpener> InviteEngine<T> {
    pub fn new(orchestrator: ScanOrchestrator<T>) -> Self {
        Self::new_with_monitoring(orchestrator, false)
    }

    pub fn new_with_monitoring(orchestrator: ScanOrchestrator<T>, monitor_enabled: bool) -> Self {
        Self {
            orchestrator,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// Fails when the config is invalid or the source cannot be opened; any
    /// other problem is listed in the returned report.
    pub async fn scan(&self, config: &ScanConfig) -> Result<ScanReport> {
        self.monitor.record(ScanPhase::BeforeScan);
        let mut report = self.orchestrator.run(config).await;
        self.monitor.record(ScanPhase::AfterScan);

        if matches!(
            report.termination,
            Termination::SourceUnavailable | Termination::InvalidConfig
        ) {
            match report.errors.pop() {
                Some(ScanError::SourceOpen(err)) => return Err(InviteError::SourceError(err)),
                Some(ScanError::InvalidConfig { message }) => {
                    return Err(InviteError::ConfigError { message })
                }
                _ => {}
            }
        }

        tracing::info!(
            "Scanned {} records in {}ms",
            report.records_received,
            (report.finished_at - report.started_at).num_milliseconds()
        );
        Ok(report)
    }

    pub fn render(&self, report: &ScanReport, format: Format) -> Result<Vec<u8>> {
        let data = encode_report(&report.buckets, format)?;
        self.monitor.record(ScanPhase::Rendered);
        self.monitor.log_summary(report.records_received);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{SourceDescriptor, SourceHandle};
    use crate::utils::error::SourceOpenError;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct OneCustomer;

    #[async_trait]
    impl TransportOpener for OneCustomer {
        async fn open(&self, _source: &SourceDescriptor) -> std::result::Result<SourceHandle, SourceOpenError> {
            let line: &'static [u8] = b"{\"user_id\": 12, \"name\": \"Christina McArdle\", \"latitude\": \"52.986375\", \"longitude\": \"-6.043701\"}\n";
            Ok(SourceHandle::new("memory", Box::new(line)))
        }
    }

    #[tokio::test]
    async fn test_scan_and_render_text() {
        let engine = InviteEngine::new(ScanOrchestrator::new(OneCustomer));
        let config = ScanConfig::new(SourceDescriptor::File(PathBuf::from("memory"))).with_workers(1);

        let report = engine.scan(&config).await.unwrap();
        let text = String::from_utf8(engine.render(&report, Format::Text).unwrap()).unwrap();
        assert_eq!(text, "Invite Summary:\n[12] Christina McArdle\n");
    }

    #[tokio::test]
    async fn test_unopenable_source_is_an_error() {
        let engine = InviteEngine::new(ScanOrchestrator::with_default_transports());
        let config = ScanConfig::new(SourceDescriptor::File(PathBuf::from(
            "/no/such/dir/customers.txt",
        )));

        let err = engine.scan(&config).await.unwrap_err();
        assert!(matches!(err, InviteError::SourceError(SourceOpenError::File { .. })));
    }

    #[tokio::test]
    async fn test_invalid_config_is_a_config_error() {
        let engine = InviteEngine::new(ScanOrchestrator::new(OneCustomer));
        let config = ScanConfig::new(SourceDescriptor::File(PathBuf::from("memory")))
            .with_queue_capacity(0);

        let err = engine.scan(&config).await.unwrap_err();
        assert!(matches!(err, InviteError::ConfigError { .. }));
    }
}
