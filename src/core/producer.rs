use crate::adapters::codec::{decode_record, decode_record_list, Format};
use crate::domain::model::{CustomerRecord, ReadMode};
use crate::domain::ports::{ByteStream, SourceHandle};
use crate::utils::error::ScanError;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc::{Sender, UnboundedSender};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerStats {
    pub sent: usize,
    pub failed: usize,
}

/// Reads the opened source, decodes records and feeds them to the scan.
///
/// Returning drops `records`, which is how the consumer learns the stream has
/// ended. The source is released on every path out of this function.
pub async fn produce(
    mut handle: SourceHandle,
    format: Format,
    mode: ReadMode,
    records: Sender<CustomerRecord>,
    errors: UnboundedSender<ScanError>,
) -> ProducerStats {
    let label = handle.label().to_string();
    let stats = match handle.reader_mut() {
        Some(reader) => match mode {
            ReadMode::PerLine => read_lines(reader, format, &records, &errors).await,
            ReadMode::WholeDocument => read_document(reader, format, &records, &errors).await,
        },
        None => ProducerStats::default(),
    };
    handle.release();

    tracing::debug!(
        source = %label,
        sent = stats.sent,
        failed = stats.failed,
        "producer reached end of stream"
    );
    stats
}

async fn read_lines(
    reader: &mut ByteStream,
    format: Format,
    records: &Sender<CustomerRecord>,
    errors: &UnboundedSender<ScanError>,
) -> ProducerStats {
    let mut stats = ProducerStats::default();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        // read_until keeps a partial trailing fragment buffered until its newline or EOF
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                stats.failed += 1;
                let _ = errors.send(ScanError::Read(err));
                break;
            }
        }

        let payload = trim_line(&line);
        if payload.is_empty() {
            continue;
        }

        match decode_record(payload, format) {
            Ok(record) => {
                if records.send(record).await.is_err() {
                    tracing::debug!("record channel closed, producer stopping early");
                    break;
                }
                stats.sent += 1;
            }
            Err(err) => {
                stats.failed += 1;
                let _ = errors.send(ScanError::Decode(err));
            }
        }
    }

    stats
}

async fn read_document(
    reader: &mut ByteStream,
    format: Format,
    records: &Sender<CustomerRecord>,
    errors: &UnboundedSender<ScanError>,
) -> ProducerStats {
    let mut stats = ProducerStats::default();
    let mut data = Vec::new();

    if let Err(err) = reader.read_to_end(&mut data).await {
        stats.failed += 1;
        let _ = errors.send(ScanError::Read(err));
        return stats;
    }

    let list = match decode_record_list(&data, format) {
        Ok(list) => list,
        Err(err) => {
            stats.failed += 1;
            let _ = errors.send(ScanError::Decode(err));
            return stats;
        }
    };

    for record in list.customers {
        if records.send(record).await.is_err() {
            tracing::debug!("record channel closed, producer stopping early");
            break;
        }
        stats.sent += 1;
    }
    stats
}

fn trim_line(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    let start = line[..end]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(end);
    &line[start..end]
}
