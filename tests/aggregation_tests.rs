// Aggregation tests: per-minute means and the seconds -> minute pass

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{FlakyStore, TEN_AM, at};
use usagemon::aggregation::aggregate_samples;
use usagemon::aggregation_worker::{
    AggregationWorkerConfig, PassReport, run_one_pass, save_with_retry,
};
use usagemon::models::{AggregatedRecord, MetricSample, MetricType, NewRecord, RecordId};
use usagemon::sample_buffer::SampleBuffer;
use usagemon::store::{MemoryStore, RecordStore, StoreError};

fn sample(metric_type: MetricType, value: f64, timestamp: i64) -> MetricSample {
    MetricSample::new(metric_type, value, timestamp)
}

fn pass_config(max_write_attempts: u32) -> AggregationWorkerConfig {
    AggregationWorkerConfig {
        interval: Duration::from_secs(60),
        max_write_attempts,
        retry_backoff: Duration::from_millis(1),
    }
}

#[test]
fn aggregate_samples_empty_returns_nothing() {
    assert!(aggregate_samples(&[]).is_empty());
}

#[test]
fn aggregate_samples_means_within_minute() {
    let samples = vec![
        sample(MetricType::Cpu, 10.0, at(0, 5)),
        sample(MetricType::Cpu, 20.0, at(0, 45)),
    ];
    let out = aggregate_samples(&samples);
    assert_eq!(
        out,
        vec![NewRecord {
            metric_type: MetricType::Cpu,
            value: 15.0,
            timestamp: TEN_AM,
        }]
    );
}

#[test]
fn aggregate_samples_one_record_per_type_and_bucket() {
    let samples = vec![
        sample(MetricType::Memory, 40.0, at(0, 10)),
        sample(MetricType::Cpu, 30.0, at(0, 59)),
        sample(MetricType::Cpu, 90.0, at(1, 0)),
        sample(MetricType::Memory, 60.0, at(0, 30)),
    ];
    let out = aggregate_samples(&samples);
    assert_eq!(out.len(), 3);

    assert_eq!(out[0].metric_type, MetricType::Cpu);
    assert_eq!(out[0].timestamp, TEN_AM);
    assert_eq!(out[0].value, 30.0);

    assert_eq!(out[1].metric_type, MetricType::Memory);
    assert_eq!(out[1].timestamp, TEN_AM);
    assert_eq!(out[1].value, 50.0);

    assert_eq!(out[2].metric_type, MetricType::Cpu);
    assert_eq!(out[2].timestamp, at(1, 0));
    assert_eq!(out[2].value, 90.0);
}

#[test]
fn aggregate_samples_bucket_is_minute_aligned() {
    let out = aggregate_samples(&[sample(MetricType::Cpu, 1.0, at(3, 59) + 999)]);
    assert_eq!(out[0].timestamp, at(3, 0));
    assert_eq!(out[0].timestamp % 60_000, 0);
}

#[tokio::test]
async fn run_one_pass_empty_buffer_writes_nothing() {
    let buffer = SampleBuffer::new();
    let store = FlakyStore::default();
    let report = run_one_pass(&buffer, &store, &pass_config(3)).await;
    assert_eq!(report, PassReport::default());
    assert_eq!(store.save_attempts(), 0);
}

#[tokio::test]
async fn run_one_pass_writes_and_clears() {
    let buffer = SampleBuffer::new();
    buffer.put(MetricType::Cpu, 12.5, at(0, 7));
    buffer.put(MetricType::Memory, 48.0, at(0, 8));
    let store = MemoryStore::new();

    let report = run_one_pass(&buffer, &store, &pass_config(3)).await;
    assert_eq!(
        report,
        PassReport {
            samples_read: 2,
            records_written: 2,
            records_failed: 0,
        }
    );
    assert!(buffer.is_empty());

    let records = store.fetch_all().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.timestamp == TEN_AM));
    let cpu = store.fetch_latest(MetricType::Cpu).await.unwrap().unwrap();
    assert_eq!(cpu.value, 12.5);
}

#[tokio::test]
async fn run_one_pass_retries_transient_failures() {
    let buffer = SampleBuffer::new();
    buffer.put(MetricType::Cpu, 33.0, at(0, 1));
    let store = FlakyStore::failing_saves(2);

    let report = run_one_pass(&buffer, &store, &pass_config(3)).await;
    assert_eq!(report.records_written, 1);
    assert_eq!(report.records_failed, 0);
    assert_eq!(store.save_attempts(), 3);
    assert_eq!(store.fetch_all().await.unwrap().len(), 1);
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn run_one_pass_clears_buffer_after_retries_exhausted() {
    let buffer = SampleBuffer::new();
    buffer.put(MetricType::Cpu, 33.0, at(0, 1));
    buffer.put(MetricType::Memory, 44.0, at(0, 2));
    let store = FlakyStore::failing_saves(u32::MAX);

    let report = run_one_pass(&buffer, &store, &pass_config(2)).await;
    assert_eq!(report.samples_read, 2);
    assert_eq!(report.records_written, 0);
    assert_eq!(report.records_failed, 2);
    assert_eq!(store.save_attempts(), 4);
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn save_with_retry_gives_up_after_max_attempts() {
    let store = FlakyStore::failing_saves(5);
    let record = NewRecord {
        metric_type: MetricType::Memory,
        value: 1.0,
        timestamp: TEN_AM,
    };
    let err = save_with_retry(&store, &record, &pass_config(3))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert_eq!(store.save_attempts(), 3);
}

/// Puts a newer CPU sample into the buffer while the pass is writing.
struct InterleavingStore {
    inner: MemoryStore,
    buffer: Arc<SampleBuffer>,
}

#[async_trait]
impl RecordStore for InterleavingStore {
    async fn save(&self, record: &NewRecord) -> Result<RecordId, StoreError> {
        self.buffer.put(MetricType::Cpu, 99.0, at(1, 2));
        self.inner.save(record).await
    }

    async fn fetch_all(&self) -> Result<Vec<AggregatedRecord>, StoreError> {
        self.inner.fetch_all().await
    }

    async fn fetch_latest(
        &self,
        metric_type: MetricType,
    ) -> Result<Option<AggregatedRecord>, StoreError> {
        self.inner.fetch_latest(metric_type).await
    }

    async fn fetch_range(
        &self,
        from_ts: i64,
        to_ts: i64,
        limit: u32,
    ) -> Result<Vec<AggregatedRecord>, StoreError> {
        self.inner.fetch_range(from_ts, to_ts, limit).await
    }

    async fn prune_before(&self, cutoff_ts: i64) -> Result<u64, StoreError> {
        self.inner.prune_before(cutoff_ts).await
    }

    async fn vacuum(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn run_one_pass_keeps_sample_written_during_pass() {
    let buffer = Arc::new(SampleBuffer::new());
    buffer.put(MetricType::Cpu, 10.0, at(0, 30));
    buffer.put(MetricType::Memory, 20.0, at(0, 30));
    let store = InterleavingStore {
        inner: MemoryStore::new(),
        buffer: buffer.clone(),
    };

    let report = run_one_pass(&buffer, &store, &pass_config(3)).await;
    assert_eq!(report.records_written, 2);
    assert_eq!(
        buffer.get_all(),
        vec![sample(MetricType::Cpu, 99.0, at(1, 2))]
    );

    // The surviving sample is folded by the next pass.
    let report = run_one_pass(&buffer, &store, &pass_config(3)).await;
    assert_eq!(report.samples_read, 1);
    let latest = store.inner.fetch_latest(MetricType::Cpu).await.unwrap().unwrap();
    assert_eq!(latest.timestamp, at(1, 0));
    assert_eq!(latest.value, 99.0);
}

#[tokio::test(start_paused = true)]
async fn save_with_retry_caps_first_backoff() {
    let store = FlakyStore::failing_saves(1);
    let record = NewRecord {
        metric_type: MetricType::Cpu,
        value: 1.0,
        timestamp: TEN_AM,
    };
    let config = AggregationWorkerConfig {
        interval: Duration::from_secs(60),
        max_write_attempts: 2,
        retry_backoff: Duration::from_secs(3600),
    };

    let start = tokio::time::Instant::now();
    save_with_retry(&store, &record, &config).await.unwrap();
    assert_eq!(store.save_attempts(), 2);
    assert!(start.elapsed() <= Duration::from_secs(10), "{:?}", start.elapsed());
}
