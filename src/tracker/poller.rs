use std::fmt;
use std::time::{Duration, Instant};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::database::{CursorKey, CursorStore};
use crate::error::{EventError, MovekitError, TrackError};
use crate::gateway::RpcClient;
use crate::logging::{ErrorLogger, LogContext, MetricsLogger};
use crate::models::{classify, EventRecord, TransactionQuery, TransactionRecord};
use crate::tracker::FilterCriteria;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const DEFAULT_MODULE: &str = "oil_supply_chain";

/// Highest transaction version already processed. Never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark(Option<u64>);

impl Watermark {
    pub fn unset() -> Self {
        Self(None)
    }

    pub fn at(version: u64) -> Self {
        Self(Some(version))
    }

    pub fn value(&self) -> Option<u64> {
        self.0
    }

    /// True when `version` has already been processed
    pub fn covers(&self, version: u64) -> bool {
        matches!(self.0, Some(watermark) if version <= watermark)
    }

    /// Move up to `version` if it is higher; returns whether it moved
    pub fn advance(&mut self, version: u64) -> bool {
        if self.covers(version) {
            return false;
        }
        self.0 = Some(version);
        true
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(version) => write!(f, "{}", version),
            None => write!(f, "unset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval_ms: u64,
    pub page_limit: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Starting,
    Polling,
    Waiting,
    Stopped,
}

/// Destination for rendered event lines
pub trait EventSink {
    fn emit(&mut self, line: &str);
}

/// Writes each line to standard output
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        println!("{}", line);
    }
}

impl EventSink for Vec<String> {
    fn emit(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollCycleResult {
    /// Lines to emit, in (version, event index) order
    pub lines: Vec<String>,
    pub transactions_seen: usize,
    pub transactions_skipped: usize,
    pub events_filtered: usize,
    pub events_malformed: usize,
    pub watermark: Watermark,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub events_emitted: u64,
    pub watermark: Watermark,
}

/// Watches one account's transaction history and emits matching events exactly once
pub struct Poller {
    rpc_client: RpcClient,
    address: String,
    filter: FilterCriteria,
    config: PollerConfig,
    watermark: Watermark,
    state: PollerState,
    stats: PollerStats,
    cursor: Option<(CursorStore, CursorKey)>,
}

impl Poller {
    pub fn new(
        rpc_client: RpcClient,
        address: &str,
        filter: FilterCriteria,
        config: Option<PollerConfig>,
    ) -> Result<Self, TrackError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(TrackError::MissingAddress);
        }

        let config = config.unwrap_or_default();
        if config.poll_interval_ms == 0 {
            return Err(TrackError::InvalidInterval(config.poll_interval_ms));
        }

        Ok(Self {
            rpc_client,
            address: address.to_string(),
            filter,
            config,
            watermark: Watermark::unset(),
            state: PollerState::Starting,
            stats: PollerStats::default(),
            cursor: None,
        })
    }

    /// Load the watermark from `store` at start and save it after every advancing cycle
    pub fn with_cursor(mut self, store: CursorStore, key: CursorKey) -> Self {
        self.cursor = Some((store, key));
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn filter(&self) -> &FilterCriteria {
        &self.filter
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn stats(&self) -> &PollerStats {
        &self.stats
    }

    /// Poll until `shutdown` carries `true`. Fetch failures never end the loop.
    pub async fn run<S: EventSink>(
        &mut self,
        sink: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) -> PollerStats {
        self.start();
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.state = PollerState::Polling;
            // a stop during the fetch drops it before anything is emitted
            tokio::select! {
                _ = self.poll_once(sink) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }

            if *shutdown.borrow() {
                break;
            }

            self.state = PollerState::Waiting;
            if wait_or_shutdown(interval, &mut shutdown).await {
                break;
            }
        }

        self.state = PollerState::Stopped;
        self.stats.watermark = self.watermark;
        MetricsLogger::log_tracker_summary(
            &self.address,
            self.stats.cycles,
            self.stats.failed_cycles,
            self.stats.events_emitted,
        );

        self.stats.clone()
    }

    fn start(&mut self) {
        self.state = PollerState::Starting;

        if let Some((store, key)) = &self.cursor {
            match store.load(key) {
                Ok(Some(version)) => {
                    self.watermark = Watermark::at(version);
                    LogContext::new("tracker", "start")
                        .with_address(&self.address)
                        .with_version(version)
                        .info(&format!("Resuming from persisted watermark {}", version));
                }
                Ok(None) => {}
                Err(e) => {
                    let context = LogContext::new("tracker", "load_cursor").with_address(&self.address);
                    ErrorLogger::log_error(&MovekitError::Cursor(e), Some(context));
                }
            }
        }

        LogContext::new("tracker", "start")
            .with_address(&self.address)
            .with_endpoint(self.rpc_client.base_url())
            .with_metadata("filter", json!(self.filter.describe()))
            .with_metadata("interval_ms", json!(self.config.poll_interval_ms))
            .info(&format!("Tracking events for {} ({})", self.address, self.filter.describe()));
    }

    /// Run one fetch-and-process cycle, emitting surviving events to `sink`
    pub async fn poll_once<S: EventSink>(&mut self, sink: &mut S) -> Result<PollCycleResult, MovekitError> {
        let started = Instant::now();
        let query = TransactionQuery::with_limit(self.config.page_limit);

        let records = match self.rpc_client.get_account_transactions(&self.address, &query).await {
            Ok(records) => records,
            Err(e) => {
                self.stats.cycles += 1;
                self.stats.failed_cycles += 1;

                let error = MovekitError::from(e);
                let context = LogContext::new("tracker", "poll")
                    .with_address(&self.address)
                    .with_metadata("watermark", json!(self.watermark.value()));
                ErrorLogger::log_error(&error, Some(context));
                return Err(error);
            }
        };

        let previous = self.watermark;
        let result = self.process_batch(records);

        for line in &result.lines {
            sink.emit(line);
        }

        self.stats.cycles += 1;
        self.stats.events_emitted += result.lines.len() as u64;
        self.stats.watermark = self.watermark;

        if self.watermark != previous {
            self.persist_watermark();
        }

        MetricsLogger::log_poll_cycle(
            &self.address,
            result.transactions_seen,
            result.lines.len(),
            self.watermark.value(),
            started.elapsed().as_millis() as u64,
        );

        Ok(result)
    }

    /// Filter and render one fetched batch, advancing the watermark past every record processed
    pub fn process_batch(&mut self, mut records: Vec<TransactionRecord>) -> PollCycleResult {
        let mut result = PollCycleResult {
            transactions_seen: records.len(),
            ..PollCycleResult::default()
        };

        if !is_newest_first(&records) {
            LogContext::new("tracker", "process_batch")
                .with_address(&self.address)
                .debug("Batch was not newest-first, ordering by version");
        }
        records.sort_by_key(|record| record.version);

        for record in &records {
            if self.watermark.covers(record.version) {
                result.transactions_skipped += 1;
                continue;
            }

            for (index, event) in record.events.iter().enumerate() {
                match self.render_if_matching(event) {
                    Ok(Some(line)) => result.lines.push(format!("[v{}] {}", record.version, line)),
                    Ok(None) => result.events_filtered += 1,
                    Err(e) => {
                        result.events_malformed += 1;
                        LogContext::new("tracker", "process_batch")
                            .with_version(record.version)
                            .with_metadata("event_index", json!(index))
                            .debug(&format!("Skipping event: {}", e));
                    }
                }
            }

            self.watermark.advance(record.version);
        }

        result.watermark = self.watermark;
        result
    }

    fn render_if_matching(&self, event: &EventRecord) -> Result<Option<String>, EventError> {
        let classified = classify(event)?;
        if !self.filter.matches(&classified, &event.data) {
            return Ok(None);
        }
        Ok(Some(classified.kind.render(&event.data)))
    }

    fn persist_watermark(&self) {
        if let (Some((store, key)), Some(version)) = (&self.cursor, self.watermark.value()) {
            if let Err(e) = store.save(key, version) {
                let context = LogContext::new("tracker", "save_cursor")
                    .with_address(&self.address)
                    .with_version(version);
                ErrorLogger::log_error(&MovekitError::Cursor(e), Some(context));
            }
        }
    }
}

fn is_newest_first(records: &[TransactionRecord]) -> bool {
    records.windows(2).all(|pair| pair[0].version >= pair[1].version)
}

/// Resolves once `true` is observed; never resolves if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Sleep for `interval`; returns true if a shutdown arrived first
async fn wait_or_shutdown(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = sleep(interval) => false,
        _ = shutdown_requested(shutdown) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn poller(filter: FilterCriteria) -> Poller {
        Poller::new(RpcClient::new("http://127.0.0.1:1".to_string()), "0xabc", filter, None)
            .expect("valid poller")
    }

    fn record(version: u64, events: Vec<(&str, Value)>) -> TransactionRecord {
        TransactionRecord {
            version,
            hash: None,
            events: events
                .into_iter()
                .map(|(event_type, data)| EventRecord {
                    event_type: event_type.to_string(),
                    data,
                })
                .collect(),
        }
    }

    fn drilling(batch: &str) -> (&'static str, Value) {
        (
            "0xabc::oil_supply_chain::DrillingStartedEvent",
            json!({"batch_id": batch, "location": "Field-A", "quantity": 100, "unit": "bbl"}),
        )
    }

    #[test]
    fn test_watermark() {
        let mut watermark = Watermark::unset();
        assert!(!watermark.covers(0));
        assert_eq!(watermark.to_string(), "unset");

        assert!(watermark.advance(11));
        assert!(watermark.covers(11));
        assert!(watermark.covers(10));
        assert!(!watermark.covers(12));

        assert!(!watermark.advance(9));
        assert_eq!(watermark.value(), Some(11));
        assert_eq!(watermark, Watermark::at(11));
    }

    #[test]
    fn test_new_rejects_missing_address_and_zero_interval() {
        let client = RpcClient::new("http://127.0.0.1:1".to_string());
        let missing = Poller::new(client.clone(), "  ", FilterCriteria::default(), None);
        assert!(matches!(missing, Err(TrackError::MissingAddress)));

        let config = PollerConfig {
            poll_interval_ms: 0,
            page_limit: 50,
        };
        let zero = Poller::new(client, "0xabc", FilterCriteria::default(), Some(config));
        assert!(matches!(zero, Err(TrackError::InvalidInterval(0))));
    }

    #[test]
    fn test_new_poller_state() {
        let poller = poller(FilterCriteria::default());
        assert_eq!(poller.state(), PollerState::Starting);
        assert_eq!(poller.watermark(), Watermark::unset());
        assert_eq!(poller.config().poll_interval_ms, 5000);
        assert_eq!(poller.config().page_limit, 50);
    }

    #[test]
    fn test_newest_first_batch_emits_ascending() {
        let mut poller = poller(FilterCriteria::default());
        let batch = vec![
            record(12, vec![drilling("B-12")]),
            record(11, vec![drilling("B-11")]),
            record(10, vec![drilling("B-10")]),
        ];

        let result = poller.process_batch(batch);

        assert_eq!(result.lines.len(), 3);
        assert!(result.lines[0].starts_with("[v10]"));
        assert!(result.lines[1].starts_with("[v11]"));
        assert!(result.lines[2].starts_with("[v12]"));
        assert_eq!(result.watermark, Watermark::at(12));
    }

    #[test]
    fn test_oldest_first_batch_also_emits_ascending() {
        let mut poller = poller(FilterCriteria::default());
        let result = poller.process_batch(vec![
            record(10, vec![drilling("B-10")]),
            record(12, vec![drilling("B-12")]),
            record(11, vec![drilling("B-11")]),
        ]);

        let versions: Vec<&str> = result.lines.iter().map(|line| &line[..5]).collect();
        assert_eq!(versions, vec!["[v10]", "[v11]", "[v12]"]);
    }

    #[test]
    fn test_second_cycle_only_emits_new_versions() {
        let mut poller = poller(FilterCriteria::default());

        let first = poller.process_batch(vec![
            record(11, vec![drilling("B-11")]),
            record(10, vec![drilling("B-10")]),
        ]);
        assert_eq!(first.lines.len(), 2);

        let second = poller.process_batch(vec![
            record(12, vec![drilling("B-12")]),
            record(11, vec![drilling("B-11")]),
            record(10, vec![drilling("B-10")]),
        ]);

        assert_eq!(second.lines.len(), 1);
        assert!(second.lines[0].contains("B-12"));
        assert_eq!(second.transactions_skipped, 2);
        assert_eq!(poller.watermark(), Watermark::at(12));
    }

    #[test]
    fn test_versions_compare_numerically_not_lexically() {
        let mut poller = poller(FilterCriteria::default());
        poller.process_batch(vec![record(9, vec![drilling("B-9")])]);

        let result = poller.process_batch(vec![record(10, vec![drilling("B-10")])]);
        assert_eq!(result.lines.len(), 1);
        assert_eq!(poller.watermark(), Watermark::at(10));
    }

    #[test]
    fn test_duplicate_version_in_batch_emits_once() {
        let mut poller = poller(FilterCriteria::default());
        let result = poller.process_batch(vec![
            record(7, vec![drilling("B-7")]),
            record(7, vec![drilling("B-7")]),
        ]);
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.transactions_skipped, 1);
    }

    #[test]
    fn test_watermark_advances_when_everything_is_filtered() {
        let mut poller = poller(FilterCriteria::new(None, Some("BATCH-1".to_string())));
        let result = poller.process_batch(vec![record(20, vec![drilling("BATCH-2")])]);

        assert!(result.lines.is_empty());
        assert_eq!(result.events_filtered, 1);
        assert_eq!(poller.watermark(), Watermark::at(20));
    }

    #[test]
    fn test_module_filter_excludes_other_modules() {
        let mut poller = poller(FilterCriteria::new(Some("oil_supply_chain".to_string()), None));
        let result = poller.process_batch(vec![record(
            3,
            vec![(
                "0xabc::other_module::DrillingStartedEvent",
                json!({"batch_id": "BATCH-1"}),
            )],
        )]);

        assert!(result.lines.is_empty());
        assert_eq!(result.events_filtered, 1);
    }

    #[test]
    fn test_malformed_events_are_skipped_not_fatal() {
        let mut poller = poller(FilterCriteria::default());
        let result = poller.process_batch(vec![record(
            4,
            vec![
                ("onlytwo::parts", json!({})),
                ("", json!({})),
                ("0x1::coin::DepositEvent", json!({"amount": "5"})),
            ],
        )]);

        assert_eq!(result.events_malformed, 2);
        assert_eq!(result.lines, vec!["[v4] DepositEvent: amount: 5".to_string()]);
    }

    #[test]
    fn test_intra_transaction_order_is_preserved() {
        let mut poller = poller(FilterCriteria::default());
        let result = poller.process_batch(vec![record(
            8,
            vec![drilling("FIRST"), drilling("SECOND"), drilling("THIRD")],
        )]);

        assert!(result.lines[0].contains("FIRST"));
        assert!(result.lines[1].contains("SECOND"));
        assert!(result.lines[2].contains("THIRD"));
    }

    #[test]
    fn test_filtered_batch_scenario() {
        let mut poller = poller(FilterCriteria::new(
            Some("oil_supply_chain".to_string()),
            Some("BATCH-123".to_string()),
        ));

        let result = poller.process_batch(vec![record(
            5,
            vec![drilling("BATCH-123"), drilling("BATCH-999")],
        )]);

        assert_eq!(result.lines.len(), 1);
        assert!(result.lines[0].contains("BATCH-123"));
        assert!(result.lines[0].contains("Field-A"));
        assert!(result.lines[0].contains("100 bbl"));
        assert_eq!(poller.watermark(), Watermark::at(5));
    }

    #[test]
    fn test_cursor_is_loaded_on_start() {
        let store = CursorStore::new_in_memory().unwrap();
        let key = CursorKey::new("testnet", "0xabc", None, None);
        store.save(&key, 10).unwrap();

        let mut poller = poller(FilterCriteria::default()).with_cursor(store, key);
        poller.start();
        assert_eq!(poller.watermark(), Watermark::at(10));

        let result = poller.process_batch(vec![
            record(11, vec![drilling("B-11")]),
            record(10, vec![drilling("B-10")]),
        ]);
        assert_eq!(result.lines.len(), 1);
        assert!(result.lines[0].contains("B-11"));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_watermark_untouched() {
        let mut poller = poller(FilterCriteria::default());
        poller.process_batch(vec![record(3, vec![])]);

        let mut sink: Vec<String> = Vec::new();
        let result = poller.poll_once(&mut sink).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().is_recoverable());
        assert!(sink.is_empty());
        assert_eq!(poller.watermark(), Watermark::at(3));
        assert_eq!(poller.stats().failed_cycles, 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_wait() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let waiter = tokio::spawn(async move {
            wait_or_shutdown(Duration::from_secs(60), &mut shutdown_rx).await
        });

        sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        let cancelled = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("wait should stop promptly")
            .unwrap();
        assert!(cancelled);
    }

    #[tokio::test]
    async fn test_wait_completes_when_sender_dropped() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        let cancelled = wait_or_shutdown(Duration::from_millis(20), &mut shutdown_rx).await;
        assert!(!cancelled);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_after_failed_polls() {
        let config = PollerConfig {
            poll_interval_ms: 30_000,
            page_limit: 50,
        };
        let mut poller = Poller::new(
            RpcClient::new_with_config("http://127.0.0.1:1".to_string(), 2),
            "0xabc",
            FilterCriteria::default(),
            Some(config),
        )
        .unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut sink: Vec<String> = Vec::new();
            let stats = poller.run(&mut sink, shutdown_rx).await;
            (stats, poller.state())
        });

        sleep(Duration::from_millis(500)).await;
        shutdown_tx.send(true).unwrap();

        let (stats, state) = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller should stop within one tick")
            .unwrap();

        assert_eq!(state, PollerState::Stopped);
        assert_eq!(stats.watermark, Watermark::unset());
        assert_eq!(stats.events_emitted, 0);
    }
}
