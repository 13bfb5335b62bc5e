pub mod filter;
pub mod poller;

pub use filter::FilterCriteria;
pub use poller::{
    EventSink, PollCycleResult, Poller, PollerConfig, PollerState, PollerStats, StdoutSink, Watermark,
    DEFAULT_MODULE, DEFAULT_PAGE_LIMIT, DEFAULT_POLL_INTERVAL_MS,
};
