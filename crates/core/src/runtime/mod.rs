mod poller;

pub use poller::PollingScheduler;
