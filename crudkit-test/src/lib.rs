pub mod conformance;
mod mock;
mod recording;

pub use conformance::run_contract_suite;
pub use mock::{MockBackend, MockResponse, RecordedRequest};
pub use recording::{HookCall, RecordingPlugin};
