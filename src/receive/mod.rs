pub mod copy;
pub mod extract;
pub mod overwrite;
pub mod pipeline;

pub use copy::{monitored_copy, CopyError, CopyMonitor};
pub use pipeline::{receive, ReceiveOptions, Received, SessionOutcome};
