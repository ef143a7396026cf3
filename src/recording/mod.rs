pub mod manual;
pub mod merge;
pub mod poller;
pub mod recorder;

pub use manual::{ManualCapture, ManualRecorder};
pub use merge::merge_buffers;
pub use poller::NavigationPoller;
pub use recorder::{CaptureCoordinator, CaptureHandle, CaptureOutcome};
