mod buffer;
mod feed;
mod frame;
mod jitter;

pub use buffer::InputBuffer;
pub use feed::{LocalInputHandle, RemoteStateFeed};
pub use frame::{BatchError, InputBatch, InputFrame};
pub use jitter::{JitterBuffer, JitterConfig, JitterStats};
