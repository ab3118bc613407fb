pub mod frame_source;

pub use frame_source::{ChannelFrameSource, DirectoryFrameSource, FrameSource};
