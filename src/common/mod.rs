pub mod frame;
pub mod region;

pub use frame::CapturedFrame;
pub use region::{ImageRegion, ScrapInfo};
