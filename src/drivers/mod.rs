// src/drivers/mod.rs
pub mod decode;
pub mod display;
pub mod error;
pub mod export;
pub mod gain;
pub mod link;
pub mod pipeline;
pub mod plot;
pub mod sim;
pub mod store;
// 公开导出常用类型，方便外部调用
pub use decode::Framing;
pub use display::{DisplayFeed, DisplaySink, PlotWindow};
pub use error::LinkError;
pub use gain::{Gain, GAIN_SENTINEL};
pub use link::{list_ports, open_serial, DeviceLink};
pub use pipeline::{AcquisitionPipeline, PipelineConfig, SessionState};
pub use plot::{render_samples_png, PlotStyle};
pub use store::SampleStore;
