mod frame;
mod pipeline;
mod present;
mod record;
mod shader;
mod submit;

pub use frame::Frame;
pub use pipeline::QuadPipeline;
pub use present::present_frame;
pub use record::record_frame;
pub use shader::load_spv;
pub use submit::submit_frame;
