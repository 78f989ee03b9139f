pub mod builder;
pub mod model;
pub mod parse;

pub use builder::InFlight;
pub use model::{CapturedRequest, Headers};
