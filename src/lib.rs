pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod inspector;
pub mod intercept;
pub mod logger;
pub mod page;
pub mod relay;
pub mod sanitize;

// Re-export commonly used types
pub use capture::CapturedRequest;
pub use config::{Config, ConfigLoader};
pub use error::{ApiHackerError, Result};
pub use inspector::Inspector;
pub use page::Page;
pub use sanitize::{PlainValue, SanitizeOptions, Value, sanitize};
