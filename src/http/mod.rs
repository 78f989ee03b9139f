pub mod client;
pub mod request;
pub mod response;
pub mod types;
pub mod xhr;

// Re-export commonly used types for convenient access
pub use client::HttpFetcher;
pub use request::FetchRequest;
pub use response::FetchResponse;
pub use types::Status;
pub use xhr::HttpRequest;
