//! HTTP protocol layer module
//!
//! Response builders, cookies and parameter extraction, kept free of console
//! logic.

pub mod cookie;
pub mod params;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_400_response, build_401_response, build_404_response, build_405_response,
    build_413_response, build_health_response, build_html_response, build_json_response,
    build_options_response,
};
