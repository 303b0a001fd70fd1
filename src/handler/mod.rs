//! Request handler module
//!
//! Responsible for request routing dispatch and serving the console: the page
//! for plain requests and JSON command replies for requests carrying a
//! `command` field.

pub mod page;
pub mod router;

// Re-export main entry point
pub use router::{handle_request, ConnInfo};
