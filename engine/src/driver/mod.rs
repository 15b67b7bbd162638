//! Session driver implementations
//!
//! The controller only knows the `sdk::driver::SessionDriver` trait. This
//! module provides the browser-backed implementation used by the binary.

pub mod protocol;
pub mod webdriver;

pub use protocol::WebDriverClient;
pub use webdriver::WebDriverSession;
