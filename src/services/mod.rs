//! Services module - pure logic with no persistence or UI dependencies.
//!
//! # Components
//!
//! - [`CradiatorAddress`]: Parsed form of a view's URL field. Handles:
//!   - Several whitespace-separated feeds in one field
//!   - The `debug` sentinel for synthetic data
//!   - Completing bare CruiseControl.NET addresses with `/XmlStatusReport.aspx`
//!
//! - [`ProjectFilter`]: Compiled project-name and category patterns of a view.
//!
//! Malformed addresses are an expected, common case (users type them), so
//! resolution never fails with an error; callers check
//! [`CradiatorAddress::is_valid`] instead.

pub mod address;
pub mod filter;

pub use address::{CradiatorAddress, FeedAddress, STATUS_REPORT_FILE, resolve};
pub use filter::ProjectFilter;
