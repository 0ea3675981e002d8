//! Data models for the Cradiator core.
//!
//! - [`ViewSettings`]: One monitored project, loaded from `Views.yaml`
//! - [`ViewsFile`]: On-disk layout of the view list
//! - [`GuiltStrategy`]: Which committer gets blamed for a broken build

pub mod view;

pub use view::{GuiltStrategy, ViewSettings, ViewsFile};
