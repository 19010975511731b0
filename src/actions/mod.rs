//! Stock actions.
//!
//! These cover the plumbing every performance needs (context extension,
//! logging, operator and admin notifications, cleanup) plus a few generic
//! file steps. Anything domain-specific is written by the caller against
//! [`crate::core::Action`].

pub mod context;
pub mod files;
pub mod notify;

pub use context::{CleanUpContext, ExtendContext};
pub use files::{CreateDirectory, DeleteFile, DownloadFile, EnsureDirectory, PathSource, WaitForFile};
pub use notify::{AdminReport, AttachNotifier, ErrorNotification, LogInfo, NotifyInfo};

/// Context field holding the source URL
pub const URL_FIELD: &str = "url";

/// Context field holding the destination directory
pub const DIR_FIELD: &str = "dir";

/// Context field written by [`DownloadFile`]
pub const FILE_PATH_FIELD: &str = "file_path";
