//! Command handlers grouped by concern.

pub(crate) mod paths;
pub(crate) mod settings;
pub(crate) mod watch;
