//! Branch naming, tracking backends, and the lifecycle manager

mod lifecycle;
mod name;
mod tracking;

pub use lifecycle::BranchLifecycle;
pub use name::{MAX_BRANCH_LEN, WorkBranch, is_placeholder, placeholder_name, slugify};
pub use tracking::{BackendKind, PlainBackend, StackedBackend, TrackError, TrackingBackend, create_backend};

#[cfg(test)]
pub use tracking::mock;
