//! PR submission pipeline and its collaborators

mod describe;
mod diff;
mod footer;
mod pipeline;

pub use describe::{CommitLogDescribe, Describe, DescribeError};
pub use diff::{DiffPolicy, filter_diff};
pub use footer::{github_footer, plain_footer, strip_footer};
pub use pipeline::{SubmitError, SubmitPipeline, SubmitReceipt, SubmitRequest};

#[cfg(test)]
pub use describe::mock;
