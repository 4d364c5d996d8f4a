//! Handling of `do_work` pushes.

use async_trait::async_trait;
use serde_json::Value;

use crate::events::WorkRequest;

/// Performs work pushed by the service.  The returned values become the
/// arguments of the `sp/work_done` reply.
#[async_trait]
pub trait WorkHandler: Send + Sync + 'static {
    async fn perform(&self, work: WorkRequest) -> anyhow::Result<Vec<Value>>;
}
