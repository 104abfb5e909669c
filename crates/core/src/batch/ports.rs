//! Port the dispatcher drives to execute a single call.

use async_trait::async_trait;
use centralkit_domain::{CallDescriptor, CallResult};

/// Executes exactly one logical API operation.
///
/// Implemented by the infra request engine; mocked in dispatcher tests.
/// Infallible by contract: every failure mode is folded into the returned
/// [`CallResult`].
#[async_trait]
pub trait ApiExecutor: Send + Sync {
    async fn execute(&self, descriptor: &CallDescriptor) -> CallResult;
}
