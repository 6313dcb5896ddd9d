//! Cooperative cancellation
//!
//! The writer checks the token between row groups and the reader between
//! rows. Cancelling is permanent; an operation that observes it fails with
//! [`crate::Error::Cancelled`] and produces no output.

pub use tokio_util::sync::CancellationToken;

pub(crate) trait CancellationCheck {
    fn check(&self) -> crate::Result<()>;
}

impl CancellationCheck for CancellationToken {
    fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
