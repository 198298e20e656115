#[cfg(test)]
use mockall::automock;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::Result;

/// Receives one `()` per change of the watched key. Delivery is at-least-once and does
/// not tell self-caused changes from external ones.
pub type ChangeReceiver = broadcast::Receiver<()>;

/// Raw persistence primitives provided by the host.
///
/// Every call may be slow; callers never hold the document lock across them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Returns `None` when nothing is stored under `key`.
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<Vec<u8>>>;

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Result<()>;

    /// Removing an absent key succeeds.
    async fn remove(
        &self,
        key: &str,
    ) -> Result<()>;

    /// Registers interest in changes of `key`.
    fn subscribe(
        &self,
        key: &str,
    ) -> ChangeReceiver;
}
