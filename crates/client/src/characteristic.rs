//! The GATT characteristic the filesystem service is reached through.

use std::future::Future;
use std::io;
use std::pin::Pin;

use futures_util::Stream;

/// Notification payloads, in arrival order.
///
/// Ends when the subscription is dropped or the connection goes away.
pub type Notifications = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Write and notify primitives of the filesystem characteristic.
///
/// Implemented by the BLE backend; connection management, service
/// discovery and MTU negotiation happen behind it.
pub trait Characteristic: Send + Sync + 'static {
    /// Writes one frame, resolving once the write has been acknowledged.
    fn write(&self, frame: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Subscribes to notifications. Dropping the stream unsubscribes.
    fn subscribe(&self) -> impl Future<Output = io::Result<Notifications>> + Send;

    /// Current ATT MTU of the connection.
    fn mtu(&self) -> usize;

    fn is_connected(&self) -> bool {
        true
    }
}
