//! The adapter seam (C4): anything that can snapshot and stream signals
//! from one upstream smart-home controller.
//!
//! Grounded on the `SmartHomeAdapter`-shaped duck type `lumehaven`'s
//! adapters (`openhab/adapter.py`) all satisfy, made explicit as a trait so
//! the manager (C5) can supervise any adapter type uniformly.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::AdapterError;
use crate::signal::Signal;

pub mod openhab;

#[async_trait]
pub trait SmartHomeAdapter: Send + Sync {
    /// Unique identifier for this adapter instance, used for logging and
    /// health reporting.
    fn name(&self) -> &str;

    /// The upstream system type, e.g. `"openhab"`.
    fn adapter_type(&self) -> &str;

    /// Short prefix used to namespace this adapter's signal ids.
    fn prefix(&self) -> &str;

    /// Fetch every tracked item once and build a `Signal` for each.
    async fn snapshot(&self) -> Result<HashMap<String, Signal>, AdapterError>;

    /// Open the upstream's live-event stream. The returned stream is
    /// lazy and runs until the upstream closes it or a transport error
    /// occurs; it never resolves `None` on its own otherwise.
    async fn subscribe_events(&self) -> Result<BoxStream<'static, Signal>, AdapterError>;

    /// Release any held resources. Idempotent.
    async fn close(&self);

    /// Cheap, in-memory connectivity status for health reporting.
    fn is_connected(&self) -> bool;
}
