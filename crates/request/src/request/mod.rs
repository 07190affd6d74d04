//! Request descriptors and their lifecycle.
//!
//! [`RequestOptions`] are normalized into an immutable [`Descriptor`] once, when a
//! [`Request`] is built. The request then moves through its [`RequestState`]s and
//! settles its [`ResponseFuture`] exactly once.

mod cache;
mod deferred;
mod descriptor;
mod handle;
mod layer;
mod lifecycle;
mod meta;
mod options;

pub use cache::{CachePolicy, ClearCache};
pub use deferred::{Outcome, ResponseFuture};
pub use descriptor::{Descriptor, normalize_method};
pub use handle::Request;
pub use layer::{Layer, LayerHandle, Origin, OriginHandle};
pub use lifecycle::RequestState;
pub use meta::{MetaKey, MetaProps};
pub use options::RequestOptions;

/// Arbitrary JSON state attached to a layer.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Called once when the request is queued, with the request about to be queued.
pub type QueuedCallback = Box<dyn FnOnce(&Request) + Send>;
