//! Handles to the UI context a request was made for.
//!
//! The request core does not know about layers or elements. It only holds them while
//! the request is in flight and releases them after settlement, so a settled request
//! kept in a cache never keeps a closed overlay or a detached element alive.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use super::Context;

/// An overlay or the root layer that a request targets.
pub trait Layer: Debug + Send + Sync {
    /// The layer's mode, e.g. `root`, `modal` or `drawer`.
    fn mode(&self) -> Option<String>;

    fn context(&self) -> Option<Context>;
}

/// The element that triggered a request, e.g. a clicked link.
///
/// The request only carries the origin, it never looks inside. Event observers get it
/// back through [`Request::origin`](super::Request::origin) and recover their own type
/// with [`Origin::as_any`].
pub trait Origin: Debug + Send + Sync {
    /// Downcast hook for the code that created the origin.
    ///
    /// ```
    /// # use std::any::Any;
    /// # use micro_request::request::Origin;
    /// #[derive(Debug)]
    /// struct Link(&'static str);
    ///
    /// impl Origin for Link {
    ///     fn as_any(&self) -> &dyn Any {
    ///         self
    ///     }
    /// }
    ///
    /// let origin: &dyn Origin = &Link("a.next");
    /// assert_eq!(origin.as_any().downcast_ref::<Link>().map(|link| link.0), Some("a.next"));
    /// ```
    fn as_any(&self) -> &dyn Any;
}

pub type LayerHandle = Arc<dyn Layer>;

pub type OriginHandle = Arc<dyn Origin>;
