use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Descriptor fields that can be sent to the server as request metadata.
///
/// Every field sent to the server becomes part of the cache key,
/// since the server may answer differently depending on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaKey {
    Target,
    FailTarget,
    Mode,
    FailMode,
    Context,
    FailContext,
}

impl MetaKey {
    pub const ALL: [MetaKey; 6] = [
        MetaKey::Target,
        MetaKey::FailTarget,
        MetaKey::Mode,
        MetaKey::FailMode,
        MetaKey::Context,
        MetaKey::FailContext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaKey::Target => "target",
            MetaKey::FailTarget => "failTarget",
            MetaKey::Mode => "mode",
            MetaKey::FailMode => "failMode",
            MetaKey::Context => "context",
            MetaKey::FailContext => "failContext",
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetaKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The meta props of a request.
///
/// An ordered map, so two requests with the same props always serialize identically
/// no matter in which order the props were set or configured.
pub type MetaProps = BTreeMap<MetaKey, Value>;
