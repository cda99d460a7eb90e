//! Cross-Context Channel
//!
//! Send and receive sides of the postMessage-style channel between the
//! hosting page and the embedded surface. Delivery is asynchronous and
//! unordered across contexts. Both sides carry an explicit origin check.

use std::fmt;

use serde_json::Value;

use crate::address::normalize_origin;
use crate::error::Result;
use crate::message::CrossContextMessage;

/// Origin a message is addressed to
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TargetOrigin {
    /// `"*"`: any receiving origin may read the message
    #[default]
    Any,
    Exact(String),
}

impl TargetOrigin {
    pub fn exact(origin: &str) -> Result<Self> {
        Ok(TargetOrigin::Exact(normalize_origin(origin)?))
    }

    /// Whether a receiver at `origin` may observe the message
    pub fn admits(&self, origin: &str) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => expected == origin,
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOrigin::Any => f.write_str("*"),
            TargetOrigin::Exact(origin) => f.write_str(origin),
        }
    }
}

/// Which sender origins a receiver accepts
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept everything. Only for local development.
    AnyOrigin,
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Allow exactly one origin
    pub fn only(origin: &str) -> Result<Self> {
        Ok(OriginPolicy::AllowList(vec![normalize_origin(origin)?]))
    }

    pub fn allow_list<I, S>(origins: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let origins = origins
            .into_iter()
            .map(|o| normalize_origin(o.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(OriginPolicy::AllowList(origins))
    }

    pub fn permits(&self, origin: &str) -> bool {
        match self {
            OriginPolicy::AnyOrigin => true,
            OriginPolicy::AllowList(allowed) => allowed.iter().any(|a| a == origin),
        }
    }
}

/// A message as delivered to a listener
#[derive(Clone, Debug, PartialEq)]
pub struct InboundMessage {
    /// Origin of the sending context
    pub origin: String,

    /// Envelope as posted, usually an object
    pub data: Value,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Handle to the parent context, held by the embedded surface
pub trait ParentChannel: Send + Sync {
    /// Post a message to the parent. Fire-and-forget, like `postMessage`.
    fn post(&self, message: &CrossContextMessage, target: &TargetOrigin) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_normalizes_origins() {
        let policy = OriginPolicy::allow_list(["http://localhost:3001/", "https://pay.example.com/x"])
            .unwrap();
        assert!(policy.permits("http://localhost:3001"));
        assert!(policy.permits("https://pay.example.com"));
        assert!(!policy.permits("https://evil.example.com"));
    }

    #[test]
    fn test_target_origin() {
        let target = TargetOrigin::exact("https://shop.example.com/cart").unwrap();
        assert_eq!(target.to_string(), "https://shop.example.com");
        assert!(target.admits("https://shop.example.com"));
        assert!(!target.admits("https://other.example.com"));
        assert!(TargetOrigin::Any.admits("anything"));
        assert_eq!(TargetOrigin::Any.to_string(), "*");
    }
}
