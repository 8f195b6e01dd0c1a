//! Definitions for the core identifier and edge types used across the model.
//!
//! These types are re-exported in the root of the crate.

use std::collections::BTreeMap;

use derive_more::From;

use crate::value::Value;

/// Map of node properties, keyed by property name.
pub type PropertyMap<P> = BTreeMap<String, P>;

/// A reference to a node within a graph.
///
/// Node ids are unique per graph but NOT stable across versions of a
/// document; the matching engine reconstructs the correspondence.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, From, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeKey(smol_str::SmolStr);

/// A reference to a graph within a script.
///
/// Graph ids are unique per script but NOT stable across versions.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, From, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct GraphKey(smol_str::SmolStr);

/// An opaque identifier that can participate in matching.
///
/// The distinguished invalid sentinel compares equal across all versions of a
/// document, so every [`RefMatch`](crate::matching::RefMatch) is pre-seeded
/// with its identity pair.
pub trait RefId: Clone + Ord + Eq + std::hash::Hash {
    /// Returns the invalid sentinel for this reference type.
    fn invalid() -> Self;

    /// Whether this reference is the invalid sentinel.
    fn is_invalid(&self) -> bool {
        *self == Self::invalid()
    }
}

macro_rules! impl_ref_key {
    ($($t:ty),*) => {
        $(
            impl $t {
                /// Creates a new key from a string-like id.
                pub fn new(id: impl AsRef<str>) -> Self {
                    Self(smol_str::SmolStr::new(id))
                }

                /// The id as a string slice.
                #[must_use]
                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl RefId for $t {
                fn invalid() -> Self {
                    Self::default()
                }

                fn is_invalid(&self) -> bool {
                    self.0.is_empty()
                }
            }

            impl From<&str> for $t {
                fn from(id: &str) -> Self {
                    Self::new(id)
                }
            }

            impl From<String> for $t {
                fn from(id: String) -> Self {
                    Self(smol_str::SmolStr::from(id))
                }
            }

            impl std::fmt::Display for $t {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}
impl_ref_key!(NodeKey, GraphKey);

/// A directed link between two node sockets, stored on the *destination*
/// node keyed by destination-socket name.
///
/// For `node_1:socket_1 ---> node_2:socket_2`, `node_2` stores
/// `Edge { node: node_1, socket: "socket_1" }` under the key `"socket_2"`.
/// Unconnected sockets hold [`Edge::invalid`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Edge {
    /// The node from which the edge starts.
    pub node: NodeKey,
    /// The socket from which the edge starts.
    pub socket: String,
}

impl Edge {
    /// Creates an edge starting at `node:socket`.
    pub fn new(node: impl Into<NodeKey>, socket: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            socket: socket.into(),
        }
    }

    /// The edge stored on unconnected sockets.
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Whether this edge is the unconnected sentinel.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.node.is_invalid() && self.socket.is_empty()
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.node, self.socket)
    }
}

/// A reference to a texture.
///
/// Textures are not matched against a texture store; the reference is carried
/// as an opaque bag of values and compared by raw equality.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TextureRef(pub PropertyMap<Value>);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_sentinels() {
        assert!(NodeKey::invalid().is_invalid());
        assert!(GraphKey::invalid().is_invalid());
        assert!(Edge::invalid().is_invalid());
        assert!(!NodeKey::new("n1").is_invalid());
        assert!(!Edge::new("n1", "out").is_invalid());
    }

    #[test]
    fn key_serde_is_transparent() {
        let key = NodeKey::new("n1");
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""n1""#);
        let back: NodeKey = serde_json::from_str(r#""n1""#).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn edge_wire_shape() {
        let edge = Edge::new("osc", "out");
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json, serde_json::json!({"node": "osc", "socket": "out"}));
    }
}
