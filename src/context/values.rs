//! Request-scoped values.
//!
//! Values form an immutable chain of `Arc` nodes. Adding a value prepends a
//! node and shares the rest, so a snapshot taken earlier never observes later
//! additions. The chain rides in the request's extensions.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Marker type identifying one request-scoped value.
///
/// Keys are compared by type, so two middleware defining their own key types
/// can never overwrite each other's values.
///
/// ```
/// use waypost::ContextKey;
///
/// struct CurrentUser;
///
/// impl ContextKey for CurrentUser {
///     type Value = String;
/// }
/// ```
pub trait ContextKey: 'static {
    type Value: Send + Sync + 'static;
}

struct Node {
    key: TypeId,
    value: Box<dyn Any + Send + Sync>,
    next: Option<Arc<Node>>,
}

/// Copy-on-write chain of request-scoped values.
#[derive(Clone, Default)]
pub struct Values {
    head: Option<Arc<Node>>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new chain where `K` maps to `value`.
    pub fn with<K: ContextKey>(&self, value: K::Value) -> Values {
        Values {
            head: Some(Arc::new(Node {
                key: TypeId::of::<K>(),
                value: Box::new(value),
                next: self.head.clone(),
            })),
        }
    }

    /// Most recent value stored under `K`.
    pub fn get<K: ContextKey>(&self) -> Option<&K::Value> {
        let key = TypeId::of::<K>();
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            if node.key == key {
                return node.value.downcast_ref::<K::Value>();
            }
            current = node.next.as_deref();
        }
        None
    }

    pub fn len(&self) -> usize {
        let mut len = 0;
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            len += 1;
            current = node.next.as_deref();
        }
        len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values").field("len", &self.len()).finish()
    }
}
