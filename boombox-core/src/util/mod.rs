mod id;

use std::sync::Arc;

use dashmap::DashMap;

pub use id::*;

/// A concurrent map of shared values, keyed by id
pub type ArcedStore<K, V> = Arc<DashMap<K, Arc<V>>>;
