//! Opaque data source handles (connection pools, clients, stores).

use core::any::Any;
use core::fmt::Debug;
use std::sync::Arc;

/// A named, shareable connection resource.
///
/// Every `Send + Sync + Debug + 'static` type is a data source; callers recover
/// the concrete type through [`downcast_ref`](trait.DataSource.html#method.downcast_ref).
pub trait DataSource: Send + Sync + Debug + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Send + Sync + Debug + 'static> DataSource for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn DataSource {
    /// The source as a `T`, looking through one `Arc<T>` layer.
    pub fn downcast_ref<T: DataSource>(&self) -> Option<&T> {
        let any = self.as_any();
        any.downcast_ref::<T>()
            .or_else(|| any.downcast_ref::<Arc<T>>().map(|shared| &**shared))
    }
}
