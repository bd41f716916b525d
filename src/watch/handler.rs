use std::marker::PhantomData;
use std::sync::Arc;

use crate::Node;
use crate::Object;
use crate::PersistentVolume;
use crate::PersistentVolumeClaim;
use crate::Pod;
use crate::ReplicationController;
use crate::Resource;
use crate::ResourceKind;
use crate::Service;
use crate::WatchError;

/// Route for one resource kind
///
/// The registry holds one handler per supported kind. Adding a kind is one
/// registration; nothing dispatches on kind names.
pub trait KindHandler: Send + Sync + 'static {
    fn kind(&self) -> ResourceKind;

    /// Rejects payloads that do not belong to this kind.
    fn admit(
        &self,
        object: &dyn Object,
    ) -> Result<(), WatchError>;
}

/// Handler admitting exactly one concrete resource type
pub struct TypedHandler<R> {
    _marker: PhantomData<fn() -> R>,
}

impl<R: Resource> TypedHandler<R> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    pub fn shared() -> Arc<dyn KindHandler> {
        Arc::new(Self::new())
    }
}

impl<R: Resource> Default for TypedHandler<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> KindHandler for TypedHandler<R> {
    fn kind(&self) -> ResourceKind {
        R::KIND
    }

    fn admit(
        &self,
        object: &dyn Object,
    ) -> Result<(), WatchError> {
        if object.as_any().is::<R>() {
            Ok(())
        } else {
            Err(WatchError::PayloadMismatch {
                kind: R::KIND,
                expected: std::any::type_name::<R>(),
                actual: object.type_name(),
            })
        }
    }
}

/// Handlers for the kinds every client supports out of the box
pub fn builtin_handlers() -> Vec<Arc<dyn KindHandler>> {
    vec![
        TypedHandler::<Pod>::shared(),
        TypedHandler::<Service>::shared(),
        TypedHandler::<ReplicationController>::shared(),
        TypedHandler::<PersistentVolume>::shared(),
        TypedHandler::<PersistentVolumeClaim>::shared(),
        TypedHandler::<Node>::shared(),
    ]
}
