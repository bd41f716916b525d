use std::fmt::Display;

use crate::Object;
use crate::ObjectRef;
use crate::Resource;
use crate::ResourceKind;

/// Nature of a resource change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
    Error,
}

impl Display for EventType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let s = match self {
            EventType::Added => "ADDED",
            EventType::Modified => "MODIFIED",
            EventType::Deleted => "DELETED",
            EventType::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// One emitted resource change
///
/// Immutable once built by the broadcaster. Cloning shares the payload;
/// every watcher of the kind observes the same snapshot.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    kind: ResourceKind,
    event_type: EventType,
    object: ObjectRef,
    resource_version: u64,
}

impl WatchEvent {
    pub(crate) fn new(
        kind: ResourceKind,
        event_type: EventType,
        object: ObjectRef,
        resource_version: u64,
    ) -> Self {
        Self {
            kind,
            event_type,
            object,
            resource_version,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn object(&self) -> &dyn Object {
        &*self.object
    }

    /// Shared handle to the payload
    pub fn object_ref(&self) -> ObjectRef {
        self.object.clone()
    }

    /// Typed view of the payload, `None` if it is not an `R`
    pub fn object_as<R: Resource>(&self) -> Option<&R> {
        self.object.downcast_ref::<R>()
    }

    /// Per-kind emission order key, starting at 1
    pub fn resource_version(&self) -> u64 {
        self.resource_version
    }
}
