//! Emulated resource kinds and their payloads.
//!
//! The watch core treats payloads as opaque: it only reads [`ObjectMeta`]
//! (for selectors) and the concrete Rust type (to validate that a payload
//! belongs to the kind it is emitted for). The field sets below are just
//! enough for scheduler-simulation fixtures.

mod types;
pub use types::*;


use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

/// Identifier of an emulated resource category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKind(&'static str);

impl ResourceKind {
    pub const PODS: ResourceKind = ResourceKind("pods");
    pub const SERVICES: ResourceKind = ResourceKind("services");
    pub const REPLICATION_CONTROLLERS: ResourceKind = ResourceKind("replicationcontrollers");
    pub const PERSISTENT_VOLUMES: ResourceKind = ResourceKind("persistentvolumes");
    pub const PERSISTENT_VOLUME_CLAIMS: ResourceKind = ResourceKind("persistentvolumeclaims");
    pub const NODES: ResourceKind = ResourceKind("nodes");

    /// Kinds registered on every new client
    pub const BUILTIN: [ResourceKind; 6] = [
        Self::PODS,
        Self::SERVICES,
        Self::REPLICATION_CONTROLLERS,
        Self::PERSISTENT_VOLUMES,
        Self::PERSISTENT_VOLUME_CLAIMS,
        Self::NODES,
    ];

    pub const fn new(name: &'static str) -> Self {
        ResourceKind(name)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Display for ResourceKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Metadata common to every resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub resource_version: String,
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_resource_version(
        mut self,
        version: impl Into<String>,
    ) -> Self {
        self.resource_version = version.into();
        self
    }

    pub fn with_label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A typed resource that can be emitted for exactly one kind
pub trait Resource: Any + Clone + Debug + PartialEq + Send + Sync {
    const KIND: ResourceKind;

    fn metadata(&self) -> &ObjectMeta;
}

/// Type-erased, read-only payload carried by a watch event
///
/// Implemented for every [`Resource`]; use [`downcast_ref`](dyn Object::downcast_ref)
/// to get the concrete type back.
pub trait Object: Any + Debug + Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn meta(&self) -> &ObjectMeta;

    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

impl<R: Resource> Object for R {
    fn kind(&self) -> ResourceKind {
        R::KIND
    }

    fn meta(&self) -> &ObjectMeta {
        self.metadata()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<R>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Object {
    pub fn downcast_ref<R: Resource>(&self) -> Option<&R> {
        self.as_any().downcast_ref::<R>()
    }

    pub fn is<R: Resource>(&self) -> bool {
        self.as_any().is::<R>()
    }
}

/// Shared handle to an emitted payload
pub type ObjectRef = Arc<dyn Object>;
