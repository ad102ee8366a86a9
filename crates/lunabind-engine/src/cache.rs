//! Process-wide struct layout cache
//!
//! The first decode of a struct type builds its field map; every later
//! decode, on any thread, reuses it. Entries are append-only and immutable.
//! A layout is fully built before it is inserted, so readers never observe a
//! partial entry; two threads building the same layout concurrently both
//! insert structurally identical results and the last write wins.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::descriptor::{StructType, TypeDescriptor};

static LAYOUTS: Lazy<DashMap<TypeId, Arc<StructLayout>>> = Lazy::new(DashMap::new);

/// Field map of a struct type
#[derive(Debug)]
pub struct StructLayout {
    name: &'static str,
    fields: FxHashMap<&'static str, TypeDescriptor>,
    order: Vec<&'static str>,
}

impl StructLayout {
    fn build(ty: &StructType) -> Self {
        let descriptors = ty.build_fields();
        let mut fields = FxHashMap::with_capacity_and_hasher(descriptors.len(), Default::default());
        let mut order = Vec::with_capacity(descriptors.len());
        for field in descriptors {
            order.push(field.name);
            fields.insert(field.name, field.descriptor);
        }
        Self {
            name: ty.name(),
            fields,
            order,
        }
    }

    /// Struct name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Descriptor of the field called `name`
    pub fn field(&self, name: &str) -> Option<&TypeDescriptor> {
        self.fields.get(name)
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> &[&'static str] {
        &self.order
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check for a struct without fields
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Layout of `ty`, built on first use
pub fn layout(ty: &StructType) -> Arc<StructLayout> {
    if let Some(entry) = LAYOUTS.get(&ty.type_id()) {
        return Arc::clone(entry.value());
    }

    // Built outside the map so no shard lock is held while field
    // descriptors are constructed.
    let built = Arc::new(StructLayout::build(ty));
    trace!(name = ty.name(), fields = built.len(), "cached struct layout");
    LAYOUTS.insert(ty.type_id(), Arc::clone(&built));
    built
}

/// Number of cached layouts
pub fn cached_layouts() -> usize {
    LAYOUTS.len()
}
