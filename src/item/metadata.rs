//! Process-wide mapping from runtime type tags to item metadata.
//!
//! Entries are appended when item types are registered (normally at library
//! load time) and never removed. The mutex makes registration safe from any
//! thread even though graphs themselves are single-threaded.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::item::TypeTag;

/// Naming information attached to a registered item type.
#[derive(Clone, Debug)]
pub struct ItemMetadata {
    /// Registered class name, e.g. `"Item<Vec3>"`. This string identifies the
    /// type in persisted archives and codec lookups.
    pub class_name: String,
    /// Name of the embedded data type, e.g. `"Vec3"`.
    pub embedded_type_name: String,
}

lazy_static! {
    static ref MAPPING: Mutex<HashMap<TypeTag, ItemMetadata>> = Mutex::new(HashMap::new());
}

pub fn register(tag: TypeTag, metadata: ItemMetadata) {
    MAPPING
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(tag, metadata);
}

pub fn get(tag: TypeTag) -> Option<ItemMetadata> {
    MAPPING
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&tag)
        .cloned()
}

pub fn contains(tag: TypeTag) -> bool {
    MAPPING
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains_key(&tag)
}
