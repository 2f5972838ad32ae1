//! Per-item-type codecs and the process-wide codec registry.
//!
//! Codecs are looked up by class-name string. An unknown class name during
//! load gives the registered plugin loader one chance to make the codec
//! appear (by loading a shared library, out of scope here); the registry
//! itself stays oblivious to how that happens.

use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::GraphError;
use crate::frame::FrameId;
use crate::item::{metadata, Item, ItemBase, ItemMetadata, ItemRef, TypeTag};

/// Save/load operations for one registered item class, in a binary and a
/// text flavor.
pub trait ItemCodec: Send + Sync {
    fn save_binary(&self, item: &dyn ItemBase) -> Result<Vec<u8>, GraphError>;
    fn load_binary(&self, bytes: &[u8]) -> Result<ItemRef, GraphError>;
    fn save_text(&self, item: &dyn ItemBase) -> Result<String, GraphError>;
    fn load_text(&self, text: &str) -> Result<ItemRef, GraphError>;
}

/// Hook consulted when a class name has no registered codec during load.
/// Returns true if it made the codec available.
pub type PluginLoader = Box<dyn Fn(&str) -> bool + Send>;

lazy_static! {
    static ref CODECS: Mutex<HashMap<String, Arc<dyn ItemCodec>>> = Mutex::new(HashMap::new());
    static ref PLUGIN_LOADER: Mutex<Option<PluginLoader>> = Mutex::new(None);
}

pub fn register_codec(class_name: impl Into<String>, codec: Arc<dyn ItemCodec>) {
    CODECS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(class_name.into(), codec);
}

pub fn has_codec(class_name: &str) -> bool {
    CODECS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains_key(class_name)
}

/// Looks up the codec for `class_name`. On a miss the plugin loader hook is
/// consulted once, then the lookup is retried.
pub fn codec_for(class_name: &str) -> Option<Arc<dyn ItemCodec>> {
    if let Some(codec) = CODECS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(class_name)
    {
        return Some(Arc::clone(codec));
    }
    let loaded = {
        let loader = PLUGIN_LOADER
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match loader.as_ref() {
            Some(load) => load(class_name),
            None => false,
        }
    };
    if !loaded {
        return None;
    }
    CODECS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(class_name)
        .map(Arc::clone)
}

pub fn set_plugin_loader(loader: PluginLoader) {
    *PLUGIN_LOADER
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(loader);
}

/// Registers `Item<T>` under `class_name`: metadata for name lookups plus a
/// serde-backed codec (bincode for the binary flavor, JSON for the text
/// flavor). One call makes the type serializable and addressable by typed
/// event subscriptions.
pub fn register_item_type<T>(class_name: &str)
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    metadata::register(
        TypeTag::of::<Item<T>>(),
        ItemMetadata {
            class_name: class_name.to_owned(),
            embedded_type_name: std::any::type_name::<T>().to_owned(),
        },
    );
    register_codec(class_name, Arc::new(SerdeCodec::<T>::new()));
}

/// The serializable parts of an item; what a [`SerdeCodec`] writes.
#[derive(Serialize, Deserialize)]
struct ItemParts<T> {
    time: OffsetDateTime,
    uuid: Uuid,
    frame: FrameId,
    data: T,
}

struct SerdeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeCodec<T> {
    fn new() -> Self {
        SerdeCodec {
            _marker: PhantomData,
        }
    }
}

impl<T> SerdeCodec<T>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    fn parts_of(&self, item: &dyn ItemBase) -> Result<ItemParts<T>, GraphError> {
        let item = item
            .as_any()
            .downcast_ref::<Item<T>>()
            .ok_or_else(|| GraphError::Archive("item does not match the codec's type".into()))?;
        Ok(ItemParts {
            time: item.time(),
            uuid: item.uuid(),
            frame: item.frame(),
            data: item.data().clone(),
        })
    }

    fn rebuild(&self, parts: ItemParts<T>) -> ItemRef {
        Rc::new(Item::from_parts(
            parts.time,
            parts.uuid,
            parts.frame,
            parts.data,
        ))
    }
}

impl<T> ItemCodec for SerdeCodec<T>
where
    T: Serialize + DeserializeOwned + Clone + 'static,
{
    fn save_binary(&self, item: &dyn ItemBase) -> Result<Vec<u8>, GraphError> {
        Ok(bincode::serialize(&self.parts_of(item)?)?)
    }

    fn load_binary(&self, bytes: &[u8]) -> Result<ItemRef, GraphError> {
        let parts: ItemParts<T> = bincode::deserialize(bytes)?;
        Ok(self.rebuild(parts))
    }

    fn save_text(&self, item: &dyn ItemBase) -> Result<String, GraphError> {
        Ok(serde_json::to_string(&self.parts_of(item)?)?)
    }

    fn load_text(&self, text: &str) -> Result<ItemRef, GraphError> {
        let parts: ItemParts<T> = serde_json::from_str(text)?;
        Ok(self.rebuild(parts))
    }
}
