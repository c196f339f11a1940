//! Type Registry Module
//!
//! Maps value types to the string tags written into encoded entries.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{CacheError, Result};

// == Type Registry ==
/// Registry of the value types an entry codec accepts.
///
/// Both directions are kept so encoding can look up a tag by type and decoding
/// can tell an unknown tag apart from a tag that belongs to another type.
#[derive(Debug)]
pub struct TypeRegistry {
    inner: RwLock<Bindings>,
}

#[derive(Debug, Default)]
struct Bindings {
    by_type: HashMap<TypeId, String>,
    by_tag: HashMap<String, TypeId>,
}

impl TypeRegistry {
    // == Constructor ==
    /// Creates a registry with the primitive scalar types already registered.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_primitives();
        registry
    }

    /// Creates a registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(Bindings::default()),
        }
    }

    // == Register ==
    /// Registers `T` under its Rust type name.
    ///
    /// Type names are not guaranteed stable across compiler versions; use
    /// [`register_as`](Self::register_as) when entries outlive a deployment.
    pub fn register<T: 'static>(&self) -> Result<()> {
        self.register_as::<T>(type_name::<T>())
    }

    /// Registers `T` under an explicit tag.
    ///
    /// Registering the same pair twice is a no-op. Binding a tag or a type
    /// that is already bound to something else fails.
    pub fn register_as<T: 'static>(&self, tag: &str) -> Result<()> {
        if tag.is_empty() || tag.len() > u16::MAX as usize {
            return Err(CacheError::Configuration(format!(
                "type tag for {} must be 1..={} bytes",
                type_name::<T>(),
                u16::MAX
            )));
        }

        let id = TypeId::of::<T>();
        let mut bindings = self.inner.write();

        if let Some(existing) = bindings.by_type.get(&id) {
            if existing == tag {
                return Ok(());
            }
            return Err(CacheError::Configuration(format!(
                "type {} is already registered as '{}'",
                type_name::<T>(),
                existing
            )));
        }
        if bindings.by_tag.contains_key(tag) {
            return Err(CacheError::Configuration(format!(
                "type tag '{}' is already bound to another type",
                tag
            )));
        }

        bindings.by_type.insert(id, tag.to_string());
        bindings.by_tag.insert(tag.to_string(), id);
        Ok(())
    }

    // == Lookup ==
    /// Returns the tag registered for `T`.
    pub fn tag_of<T: 'static>(&self) -> Option<String> {
        self.inner.read().by_type.get(&TypeId::of::<T>()).cloned()
    }

    /// Returns the type bound to `tag`.
    pub fn type_of(&self, tag: &str) -> Option<TypeId> {
        self.inner.read().by_tag.get(tag).copied()
    }

    /// Returns true if `T` has been registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.inner.read().by_type.contains_key(&TypeId::of::<T>())
    }

    fn register_primitives(&self) {
        macro_rules! builtin {
            ($registry:expr; $($ty:ty => $tag:literal),* $(,)?) => {
                $(
                    let _ = $registry.register_as::<$ty>($tag);
                )*
            };
        }

        builtin! {
            self;
            bool => "bool",
            char => "char",
            i8 => "i8",
            i16 => "i16",
            i32 => "i32",
            i64 => "i64",
            i128 => "i128",
            isize => "isize",
            u8 => "u8",
            u16 => "u16",
            u32 => "u32",
            u64 => "u64",
            u128 => "u128",
            usize => "usize",
            f32 => "f32",
            f64 => "f64",
            String => "string",
            Vec<u8> => "bytes",
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
