//! Type registry: scalar names to host C types.
//!
//! The registry starts with a fixed table of scalar names and grows as the
//! spec declares `[TYPE alias base]` aliases and `SOA` composites. It is
//! advisory for unknown scalars (an unknown name is emitted verbatim) and
//! authoritative for aliases and SOA lookups.

use indexmap::IndexMap;
use serde::Serialize;

/// Built-in scalar names and their host types.
const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("int", "int"),
    ("uint", "unsigned int"),
    ("int8", "int8_t"),
    ("uint8", "uint8_t"),
    ("int16", "int16_t"),
    ("uint16", "uint16_t"),
    ("int32", "int32_t"),
    ("uint32", "uint32_t"),
    ("int64", "int64_t"),
    ("uint64", "uint64_t"),
    ("float", "float"),
    ("double", "double"),
    ("bool", "bool"),
    ("string", "const char*"),
];

/// Struct-of-arrays composite type.
///
/// A non-strict variable of this type is split into one scalar variable per
/// component, each of type `base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoaType {
    /// Scalar type every component shares.
    pub base: String,
    /// Component names in declaration order.
    pub components: Vec<String>,
}

/// Registry of every type name a spec may reference.
#[derive(Debug, Clone, Serialize)]
pub struct TypeRegistry {
    /// Name → host type, for built-ins, aliases and SOA composites.
    host: IndexMap<String, String>,
    /// Alias name → the built-in or SOA name it ultimately stands for.
    aliases: IndexMap<String, String>,
    soa: IndexMap<String, SoaType>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry holding only the built-in scalars.
    pub fn new() -> Self {
        let host = BUILTIN_TYPES
            .iter()
            .map(|(name, c_type)| (name.to_string(), c_type.to_string()))
            .collect();
        Self {
            host,
            aliases: IndexMap::new(),
            soa: IndexMap::new(),
        }
    }

    /// Whether `name` is known to the registry.
    pub fn contains(&self, name: &str) -> bool {
        self.host.contains_key(name)
    }

    /// Host type for a known name.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.host.get(name).map(String::as_str)
    }

    /// Host type for any name; unknown names are emitted verbatim.
    pub fn host_type<'a>(&'a self, name: &'a str) -> &'a str {
        self.lookup(name).unwrap_or(name)
    }

    /// Register `alias` as another spelling of `base`.
    ///
    /// Returns `false` without registering anything when `base` is unknown.
    pub fn add_alias(&mut self, alias: &str, base: &str) -> bool {
        let Some(c_type) = self.lookup(base).map(str::to_string) else {
            return false;
        };
        let canonical = self.canonical(base).to_string();
        self.host.insert(alias.to_string(), c_type);
        if canonical == alias {
            self.aliases.shift_remove(alias);
        } else {
            self.aliases.insert(alias.to_string(), canonical);
        }
        true
    }

    /// Register an SOA composite. Its opaque host type is its own name.
    pub fn add_soa(&mut self, name: &str, soa: SoaType) {
        self.host.insert(name.to_string(), name.to_string());
        self.soa.insert(name.to_string(), soa);
    }

    /// SOA composite named `name` (directly or through aliases), if any.
    pub fn soa(&self, name: &str) -> Option<&SoaType> {
        self.soa.get(self.canonical(name))
    }

    /// Follow aliases down to a built-in or SOA name.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Whether `name` resolves to the boolean host type.
    pub fn is_bool(&self, name: &str) -> bool {
        self.lookup(name) == Some("bool")
    }

    /// Whether `name` resolves to an integer host type.
    pub fn is_integer(&self, name: &str) -> bool {
        matches!(
            self.canonical(name),
            "int"
                | "uint"
                | "int8"
                | "uint8"
                | "int16"
                | "uint16"
                | "int32"
                | "uint32"
                | "int64"
                | "uint64"
        )
    }
}
