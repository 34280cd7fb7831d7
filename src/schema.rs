//! The native-call catalog: which natives the server may ask us to replay,
//! how their arguments are laid out on the wire, and what bookkeeping their
//! completion triggers. Loaded once at startup and immutable afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {0}")]
    NotFound(String),
    #[error("io error reading catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Wire type of one native-call argument, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentType {
    Player,
    Entity,
    Int,
    Hash,
    Float,
    Bool,
    String,
    ObjRef,
    ObjDel,
}

/// What post-processing a native's completion requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcKind {
    /// The native creates a server-synchronized entity; its result is read
    /// back and registered against the creation token.
    EntityCreate,
    /// The native returns an object handle stored in the handle table.
    ObjectCreate,
    #[default]
    Generic,
}

/// One invokable native call as declared in the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct NativeDescriptor {
    pub name: String,
    /// 64-bit identity hash, written as a hex string in the catalog file.
    #[serde(deserialize_with = "hex_u64")]
    pub game_hash: u64,
    #[serde(default)]
    pub kind: RpcKind,
    #[serde(default)]
    pub args: Vec<ArgumentType>,
}

/// Native hashes don't fit TOML's signed integers, so the catalog writes
/// them as "0x..." strings.
fn hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    let digits = digits.ok_or_else(|| serde::de::Error::custom("expected a 0x-prefixed hash"))?;
    u64::from_str_radix(digits, 16).map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "native")]
    natives: Vec<NativeDescriptor>,
}

/// The full catalog, keyed by native identity hash. Shared read-only by
/// every deferred unit via `Arc`.
#[derive(Debug, Default)]
pub struct RpcCatalog {
    by_hash: HashMap<u64, Arc<NativeDescriptor>>,
}

impl RpcCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_toml(&content)?;
        info!(target: "rpc", "Loaded {} natives from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        let mut by_hash = HashMap::with_capacity(file.natives.len());
        for native in file.natives {
            by_hash.insert(native.game_hash, Arc::new(native));
        }
        Ok(Self { by_hash })
    }

    pub fn find(&self, game_hash: u64) -> Option<&Arc<NativeDescriptor>> {
        self.by_hash.get(&game_hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[native]]
        name = "CREATE_THING"
        game_hash = "0x963D27A58DF860AC"
        kind = "entity_create"
        args = ["hash", "float", "float", "float", "bool"]

        [[native]]
        name = "MAKE_BLIP"
        game_hash = "0x00A0B0C0D0E0F001"
        kind = "object_create"
        args = ["entity"]

        [[native]]
        name = "SET_THING_HEADING"
        game_hash = "0x1122334455667788"
        args = ["entity", "float"]
    "#;

    #[test]
    fn test_parse_catalog() {
        let catalog = RpcCatalog::from_toml(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);

        let create = catalog.find(0x963D27A58DF860AC).unwrap();
        assert_eq!(create.name, "CREATE_THING");
        assert_eq!(create.kind, RpcKind::EntityCreate);
        assert_eq!(create.args.len(), 5);
        assert_eq!(create.args[0], ArgumentType::Hash);

        // Kind defaults to generic when omitted
        let heading = catalog.find(0x1122334455667788).unwrap();
        assert_eq!(heading.kind, RpcKind::Generic);
    }

    #[test]
    fn test_unknown_native_is_none() {
        let catalog = RpcCatalog::from_toml(CATALOG).unwrap();
        assert!(catalog.find(0xFFFF_FFFF_FFFF_FFFF).is_none());
    }

    #[test]
    fn test_hash_must_be_hex_string() {
        let bad = r#"
            [[native]]
            name = "BAD"
            game_hash = "12345"
        "#;
        assert!(RpcCatalog::from_toml(bad).is_err());
    }
}
