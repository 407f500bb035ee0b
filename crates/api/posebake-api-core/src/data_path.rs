//! DataPath parsing and formatting.
//!
//! Grammar (host property paths as drivers see them):
//!   [collection["key"]][.field[.field...]]
//! Examples:
//!   `key_blocks["smile"].value` -> collection="key_blocks", key="smile", fields=["value"]
//!   `location.z`                -> no collection, fields=["location", "z"]
//!   `eval_time`                 -> no collection, fields=["eval_time"]
//!
//! Keys are quoted because shape-key names may contain spaces and dots; a `"`
//! inside a key is written as `\"`.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Collection holding shape-key blocks on a key datablock.
pub const KEY_BLOCKS: &str = "key_blocks";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataPath {
    /// Keyed collection and the key inside it, if the path starts with one.
    pub collection: Option<(String, String)>,
    /// Ordered field selectors after the collection item (or from the root).
    pub fields: Vec<String>,
}

impl DataPath {
    /// `key_blocks["<name>"].value`
    pub fn shape_key_value(name: impl Into<String>) -> Self {
        Self::shape_key_field(name, "value")
    }

    /// `key_blocks["<name>"].<field>`
    pub fn shape_key_field(name: impl Into<String>, field: &str) -> Self {
        Self {
            collection: Some((KEY_BLOCKS.to_string(), name.into())),
            fields: vec![field.to_string()],
        }
    }

    /// Name of the shape key this path points into, if any.
    pub fn shape_key(&self) -> Option<&str> {
        match &self.collection {
            Some((coll, key)) if coll == KEY_BLOCKS => Some(key.as_str()),
            _ => None,
        }
    }

    /// Whether the path animates a shape key's blend value.
    pub fn is_shape_key_value(&self) -> bool {
        self.shape_key().is_some() && self.fields.len() == 1 && self.fields[0] == "value"
    }

    /// Same path with the collection key swapped for `name`.
    pub fn with_shape_key(&self, name: &str) -> Self {
        let mut out = self.clone();
        if let Some((_, key)) = out.collection.as_mut() {
            *key = name.to_string();
        }
        out
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("empty data path".to_string());
        }
        let (collection, rest) = match s.find("[\"") {
            Some(open) => {
                let coll = &s[..open];
                if coll.is_empty() || !is_identifier(coll) {
                    return Err(format!("invalid data path: bad collection name in '{s}'"));
                }
                let body = &s[open + 2..];
                let close = find_closing_quote(body)
                    .ok_or_else(|| format!("invalid data path: unterminated key in '{s}'"))?;
                let key = body[..close].replace("\\\"", "\"");
                if key.is_empty() {
                    return Err("invalid data path: empty collection key".to_string());
                }
                let rest = &body[close + 2..];
                (Some((coll.to_string(), key)), rest)
            }
            None => (None, s),
        };

        let rest = match (&collection, rest) {
            (Some(_), "") => "",
            (Some(_), r) => r
                .strip_prefix('.')
                .ok_or_else(|| format!("invalid data path: expected '.' after key in '{s}'"))?,
            (None, r) => r,
        };

        let fields: Vec<String> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('.').map(str::to_string).collect()
        };
        if fields.iter().any(|f| !is_identifier(f)) {
            return Err(format!("invalid data path: bad field selector in '{s}'"));
        }
        if collection.is_none() && fields.is_empty() {
            return Err("invalid data path".to_string());
        }

        Ok(DataPath { collection, fields })
    }

    /// Iterate over field selectors.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|s| s.as_str())
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Byte offset of the `"]` that closes a key, skipping escaped quotes.
fn find_closing_quote(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' if bytes[i + 1] == b']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((coll, key)) = &self.collection {
            write!(f, "{}[\"{}\"]", coll, key.replace('"', "\\\""))?;
            for field in &self.fields {
                write!(f, ".{field}")?;
            }
            Ok(())
        } else {
            f.write_str(&self.fields.join("."))
        }
    }
}

impl FromStr for DataPath {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataPath::parse(s)
    }
}

// Serde support: serialize as string, deserialize from string
impl Serialize for DataPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DataPath {
    fn deserialize<D>(deserializer: D) -> Result<DataPath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DataPath::parse(&s).map_err(de::Error::custom)
    }
}
