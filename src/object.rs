//! Remote objects as returned by the API.
//!
//! Attribute values are kept as `serde_json::Value`, which already covers
//! every shape the API sends back (string, number, bool, list, map, null).

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A typed entity returned by the API: a file, URL, domain, IP address...
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "RawObject")]
pub struct Object {
  pub object_type: String,
  pub id: String,
  pub attributes: Map<String, Value>,
  pub relationships: BTreeMap<String, Relationship>,
}

/// A named link from an object to other objects.
///
/// For one-to-one relationships only the first related object is meaningful.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Relationship {
  pub is_one_to_one: bool,
  pub related_objects: Vec<Object>,
}

#[derive(Deserialize)]
struct RawObject {
  #[serde(rename = "type")]
  object_type: String,
  id: String,
  #[serde(default)]
  attributes: Map<String, Value>,
  #[serde(default)]
  relationships: BTreeMap<String, RawRelationship>,
}

#[derive(Deserialize)]
struct RawRelationship {
  #[serde(default)]
  data: Value,
}

impl TryFrom<RawRelationship> for Relationship {
  type Error = String;

  fn try_from(raw: RawRelationship) -> Result<Self, Self::Error> {
    // A list means one-to-many; a single descriptor or null means one-to-one.
    match raw.data {
      Value::Array(items) => {
        let related_objects = items
          .into_iter()
          .map(serde_json::from_value)
          .collect::<Result<Vec<Object>, _>>()
          .map_err(|e| e.to_string())?;
        Ok(Self {
          is_one_to_one: false,
          related_objects,
        })
      }
      Value::Null => Ok(Self {
        is_one_to_one: true,
        related_objects: Vec::new(),
      }),
      other => {
        let obj = serde_json::from_value(other).map_err(|e| e.to_string())?;
        Ok(Self {
          is_one_to_one: true,
          related_objects: vec![obj],
        })
      }
    }
  }
}

impl TryFrom<RawObject> for Object {
  type Error = String;

  fn try_from(raw: RawObject) -> Result<Self, Self::Error> {
    let relationships = raw
      .relationships
      .into_iter()
      .map(|(name, r)| Relationship::try_from(r).map(|r| (name, r)))
      .collect::<Result<_, _>>()?;
    Ok(Self {
      object_type: raw.object_type,
      id: raw.id,
      attributes: raw.attributes,
      relationships,
    })
  }
}

impl Object {
  /// Builds a bare object descriptor with no attributes or relationships.
  pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      object_type: object_type.into(),
      id: id.into(),
      ..Default::default()
    }
  }

  /// Key used for this object in printed output: `<type> <<id>>`.
  #[must_use]
  pub fn display_key(&self) -> String {
    format!("{} <{}>", self.object_type, self.id)
  }
}
