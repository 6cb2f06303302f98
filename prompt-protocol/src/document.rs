//! Raw document tree
//!
//! `serde_json::Value` keeps the last value for a repeated mapping key, which
//! would silently change an event's parameter list and wire layout. Schema
//! documents are therefore deserialized into [`Node`], which keeps every
//! entry in document order, checked for repeated names, and only then turned
//! into a `Value`.

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// A parsed document node; mappings may still hold repeated keys
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Scalar(Value),
    Seq(Vec<Node>),
    Map(Vec<(String, Node)>),
}

impl Node {
    /// Reject repeated event, parameter or other mapping keys, then convert
    pub(crate) fn into_document(self) -> Result<Value, SchemaError> {
        self.check_schema_names()?;
        self.into_value()
    }

    /// Repeated names under `events` get errors naming the event/parameter
    fn check_schema_names(&self) -> Result<(), SchemaError> {
        let Self::Map(top) = self else {
            return Ok(());
        };
        let Some((_, Self::Map(events))) = top.iter().find(|(key, _)| key == "events") else {
            return Ok(());
        };

        if let Some(event) = first_repeat(events.iter().map(|(name, _)| name)) {
            return Err(SchemaError::DuplicateEvent { event: event.clone() });
        }
        for (event, body) in events {
            if let Self::Map(params) = body {
                if let Some(param) = first_repeat(params.iter().map(|(name, _)| name)) {
                    return Err(SchemaError::DuplicateParameter {
                        event: event.clone(),
                        param: param.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn into_value(self) -> Result<Value, SchemaError> {
        Ok(match self {
            Self::Scalar(value) => value,
            Self::Seq(items) => {
                Value::Array(items.into_iter().map(Self::into_value).collect::<Result<_, _>>()?)
            }
            Self::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, node) in entries {
                    if map.contains_key(&key) {
                        return Err(SchemaError::DuplicateKey(key));
                    }
                    let value = node.into_value()?;
                    map.insert(key, value);
                }
                Value::Object(map)
            }
        })
    }
}

/// First name that occurs twice
pub(crate) fn first_repeat<'a>(
    mut names: impl Iterator<Item = &'a String>,
) -> Option<&'a String> {
    let mut seen = HashSet::new();
    names.find(|name| !seen.insert(*name))
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON or YAML document")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::Scalar(Value::String(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::Scalar(Value::String(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry::<String, Node>()? {
            entries.push(entry);
        }
        Ok(Node::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keeps_repeated_keys() {
        let node: Node = serde_json::from_str(r#"{"a": 1, "a": 2}"#).unwrap();
        let Node::Map(entries) = node else { panic!("expected a mapping") };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_repeated_key_outside_events_rejected() {
        let node: Node = serde_yaml::from_str("events:\n  a:\nevents:\n  b:\n").unwrap();
        assert!(matches!(
            node.into_document(),
            Err(SchemaError::DuplicateKey(key)) if key == "events"
        ));
    }

    #[test]
    fn test_unique_document_converts_in_order() {
        let node: Node = serde_yaml::from_str("events:\n  z: {b: 16, a: 8}\n  y:\n").unwrap();
        let value = node.into_document().unwrap();
        let names: Vec<&String> = value["events"].as_object().unwrap().keys().collect();
        assert_eq!(names, ["z", "y"]);
        assert!(value["events"]["y"].is_null());
    }
}
