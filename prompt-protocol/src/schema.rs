//! # Schema Loading
//!
//! Parses API and module documents into a strongly typed, validated model.
//!
//! Both documents share one shape:
//!
//! ```yaml
//! events:
//!   loop_enter:
//!     id: 32
//!   loop_exit:        # no payload
//! ```
//!
//! The API document is the single source of truth for each event's parameter
//! set and its wire order. A module document lists the subset of events (and,
//! per event, the subset of parameters) a profiling module actually consumes.
//!
//! Validation is all-or-nothing: the first structural violation rejects the
//! whole document and no partially populated spec is ever returned.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::document::{first_repeat, Node};
use crate::error::SchemaError;

/// A single byte-aligned event parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Width on the wire in bits (always a positive multiple of 8)
    pub width: u32,
}

/// One event of the API catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub name: String,
    /// Parameters in wire order; empty when the event carries no payload
    pub params: Vec<Param>,
}

impl EventSpec {
    /// Look up a parameter by name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Full event catalog, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSpec {
    events: Vec<EventSpec>,
}

impl ApiSpec {
    #[must_use]
    pub fn events(&self) -> &[EventSpec] {
        &self.events
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<&EventSpec> {
        self.events.iter().find(|e| e.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Parse and validate an API document from text
    ///
    /// # Errors
    /// Returns a [`SchemaError`] if the text does not parse or the document
    /// violates the API contract
    pub fn parse(text: &str, format: DocumentFormat) -> Result<Self, SchemaError> {
        load_api_spec(&format.parse(text)?)
    }

    /// Read, parse and validate an API document, picking the format from the
    /// file extension
    ///
    /// # Errors
    /// Returns a [`SchemaError`] if the file cannot be read or is invalid
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        load_api_spec(&read_document(path.as_ref())?)
    }
}

/// One event selected by a module, with the parameters it keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEvent {
    pub name: String,
    pub params: Vec<String>,
}

impl ModuleEvent {
    #[must_use]
    pub fn includes(&self, param: &str) -> bool {
        self.params.iter().any(|p| p == param)
    }
}

/// Restriction of an [`ApiSpec`] to the events one profiling module consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    events: Vec<ModuleEvent>,
}

impl ModuleSpec {
    #[must_use]
    pub fn events(&self) -> &[ModuleEvent] {
        &self.events
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<&ModuleEvent> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Parse and validate a module document against `api`
    ///
    /// # Errors
    /// Returns a [`SchemaError`] if the text does not parse or references
    /// events/parameters missing from `api`
    pub fn parse(api: &ApiSpec, text: &str, format: DocumentFormat) -> Result<Self, SchemaError> {
        load_module_spec(api, &format.parse(text)?)
    }

    /// Read, parse and validate a module document against `api`
    ///
    /// # Errors
    /// Returns a [`SchemaError`] if the file cannot be read or is invalid
    pub fn from_path(api: &ApiSpec, path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        load_module_spec(api, &read_document(path.as_ref())?)
    }
}

/// Serialization format of a schema document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension (`json`, `yaml`, `yml`)
    ///
    /// # Errors
    /// Returns [`SchemaError::UnknownFormat`] for any other extension
    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(SchemaError::UnknownFormat(path.display().to_string())),
        }
    }

    /// Parse text into a generic document tree, preserving mapping order
    ///
    /// # Errors
    /// Returns the underlying JSON or YAML parse error, or
    /// [`SchemaError::DuplicateEvent`] / [`SchemaError::DuplicateParameter`] /
    /// [`SchemaError::DuplicateKey`] if a mapping repeats a key
    pub fn parse(self, text: &str) -> Result<Value, SchemaError> {
        let node: Node = match self {
            Self::Json => serde_json::from_str(text)?,
            Self::Yaml => serde_yaml::from_str(text)?,
        };
        node.into_document()
    }
}

fn read_document(path: &Path) -> Result<Value, SchemaError> {
    let format = DocumentFormat::from_path(path)?;
    let text = fs::read_to_string(path)
        .map_err(|source| SchemaError::Read { path: path.display().to_string(), source })?;
    log::debug!("Loaded schema document {}", path.display());
    format.parse(&text)
}

/// Validate an API document
///
/// # Errors
/// - [`SchemaError::MissingEvents`] / [`SchemaError::EventsNotMapping`] for a
///   missing or malformed `events` key
/// - [`SchemaError::ParametersNotMapping`] if an event body is not a mapping
/// - [`SchemaError::NotAnInteger`] / [`SchemaError::InvalidWidth`] for a bad
///   parameter width
/// - [`SchemaError::InvalidIdentifier`] / [`SchemaError::DuplicateEvent`] for
///   names that cannot become distinct macros
pub fn load_api_spec(document: &Value) -> Result<ApiSpec, SchemaError> {
    let entries = events_of(document, "API")?;

    let mut events: Vec<EventSpec> = Vec::with_capacity(entries.len());
    for (name, body) in entries {
        check_identifier(name)?;
        // Macro names are upper-cased, so `foo` and `FOO` would collide
        if events.iter().any(|e| e.name.eq_ignore_ascii_case(name)) {
            return Err(SchemaError::DuplicateEvent { event: name.clone() });
        }

        let params = match body {
            Value::Null => Vec::new(),
            Value::Object(map) => map
                .iter()
                .map(|(param, width)| parse_param(name, param, width))
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(SchemaError::ParametersNotMapping { event: name.clone() }),
        };

        events.push(EventSpec { name: name.clone(), params });
    }

    Ok(ApiSpec { events })
}

/// Validate a module document against the API it restricts
///
/// # Errors
/// - [`SchemaError::MissingEvents`] / [`SchemaError::EventsNotMapping`] for a
///   missing or malformed `events` key
/// - [`SchemaError::UnknownEvent`] if an event is not in `api`
/// - [`SchemaError::ParameterNotInApi`] if a parameter is not part of the
///   event's API parameter set
/// - [`SchemaError::InvalidParameterList`] for an unusable event body
/// - [`SchemaError::DuplicateParameter`] if a parameter is listed twice
pub fn load_module_spec(api: &ApiSpec, document: &Value) -> Result<ModuleSpec, SchemaError> {
    let entries = events_of(document, "module")?;

    let mut events = Vec::with_capacity(entries.len());
    for (name, body) in entries {
        let api_event =
            api.event(name).ok_or_else(|| SchemaError::UnknownEvent { event: name.clone() })?;

        let names: Vec<String> = match body {
            Value::Null => Vec::new(),
            Value::Object(map) => map.keys().cloned().collect(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| SchemaError::InvalidParameterList { event: name.clone() })
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(SchemaError::InvalidParameterList { event: name.clone() }),
        };

        if let Some(param) = first_repeat(names.iter()) {
            return Err(SchemaError::DuplicateParameter {
                event: name.clone(),
                param: param.clone(),
            });
        }
        if let Some(missing) = names.iter().find(|p| api_event.param(p).is_none()) {
            return Err(SchemaError::ParameterNotInApi {
                event: name.clone(),
                param: missing.clone(),
            });
        }

        events.push(ModuleEvent { name: name.clone(), params: names });
    }

    Ok(ModuleSpec { events })
}

fn events_of<'a>(
    document: &'a Value,
    kind: &'static str,
) -> Result<&'a Map<String, Value>, SchemaError> {
    match document.get("events") {
        None => Err(SchemaError::MissingEvents(kind)),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(SchemaError::EventsNotMapping(kind)),
    }
}

fn parse_param(event: &str, param: &str, width: &Value) -> Result<Param, SchemaError> {
    check_identifier(param)?;

    let invalid = |width: i128| SchemaError::InvalidWidth {
        event: event.to_string(),
        param: param.to_string(),
        width,
    };

    let width = if let Some(w) = width.as_i64() {
        i128::from(w)
    } else if let Some(w) = width.as_u64() {
        i128::from(w)
    } else {
        return Err(SchemaError::NotAnInteger { event: event.to_string(), param: param.to_string() });
    };

    if width <= 0 || width % 8 != 0 {
        return Err(invalid(width));
    }
    let bits = u32::try_from(width).map_err(|_| invalid(width))?;

    Ok(Param { name: param.to_string(), width: bits })
}

fn check_identifier(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loop_api() -> ApiSpec {
        load_api_spec(&json!({ "events": { "loop_enter": { "id": 32 }, "loop_exit": null } }))
            .unwrap()
    }

    #[test]
    fn test_api_keeps_document_order() {
        let api = load_api_spec(&json!({
            "events": { "store": { "instr": 32, "addr": 64, "size": 32 }, "alloc": null }
        }))
        .unwrap();

        let names: Vec<&str> = api.events().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["store", "alloc"]);

        let params: Vec<(&str, u32)> =
            api.events()[0].params.iter().map(|p| (p.name.as_str(), p.width)).collect();
        assert_eq!(params, [("instr", 32), ("addr", 64), ("size", 32)]);
        assert!(api.events()[1].params.is_empty());
    }

    #[test]
    fn test_api_missing_events() {
        let err = load_api_spec(&json!({ "evnts": {} })).unwrap_err();
        assert!(matches!(err, SchemaError::MissingEvents("API")));
    }

    #[test]
    fn test_api_rejects_unaligned_width() {
        let err = load_api_spec(&json!({ "events": { "load": { "addr": 12 } } })).unwrap_err();
        match err {
            SchemaError::InvalidWidth { event, param, width } => {
                assert_eq!(event, "load");
                assert_eq!(param, "addr");
                assert_eq!(width, 12);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_api_rejects_zero_and_negative_width() {
        for width in [0, -8] {
            let err =
                load_api_spec(&json!({ "events": { "load": { "addr": width } } })).unwrap_err();
            assert!(matches!(err, SchemaError::InvalidWidth { .. }), "width {width}");
        }
    }

    #[test]
    fn test_api_rejects_non_integer_width() {
        for width in [json!("32"), json!(32.5), json!(true)] {
            let err =
                load_api_spec(&json!({ "events": { "load": { "addr": width } } })).unwrap_err();
            assert!(matches!(err, SchemaError::NotAnInteger { .. }));
        }
    }

    #[test]
    fn test_api_rejects_list_parameters() {
        let err = load_api_spec(&json!({ "events": { "load": [32] } })).unwrap_err();
        assert!(matches!(err, SchemaError::ParametersNotMapping { .. }));
    }

    #[test]
    fn test_api_rejects_case_collision() {
        let err =
            load_api_spec(&json!({ "events": { "finished": null, "FINISHED": null } })).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEvent { .. }));
    }

    #[test]
    fn test_api_rejects_bad_identifier() {
        let err = load_api_spec(&json!({ "events": { "loop-enter": null } })).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidIdentifier(name) if name == "loop-enter"));
    }

    #[test]
    fn test_module_subset_accepted() {
        let api = loop_api();
        let module =
            load_module_spec(&api, &json!({ "events": { "loop_enter": ["id"] } })).unwrap();
        assert_eq!(module.events().len(), 1);
        assert!(module.events()[0].includes("id"));
    }

    #[test]
    fn test_module_accepts_mapping_and_null_bodies() {
        let api = loop_api();
        let module = load_module_spec(
            &api,
            &json!({ "events": { "loop_exit": null, "loop_enter": { "id": 32 } } }),
        )
        .unwrap();
        assert_eq!(module.events()[0].name, "loop_exit");
        assert!(module.events()[0].params.is_empty());
        assert_eq!(module.events()[1].params, ["id"]);
    }

    #[test]
    fn test_module_rejects_unknown_parameter() {
        let api = loop_api();
        let err = load_module_spec(&api, &json!({ "events": { "loop_enter": ["bogus"] } }))
            .unwrap_err();
        match err {
            SchemaError::ParameterNotInApi { event, param } => {
                assert_eq!(event, "loop_enter");
                assert_eq!(param, "bogus");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_module_rejects_unknown_event() {
        let api = loop_api();
        let err = load_module_spec(&api, &json!({ "events": { "func_entry": null } })).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownEvent { event } if event == "func_entry"));
    }

    #[test]
    fn test_module_missing_events() {
        let err = load_module_spec(&loop_api(), &json!({})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingEvents("module")));
    }

    #[test]
    fn test_yaml_preserves_order() {
        let api = ApiSpec::parse(
            "events:\n  zeta:\n    b: 16\n    a: 8\n  alpha:\n",
            DocumentFormat::Yaml,
        )
        .unwrap();
        assert_eq!(api.events()[0].name, "zeta");
        assert_eq!(api.events()[0].params[0].name, "b");
        assert_eq!(api.events()[1].name, "alpha");
    }

    #[test]
    fn test_json_repeated_parameter_rejected() {
        let err = ApiSpec::parse(r#"{"events": {"a": {"x": 8, "x": 16}}}"#, DocumentFormat::Json)
            .unwrap_err();
        match err {
            SchemaError::DuplicateParameter { event, param } => {
                assert_eq!(event, "a");
                assert_eq!(param, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_yaml_repeated_parameter_rejected() {
        let err =
            ApiSpec::parse("events:\n  a:\n    x: 8\n    x: 16\n", DocumentFormat::Yaml)
                .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateParameter { event, param } if event == "a" && param == "x"
        ));
    }

    #[test]
    fn test_repeated_event_rejected_in_both_formats() {
        let json = ApiSpec::parse(r#"{"events": {"a": null, "a": {"x": 8}}}"#, DocumentFormat::Json);
        assert!(matches!(json, Err(SchemaError::DuplicateEvent { event }) if event == "a"));

        let yaml = ApiSpec::parse("events:\n  a:\n  a:\n    x: 8\n", DocumentFormat::Yaml);
        assert!(matches!(yaml, Err(SchemaError::DuplicateEvent { event }) if event == "a"));
    }

    #[test]
    fn test_module_repeated_parameter_rejected() {
        let api = loop_api();
        let err =
            ModuleSpec::parse(&api, "events:\n  loop_enter: [id, id]\n", DocumentFormat::Yaml)
                .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateParameter { .. }));

        let err = ModuleSpec::parse(
            &api,
            "events:\n  loop_exit:\n  loop_exit:\n",
            DocumentFormat::Yaml,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEvent { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("api.yml")).unwrap(), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")).unwrap(), DocumentFormat::Json);
        assert!(DocumentFormat::from_path(Path::new("api.toml")).is_err());
    }
}
