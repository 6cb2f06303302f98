//! Schema validation errors
//!
//! Every variant names enough of the offending document (event, parameter,
//! value) for the author to find the line to fix.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("No events in {0} specification")]
    MissingEvents(&'static str),

    #[error("`events` in {0} specification is not a mapping")]
    EventsNotMapping(&'static str),

    #[error("Parameters for event {event} are not a mapping")]
    ParametersNotMapping { event: String },

    #[error("Parameter {param} for event {event} is not an int")]
    NotAnInteger { event: String, param: String },

    #[error("Parameter {param} for event {event} has width {width}, not a positive multiple of 8")]
    InvalidWidth { event: String, param: String, width: i128 },

    #[error("Event {event} is declared more than once (names are compared case-insensitively)")]
    DuplicateEvent { event: String },

    #[error("Parameter {param} for event {event} is declared more than once")]
    DuplicateParameter { event: String, param: String },

    #[error("Key {0:?} is repeated")]
    DuplicateKey(String),

    #[error("Event {event} is not in the API")]
    UnknownEvent { event: String },

    #[error("Parameter {param} for event {event} is not in the API")]
    ParameterNotInApi { event: String, param: String },

    #[error("Parameter list for event {event} must be null, a list or a mapping")]
    InvalidParameterList { event: String },

    #[error("{0:?} is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("Unknown document format: {0}")]
    UnknownFormat(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
