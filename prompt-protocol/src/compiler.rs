//! # Protocol Compiler
//!
//! Renders validated schemas into producer-side emission macros:
//!
//! ```c
//! #define PRODUCE_LOOP_ENTER(id) produce_8_32(LOOP_ENTER, id)
//! #define PRODUCE_LOOP_EXIT() produce_8(LOOP_EXIT)
//! ```
//!
//! The macro always takes every API parameter of the event so instrumented
//! call sites keep one signature whichever module is compiled in. Only the
//! parameters the module keeps are forwarded, and the helper name spells
//! their widths in wire order. Changing the kept set therefore changes which
//! unpacking routine the consumer must pair with it.
//!
//! Output depends only on the input model; compiling the same specs twice is
//! byte-identical.

use std::fmt;

use crate::error::SchemaError;
use crate::schema::{ApiSpec, EventSpec, ModuleEvent, ModuleSpec, Param};

/// Width of the event tag that prefixes every record on the wire
pub const EVENT_TAG_BITS: u32 = 8;

const MACRO_PREFIX: &str = "PRODUCE_";
const FUNCTION_PREFIX: &str = "produce";

/// One compiled `#define` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Event name as written in the API
    pub event: String,
    /// Formal macro parameters (all API parameters, wire order)
    pub params: Vec<Param>,
    /// Parameters actually packed into the record (wire order)
    pub payload: Vec<Param>,
}

impl Declaration {
    fn new(event: &EventSpec, keep: Option<&ModuleEvent>) -> Self {
        let payload = event
            .params
            .iter()
            .filter(|p| keep.map_or(true, |m| m.includes(&p.name)))
            .cloned()
            .collect();

        Self { event: event.name.clone(), params: event.params.clone(), payload }
    }

    /// Upper-cased event tag passed as the first helper argument
    #[must_use]
    pub fn tag(&self) -> String {
        self.event.to_ascii_uppercase()
    }

    #[must_use]
    pub fn macro_name(&self) -> String {
        format!("{MACRO_PREFIX}{}", self.tag())
    }

    /// Emission helper, e.g. `produce_8_32_64`
    #[must_use]
    pub fn function_name(&self) -> String {
        let mut name = format!("{FUNCTION_PREFIX}_{EVENT_TAG_BITS}");
        for param in &self.payload {
            name.push('_');
            name.push_str(&param.width.to_string());
        }
        name
    }

    /// Total record size on the wire, tag included
    #[must_use]
    pub fn record_bytes(&self) -> u64 {
        let bits = self.payload.iter().map(|p| u64::from(p.width)).sum::<u64>();
        (u64::from(EVENT_TAG_BITS) + bits) / 8
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#define {}(", self.macro_name())?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&param.name)?;
        }
        write!(f, ") {}({}", self.function_name(), self.tag())?;
        for param in &self.payload {
            write!(f, ", {}", param.name)?;
        }
        f.write_str(")")
    }
}

/// Compile `api` into declarations
///
/// Without `module` every API event is compiled in API order. With a module,
/// only its events are compiled, in module order, each forwarding just the
/// parameters the module keeps.
///
/// # Errors
/// Returns [`SchemaError::UnknownEvent`] if `module` names an event that is
/// not in `api` (a module validated against a different catalog)
pub fn compile(api: &ApiSpec, module: Option<&ModuleSpec>) -> Result<Vec<Declaration>, SchemaError> {
    let Some(module) = module else {
        return Ok(api.events().iter().map(|e| Declaration::new(e, None)).collect());
    };

    module
        .events()
        .iter()
        .map(|m| {
            api.event(&m.name)
                .map(|e| Declaration::new(e, Some(m)))
                .ok_or_else(|| SchemaError::UnknownEvent { event: m.name.clone() })
        })
        .collect()
}

/// Render a header: the template prelude (if any) followed by one
/// declaration per line
#[must_use]
pub fn render_header(prelude: Option<&str>, declarations: &[Declaration]) -> String {
    let mut out = String::new();
    if let Some(prelude) = prelude.filter(|p| !p.is_empty()) {
        out.push_str(prelude);
        if !prelude.ends_with('\n') {
            out.push('\n');
        }
    }
    for decl in declarations {
        out.push_str(&decl.to_string());
        out.push('\n');
    }
    out
}
