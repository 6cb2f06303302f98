//! Consumer-side profiling modules
//!
//! The consumer selects its analysis by numeric index; the frontend generator
//! selects the events file describing what that analysis needs.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Analysis modules the consumer can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfilingModule {
    /// Loop-carried memory dependences
    Dep,
    /// Dependences with calling context tracking
    DepContext,
    /// Points-to sets of pointer operands
    PointsTo,
    /// Loaded value prediction
    LoadedValue,
    /// Object lifetime within loop iterations
    ObjectLifetime,
    /// Dependences across the whole program
    WholeProgramDep,
    /// Privatization profile
    Privateer,
}

impl ProfilingModule {
    pub const ALL: [Self; 7] = [
        Self::Dep,
        Self::DepContext,
        Self::PointsTo,
        Self::LoadedValue,
        Self::ObjectLifetime,
        Self::WholeProgramDep,
        Self::Privateer,
    ];

    /// Short name used on the command line
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dep => "dep",
            Self::DepContext => "dep-context",
            Self::PointsTo => "pt",
            Self::LoadedValue => "lv",
            Self::ObjectLifetime => "ol",
            Self::WholeProgramDep => "wp-dep",
            Self::Privateer => "privateer",
        }
    }

    /// Index passed to the consumer's `--module` flag
    ///
    /// `dep-context` shares the dependence module; context tracking is
    /// selected by the events compiled into the producer.
    #[must_use]
    pub const fn consumer_index(self) -> u32 {
        match self {
            Self::Dep | Self::DepContext => 0,
            Self::PointsTo => 1,
            Self::LoadedValue => 2,
            Self::ObjectLifetime => 3,
            Self::WholeProgramDep => 4,
            Self::Privateer => 5,
        }
    }

    /// Module events file inside the configuration directory
    #[must_use]
    pub const fn events_file(self) -> &'static str {
        match self {
            Self::Dep => "DepModEvents.yaml",
            Self::DepContext => "DepModule_TrackContext_Events.yaml",
            Self::PointsTo => "PointsToModEvents.yaml",
            Self::LoadedValue => "LoadedValueModEvents.yaml",
            Self::ObjectLifetime => "ObjectLifetimeModEvents.yaml",
            Self::WholeProgramDep => "WholeProgramDepModEvents.yaml",
            Self::Privateer => "PrivateerProfilerEvents.yaml",
        }
    }

    /// Whether the consumer can split this analysis across threads
    #[must_use]
    pub const fn supports_threads(self) -> bool {
        !matches!(self, Self::ObjectLifetime | Self::Privateer)
    }
}

impl fmt::Display for ProfilingModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModule(pub String);

impl fmt::Display for UnknownModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = ProfilingModule::ALL.iter().map(|m| m.name()).collect();
        write!(f, "unknown module '{}' (expected one of: {})", self.0, names.join(", "))
    }
}

impl std::error::Error for UnknownModule {}

impl FromStr for ProfilingModule {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // `lt` is the driver's historical spelling of object lifetime
            "lt" => Ok(Self::ObjectLifetime),
            _ => Self::ALL
                .into_iter()
                .find(|m| m.name() == s)
                .ok_or_else(|| UnknownModule(s.to_string())),
        }
    }
}
