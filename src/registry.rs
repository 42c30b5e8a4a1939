use crate::binding::{Binding, EclipseBinding, LegacyBinding};
use crate::{Error, Result};
use std::fmt;

/// Known engine banners and the release they correspond to.
const KNOWN_VERSIONS: &[(&str, EngineVersion)] = &[
    ("SUMO d1422e4780a", EngineVersion::new(0, 32, 0)),
    ("SUMO 619df188ac3", EngineVersion::new(0, 32, 0)),
    ("SUMO 1.0.1", EngineVersion::new(1, 0, 1)),
    ("SUMO 1.1.0", EngineVersion::new(1, 1, 0)),
    ("SUMO v1_1_0", EngineVersion::new(1, 1, 0)),
];

/// The release assumed for banners not in the table.
const LATEST: EngineVersion = EngineVersion::new(1, 1, 0);

/// A numeric engine release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Resolves an engine banner: exact match first, then prefix match,
    /// falling back to the latest known release.
    pub fn from_banner(banner: &str) -> Self {
        KNOWN_VERSIONS
            .iter()
            .find(|(known, _)| *known == banner)
            .or_else(|| KNOWN_VERSIONS.iter().find(|(known, _)| banner.starts_with(known)))
            .map(|(_, version)| *version)
            .unwrap_or(LATEST)
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The set of bindings a control plane can be built on.
pub struct Registry {
    factories: Vec<fn() -> Box<dyn Binding>>,
}

impl Default for Registry {
    /// A registry holding every binding shipped with the crate.
    fn default() -> Self {
        Self {
            factories: vec![LegacyBinding::boxed, EclipseBinding::boxed],
        }
    }
}

impl Registry {
    /// Creates a registry with no bindings.
    pub fn empty() -> Self {
        Self { factories: vec![] }
    }

    /// Registers a binding. Bindings registered first win ties.
    pub fn register(&mut self, factory: fn() -> Box<dyn Binding>) {
        self.factories.push(factory);
    }

    /// Picks the binding for an engine banner.
    ///
    /// The first binding declaring a matching prefix is used; otherwise the
    /// first one marked as default.
    pub fn resolve(&self, version: &str) -> Result<Box<dyn Binding>> {
        let mut fallback = None;
        for factory in &self.factories {
            let binding = factory();
            if binding.supports(version) {
                log::debug!("engine {:?} bound to {}", version, binding.name());
                return Ok(binding);
            }
            if fallback.is_none() && binding.is_default() {
                fallback = Some(binding);
            }
        }
        match fallback {
            Some(binding) => {
                log::warn!(
                    "no binding declares engine {:?}, using default {}",
                    version,
                    binding.name()
                );
                Ok(binding)
            }
            None => Err(Error::UnsupportedVersion(version.to_owned())),
        }
    }
}
