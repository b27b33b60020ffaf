use super::{BoxGun, BoxGunParams, ExtKinematics, GeneratorHandle, WorkGenerator};
use core::fmt;
use primserve_core::{Error, Result, config::RunConfig};
use std::{collections::HashMap, sync::Arc};

/// Builds a generator for a run configuration.
pub type BuildFn = dyn Fn(&RunConfig) -> Result<Box<dyn WorkGenerator>> + Send + Sync;

/// A named way of building generators.
#[derive(Clone)]
pub struct GeneratorKind {
    name: String,
    cacheable: bool,
    build: Arc<BuildFn>,
}

impl fmt::Debug for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorKind")
            .field("name", &self.name)
            .field("cacheable", &self.cacheable)
            .finish_non_exhaustive()
    }
}

impl GeneratorKind {
    /// `cacheable` kinds are built once and reused whenever the same name is
    /// requested again. Kinds whose output depends on more than the name,
    /// such as an input file, must not be cacheable.
    pub fn new<F>(name: impl Into<String>, cacheable: bool, build: F) -> Self
    where
        F: Fn(&RunConfig) -> Result<Box<dyn WorkGenerator>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cacheable,
            build: Arc::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Builds a fresh instance, bypassing any cache.
    ///
    /// # Errors
    ///
    /// Propagates the builder's error.
    pub fn build(&self, config: &RunConfig) -> Result<GeneratorHandle> {
        Ok(GeneratorHandle::new(self.name.as_str(), (self.build)(config)?))
    }
}

/// Generator kinds by name, plus live instances of the cacheable ones.
///
/// Cached instances keep the parameters they were built with; changing
/// `BoxGun.*` parameters on a reconfiguration only affects kinds that are
/// built fresh.
#[derive(Debug, Default)]
pub struct GeneratorRegistry {
    kinds: HashMap<String, GeneratorKind>,
    cache: HashMap<String, GeneratorHandle>,
}

impl GeneratorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `boxgen` (cacheable) and `extkin` (never cached).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(GeneratorKind::new("boxgen", true, |config| {
            let params = BoxGunParams::from_params(&config.params)?;
            Ok(Box::new(BoxGun::new(params)?))
        }));
        registry.register(GeneratorKind::new("extkin", false, |config| {
            let path = config
                .ext_kin_file
                .clone()
                .ok_or_else(|| Error::InvalidConfig {
                    reason: "the extkin generator needs a kinematics file".to_string(),
                })?;
            Ok(Box::new(ExtKinematics::new(path)))
        }));
        registry
    }

    /// Adds or replaces a kind. Replacing a kind drops its cached instance.
    pub fn register(&mut self, kind: GeneratorKind) -> Option<GeneratorKind> {
        self.cache.remove(kind.name());
        self.kinds.insert(kind.name().to_string(), kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Registered kind names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// The cached instance for `name`, if one was built.
    pub fn cached(&self, name: &str) -> Option<&GeneratorHandle> {
        self.cache.get(name)
    }

    /// Returns the generator for `config.generator`, reusing the cached
    /// instance of a cacheable kind.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownGenerator`] if no kind has that name.
    /// - The builder's error if a fresh instance is needed and cannot be
    ///   built.
    pub fn resolve(&mut self, config: &RunConfig) -> Result<GeneratorHandle> {
        let name = config.generator.as_str();
        let kind = self.kinds.get(name).ok_or_else(|| Error::UnknownGenerator {
            name: name.to_string(),
        })?;

        if kind.is_cacheable() {
            if let Some(handle) = self.cache.get(name) {
                tracing::info!("Found cached generator for {name}");
                return Ok(handle.clone());
            }
        }

        let handle = kind.build(config)?;
        if kind.is_cacheable() {
            self.cache.insert(name.to_string(), handle.clone());
        }
        tracing::debug!(generator = name, cacheable = kind.is_cacheable(), "built generator");
        Ok(handle)
    }
}
