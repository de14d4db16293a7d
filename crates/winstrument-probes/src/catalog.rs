use std::fmt;
use std::sync::Arc;

use crate::builtin;
use crate::{Error, Probe, Result};

pub type ProbeFactory = Arc<dyn Fn() -> Box<dyn Probe> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct ProbeMetadata {
    pub name: &'static str,
    pub description: &'static str,
    pub create: fn() -> Box<dyn Probe>,
}

const BUILTIN_PROBES: &[ProbeMetadata] = &[
    ProbeMetadata {
        name: "socket",
        description: "Network connections made through Winsock",
        create: builtin::socket,
    },
    ProbeMetadata {
        name: "registry",
        description: "Registry keys opened and values queried",
        create: builtin::registry,
    },
    ProbeMetadata {
        name: "file_rw",
        description: "Files opened, with total bytes read and written per handle",
        create: builtin::file_rw,
    },
    ProbeMetadata {
        name: "dlls",
        description: "Libraries loaded by name or path",
        create: builtin::dlls,
    },
    ProbeMetadata {
        name: "impersonate",
        description: "Calls that impersonate another security context",
        create: builtin::impersonate,
    },
    ProbeMetadata {
        name: "pipes",
        description: "Named pipes created, connected or called",
        create: builtin::pipes,
    },
    ProbeMetadata {
        name: "process",
        description: "Child processes created by the target",
        create: builtin::process,
    },
    ProbeMetadata {
        name: "com_hijack",
        description: "COM server lookups under HKCU that can be hijacked",
        create: builtin::com_hijack,
    },
];

pub fn builtin_metadata() -> &'static [ProbeMetadata] {
    BUILTIN_PROBES
}

#[derive(Clone)]
struct CatalogEntry {
    name: String,
    description: String,
    factory: ProbeFactory,
}

/// Name → factory table of every probe type that can be instantiated.
#[derive(Clone)]
pub struct ProbeCatalog {
    entries: Vec<CatalogEntry>,
}

impl ProbeCatalog {
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for meta in BUILTIN_PROBES {
            let create = meta.create;
            catalog = catalog.with(meta.name, meta.description, move || create());
        }
        catalog
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add or replace a probe type. Names are matched case-insensitively.
    pub fn with<F>(mut self, name: &str, description: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Probe> + Send + Sync + 'static,
    {
        let name = name.to_lowercase();
        self.entries.retain(|entry| entry.name != name);
        self.entries.push(CatalogEntry {
            name,
            description: description.to_string(),
            factory: Arc::new(factory),
        });
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.find(name).map(|e| e.description.as_str())
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Probe>> {
        self.find(name)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| Error::ProbeNotFound(name.to_string()))
    }

    /// Instantiate every entry once and report factories that produce a
    /// probe under a different name or without a script.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for entry in &self.entries {
            let probe = (entry.factory)();
            if probe.name() != entry.name {
                problems.push(format!(
                    "{}: factory produced probe named '{}'",
                    entry.name,
                    probe.name()
                ));
            }
            if probe.script().trim().is_empty() {
                problems.push(format!("{}: empty agent script", entry.name));
            }
        }
        problems
    }

    fn find(&self, name: &str) -> Option<&CatalogEntry> {
        let name = name.to_lowercase();
        self.entries.iter().find(|e| e.name == name)
    }
}

impl fmt::Debug for ProbeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeCatalog")
            .field("probes", &self.names())
            .finish()
    }
}
