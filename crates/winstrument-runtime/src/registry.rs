use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use winstrument_probes::ProbeCatalog;
use winstrument_types::ProbeDescriptor;

#[derive(Debug, Deserialize)]
struct MetadataEntry {
    #[serde(default)]
    description: String,
}

/// Probe bookkeeping: what exists, what the user asked for, and what
/// will be instantiated for the next session.
///
/// `loaded` is always the subset of `queued` the catalog can resolve.
#[derive(Debug)]
pub struct ProbeRegistry {
    catalog: ProbeCatalog,
    descriptors: Vec<ProbeDescriptor>,
    available: Vec<String>,
    queued: Vec<String>,
    loaded: Vec<String>,
}

impl ProbeRegistry {
    pub fn new(catalog: ProbeCatalog) -> Self {
        let descriptors = catalog_descriptors(&catalog);
        Self::with_descriptors(catalog, descriptors)
    }

    /// Read descriptors from a `probes.toml` metadata file.
    ///
    /// A missing or malformed file falls back to the catalog.
    pub fn from_metadata(catalog: ProbeCatalog, path: &Path) -> Self {
        match load_metadata(&catalog, path) {
            Some(descriptors) => Self::with_descriptors(catalog, descriptors),
            None => Self::new(catalog),
        }
    }

    fn with_descriptors(catalog: ProbeCatalog, descriptors: Vec<ProbeDescriptor>) -> Self {
        let available = descriptors
            .iter()
            .filter(|d| d.available)
            .map(|d| d.name.clone())
            .collect();

        Self {
            catalog,
            descriptors,
            available,
            queued: Vec::new(),
            loaded: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &ProbeCatalog {
        &self.catalog
    }

    pub fn descriptors(&self) -> &[ProbeDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&ProbeDescriptor> {
        let name = name.to_lowercase();
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn queued(&self) -> &[String] {
        &self.queued
    }

    pub fn loaded(&self) -> &[String] {
        &self.loaded
    }

    /// Queue a probe for future sessions. Returns whether it is now loaded.
    pub fn load_probe(&mut self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.queued.contains(&name) {
            tracing::warn!(probe = %name, "probe already queued");
        } else {
            self.queued.push(name.clone());
        }
        self.resolve();
        self.loaded.contains(&name)
    }

    /// Remove a probe from future sessions. Running instances are unaffected.
    pub fn unload_probe(&mut self, name: &str) -> bool {
        let name = name.to_lowercase();
        let was_queued = self.queued.contains(&name) || self.loaded.contains(&name);
        if !was_queued {
            tracing::warn!(probe = %name, "probe is not loaded");
            return false;
        }

        self.queued.retain(|n| *n != name);
        self.loaded.retain(|n| *n != name);
        let describes = self.descriptor(&name).is_some_and(|d| d.available);
        if describes && !self.available.contains(&name) {
            self.available.push(name);
        }
        true
    }

    /// Rebuild `loaded` from `queued`, dropping names the catalog cannot
    /// instantiate.
    pub fn resolve(&mut self) {
        let catalog = &self.catalog;
        self.queued.retain(|name| {
            let known = catalog.contains(name);
            if !known {
                tracing::warn!(probe = %name, "unknown probe, dropping");
            }
            known
        });

        self.loaded = self.queued.clone();
        self.available.retain(|name| !self.loaded.contains(name));
    }
}

fn catalog_descriptors(catalog: &ProbeCatalog) -> Vec<ProbeDescriptor> {
    catalog
        .names()
        .into_iter()
        .map(|name| ProbeDescriptor {
            name: name.to_string(),
            description: catalog.description(name).unwrap_or_default().to_string(),
            available: true,
        })
        .collect()
}

fn load_metadata(catalog: &ProbeCatalog, path: &Path) -> Option<Vec<ProbeDescriptor>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not read probe metadata");
            return None;
        }
    };

    let entries: BTreeMap<String, MetadataEntry> = match toml::from_str(&content) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "malformed probe metadata, using built-in descriptors");
            return None;
        }
    };

    let descriptors = entries
        .into_iter()
        .map(|(name, entry)| {
            let name = name.to_lowercase();
            let available = catalog.contains(&name);
            if !available {
                tracing::warn!(probe = %name, "described probe has no implementation");
            }
            ProbeDescriptor {
                name,
                description: entry.description,
                available,
            }
        })
        .collect();
    Some(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> ProbeRegistry {
        ProbeRegistry::new(ProbeCatalog::builtin())
    }

    #[test]
    fn test_load_moves_probe_out_of_available() {
        let mut registry = registry();

        assert!(registry.load_probe("Socket"));
        assert_eq!(registry.loaded(), ["socket"]);
        assert!(!registry.available().contains(&"socket".to_string()));
    }

    #[test]
    fn test_double_load_is_idempotent() {
        let mut registry = registry();

        registry.load_probe("dlls");
        assert!(registry.load_probe("dlls"));
        assert_eq!(registry.queued(), ["dlls"]);
    }

    #[test]
    fn test_unknown_probe_is_dropped() {
        let mut registry = registry();

        assert!(!registry.load_probe("keylogger"));
        assert!(registry.queued().is_empty());
        assert!(registry.loaded().is_empty());
    }

    #[test]
    fn test_loaded_is_requested_minus_unloaded() {
        let mut registry = registry();
        for name in ["socket", "dlls", "nope", "registry"] {
            registry.load_probe(name);
        }

        assert!(registry.unload_probe("dlls"));
        assert!(!registry.unload_probe("file_rw"));

        assert_eq!(registry.loaded(), ["socket", "registry"]);
        assert!(registry.available().contains(&"dlls".to_string()));
    }

    #[test]
    fn test_metadata_file_supplies_descriptors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("probes.toml");
        std::fs::write(
            &path,
            "[socket]\ndescription = \"Winsock activity\"\n\n[keylogger]\ndescription = \"Not shipped\"\n",
        )
        .unwrap();

        let registry = ProbeRegistry::from_metadata(ProbeCatalog::builtin(), &path);

        assert_eq!(registry.descriptors().len(), 2);
        assert_eq!(
            registry.descriptor("socket").unwrap().description,
            "Winsock activity"
        );
        assert!(!registry.descriptor("keylogger").unwrap().available);
        assert_eq!(registry.available(), ["socket"]);
    }

    #[test]
    fn test_unload_keeps_undescribed_probe_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("probes.toml");
        std::fs::write(&path, "[socket]\ndescription = \"Winsock activity\"\n").unwrap();
        let mut registry = ProbeRegistry::from_metadata(ProbeCatalog::builtin(), &path);

        assert!(registry.load_probe("dlls"));
        assert!(registry.load_probe("socket"));
        assert!(registry.available().is_empty());

        assert!(registry.unload_probe("dlls"));
        assert!(registry.unload_probe("socket"));
        assert_eq!(registry.available(), ["socket"]);
    }

    #[test]
    fn test_malformed_metadata_falls_back_to_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("probes.toml");
        std::fs::write(&path, "socket = [unterminated").unwrap();

        let registry = ProbeRegistry::from_metadata(ProbeCatalog::builtin(), &path);

        assert_eq!(
            registry.descriptors().len(),
            ProbeCatalog::builtin().names().len()
        );
    }
}
