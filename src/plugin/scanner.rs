//! Scans for oi plugins and turns their exports into modules

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::discovery::{ConnectOptions, Discovery, DiscoveryError, Registration};
use super::export::plug_module;
use super::manager::PluginManager;
use crate::module::ModuleConfig;

/// Extension point plugins export their module under
pub const EXTENSION_POINT: &str = "oi:module";

/// Vendor subdirectory searched inside every scanned path. Plugins are
/// typically installed as `@oi/oi-<name>` to group them.
pub const VENDOR_DIR: &str = "@oi";

/// Converts one registration into a module config
pub type PlugFn = Box<dyn Fn(&Registration) -> Result<ModuleConfig, DiscoveryError>>;

/// Extra plugin search paths. A single path converts into a one-element list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths(Vec<PathBuf>);

impl SearchPaths {
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }
}

impl From<Vec<PathBuf>> for SearchPaths {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self(paths)
    }
}

impl From<&[PathBuf]> for SearchPaths {
    fn from(paths: &[PathBuf]) -> Self {
        Self(paths.to_vec())
    }
}

impl From<Vec<&str>> for SearchPaths {
    fn from(paths: Vec<&str>) -> Self {
        Self(paths.into_iter().map(PathBuf::from).collect())
    }
}

impl From<PathBuf> for SearchPaths {
    fn from(path: PathBuf) -> Self {
        Self(vec![path])
    }
}

impl From<&Path> for SearchPaths {
    fn from(path: &Path) -> Self {
        Self(vec![path.to_path_buf()])
    }
}

impl From<&str> for SearchPaths {
    fn from(path: &str) -> Self {
        Self(vec![PathBuf::from(path)])
    }
}

/// Expands every path into itself and its vendor subdirectory (not recursive)
pub fn expand_vendor_dirs(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .flat_map(|path| [path.clone(), path.join(VENDOR_DIR)])
        .collect()
}

/// Discovers plugins exporting [`EXTENSION_POINT`] and converts them into module configs
pub struct PluginScanner<D: Discovery = PluginManager> {
    paths: SearchPaths,
    discovery: D,
    plug: PlugFn,
    plugins: Vec<Registration>,
    module_ids: Vec<String>,
}

impl PluginScanner<PluginManager> {
    /// Creates a scanner searching `paths` in addition to the standard locations
    pub fn new(paths: impl Into<SearchPaths>) -> Self {
        Self::with_discovery(paths, PluginManager::new())
    }
}

impl<D: Discovery> PluginScanner<D> {
    pub fn with_discovery(paths: impl Into<SearchPaths>, discovery: D) -> Self {
        Self {
            paths: paths.into(),
            discovery,
            plug: Box::new(plug_module),
            plugins: Vec::new(),
            module_ids: Vec::new(),
        }
    }

    /// Replaces the export-to-module conversion
    pub fn with_plug<F>(mut self, plug: F) -> Self
    where
        F: Fn(&Registration) -> Result<ModuleConfig, DiscoveryError> + 'static,
    {
        self.plug = Box::new(plug);
        self
    }

    /// Discovery defaults, then the extra paths, each with its vendor subdirectory
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.discovery.default_paths();
        paths.extend(self.paths.as_slice().iter().cloned());
        expand_vendor_dirs(&paths)
    }

    /// Scans for plugins and hands the resulting module configs to `callback`.
    ///
    /// The callback runs exactly once: with the error if discovery or a
    /// conversion fails, otherwise with every converted module (possibly none).
    pub fn load_plugins<'s, F>(&'s mut self, callback: F)
    where
        F: FnOnce(Result<Vec<ModuleConfig>, DiscoveryError>) + 's,
    {
        let paths = self.search_paths();
        debug!(
            "Scanning for plugins in {}",
            paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
        );
        self.discovery.scan(&paths);

        let plug = &self.plug;
        let plugins = &mut self.plugins;
        let module_ids = &mut self.module_ids;
        let options = ConnectOptions { multi: true };

        self.discovery.connect(
            EXTENSION_POINT,
            options,
            Box::new(move |result| {
                let registrations = match result {
                    Ok(registrations) => registrations,
                    Err(err) => {
                        error!("Plugin discovery failed: {}", err);
                        callback(Err(err));
                        return;
                    }
                };

                if registrations.is_empty() {
                    debug!("No plugins discovered");
                    *plugins = Vec::new();
                    *module_ids = Vec::new();
                    callback(Ok(Vec::new()));
                    return;
                }

                debug!(
                    "Discovered plugins: {}",
                    registrations.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ")
                );
                let modules = match registrations.iter().map(|r| plug(r)).collect::<Result<Vec<_>, _>>() {
                    Ok(modules) => modules,
                    Err(err) => {
                        error!("Failed to create plugin module: {}", err);
                        callback(Err(err));
                        return;
                    }
                };

                *module_ids = modules.iter().map(|m| m.effective_id().to_string()).collect();
                debug!("Created plugin modules: {}", module_ids.join(", "));
                *plugins = registrations;
                callback(Ok(modules));
            }),
        );
    }

    /// Registrations found by the last successful scan
    pub fn plugins(&self) -> &[Registration] {
        &self.plugins
    }

    /// Ids of the modules created by the last successful scan, in plugin order
    pub fn module_ids(&self) -> &[String] {
        &self.module_ids
    }

    pub fn extra_paths(&self) -> &[PathBuf] {
        self.paths.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{task, Module};
    use crate::plugin::ConnectCallback;
    use serde_json::{json, Value};
    use std::cell::Cell;

    /// Discovery double returning canned results
    struct FakeDiscovery {
        defaults: Vec<PathBuf>,
        outcome: Option<Result<Vec<Registration>, DiscoveryError>>,
        scanned: Vec<PathBuf>,
        extension_point: Option<String>,
        options: Option<ConnectOptions>,
    }

    impl FakeDiscovery {
        fn returning(outcome: Result<Vec<Registration>, DiscoveryError>) -> Self {
            Self {
                defaults: vec![PathBuf::from("/usr/lib/oi")],
                outcome: Some(outcome),
                scanned: Vec::new(),
                extension_point: None,
                options: None,
            }
        }
    }

    impl Discovery for FakeDiscovery {
        fn default_paths(&self) -> Vec<PathBuf> {
            self.defaults.clone()
        }

        fn scan(&mut self, paths: &[PathBuf]) {
            self.scanned = paths.to_vec();
        }

        fn connect(&mut self, extension_point: &str, options: ConnectOptions, callback: ConnectCallback<'_>) {
            self.extension_point = Some(extension_point.to_string());
            self.options = Some(options);
            if let Some(outcome) = self.outcome.take() {
                callback(outcome);
            }
        }
    }

    fn registration(name: &str, command: &str) -> Registration {
        Registration {
            name: name.to_string(),
            path: PathBuf::from(format!("/plugins/{}", name)),
            export: json!(command),
        }
    }

    fn load<D: Discovery>(scanner: &mut PluginScanner<D>) -> (usize, Result<Vec<ModuleConfig>, DiscoveryError>) {
        let calls = Cell::new(0);
        let mut outcome = None;
        scanner.load_plugins(|result| {
            calls.set(calls.get() + 1);
            outcome = Some(result);
        });
        (calls.get(), outcome.unwrap())
    }

    #[test]
    fn scalar_path_is_coerced_to_list() {
        let paths: SearchPaths = "/x".into();
        assert_eq!(paths.as_slice(), &[PathBuf::from("/x")]);
    }

    #[test]
    fn vendor_expansion_is_flat() {
        let expanded = expand_vendor_dirs(&[PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(
            expanded,
            vec![
                PathBuf::from("/a"),
                PathBuf::from("/a/@oi"),
                PathBuf::from("/b"),
                PathBuf::from("/b/@oi"),
            ]
        );
    }

    #[test]
    fn search_paths_include_defaults_extras_and_vendor_dirs() {
        let scanner = PluginScanner::with_discovery(vec!["/x"], FakeDiscovery::returning(Ok(vec![])));
        let paths = scanner.search_paths();

        for expected in ["/usr/lib/oi", "/usr/lib/oi/@oi", "/x", "/x/@oi"] {
            assert!(paths.contains(&PathBuf::from(expected)), "missing {}", expected);
        }
    }

    #[test]
    fn scan_uses_search_paths_and_extension_point() {
        let mut scanner = PluginScanner::with_discovery("/x", FakeDiscovery::returning(Ok(vec![])));
        let expected = scanner.search_paths();

        let (calls, outcome) = load(&mut scanner);

        assert_eq!(calls, 1);
        assert!(outcome.unwrap().is_empty());
        assert_eq!(scanner.discovery.scanned, expected);
        assert_eq!(scanner.discovery.extension_point.as_deref(), Some(EXTENSION_POINT));
        assert_eq!(scanner.discovery.options, Some(ConnectOptions { multi: true }));
    }

    #[test]
    fn zero_matches_yield_empty_list() {
        let mut scanner = PluginScanner::with_discovery(SearchPaths::default(), FakeDiscovery::returning(Ok(vec![])));

        let (calls, outcome) = load(&mut scanner);

        assert_eq!(calls, 1);
        assert!(outcome.unwrap().is_empty());
        assert!(scanner.plugins().is_empty());
    }

    #[test]
    fn matches_are_plugged_in_order() {
        let mut scanner = PluginScanner::with_discovery(
            SearchPaths::default(),
            FakeDiscovery::returning(Ok(vec![registration("oi-p1", "one"), registration("oi-p2", "two")])),
        );

        let (calls, outcome) = load(&mut scanner);
        let modules = outcome.unwrap();

        assert_eq!(calls, 1);
        let commands: Vec<_> = modules.iter().map(|m| m.command()).collect();
        assert_eq!(commands, vec!["one", "two"]);
        assert_eq!(scanner.module_ids(), &["one".to_string(), "two".to_string()]);
        assert_eq!(scanner.plugins().len(), 2);
    }

    #[test]
    fn custom_plug_is_applied_to_each_export() {
        let mut scanner = PluginScanner::with_discovery(
            SearchPaths::default(),
            FakeDiscovery::returning(Ok(vec![registration("oi-p1", "one"), registration("oi-p2", "two")])),
        )
        .with_plug(|registration| {
            Ok(ModuleConfig::handler(registration.name.clone(), task(|_| Ok(Value::Null))))
        });

        let (_, outcome) = load(&mut scanner);
        let commands: Vec<_> = outcome
            .unwrap()
            .into_iter()
            .map(|config| Module::new(config).unwrap().command().to_string())
            .collect();

        assert_eq!(commands, vec!["oi-p1", "oi-p2"]);
    }

    #[test]
    fn discovery_error_short_circuits() {
        let error = DiscoveryError::Export {
            plugin: "oi-bad".to_string(),
            message: "nope".to_string(),
        };
        let mut scanner = PluginScanner::with_discovery(SearchPaths::default(), FakeDiscovery::returning(Err(error)));

        let (calls, outcome) = load(&mut scanner);

        assert_eq!(calls, 1);
        assert!(outcome.is_err());
        assert!(scanner.module_ids().is_empty());
    }

    #[test]
    fn conversion_error_is_reported_through_callback() {
        let mut scanner = PluginScanner::with_discovery(
            SearchPaths::default(),
            FakeDiscovery::returning(Ok(vec![Registration {
                name: "oi-odd".to_string(),
                path: PathBuf::from("/plugins/oi-odd"),
                export: json!([1, 2]),
            }])),
        );

        let (calls, outcome) = load(&mut scanner);

        assert_eq!(calls, 1);
        assert!(matches!(outcome, Err(DiscoveryError::Export { .. })));
    }
}
