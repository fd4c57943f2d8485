//! Multi-file configuration loading.

use std::hash::Hash;
use std::path::Path;

use indexmap::IndexMap;

use crate::config::{ConfigPath, interpolate, is_yaml_file};
use crate::error::ConfigError;

/// Configs that can be assembled from several YAML files.
pub trait Mergeable: Sized + Default {
    /// Parse one (already interpolated) YAML document.
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError>;

    /// Fold `other` into `self`.
    fn merge(&mut self, other: Self) -> Result<(), ConfigError>;
}

/// Move every component of `other` into `target`, refusing duplicate keys.
pub fn merge_components<K, V>(
    target: &mut IndexMap<K, V>,
    other: IndexMap<K, V>,
) -> Result<(), ConfigError>
where
    K: Eq + Hash + std::fmt::Display,
{
    let duplicates: Vec<String> = other
        .keys()
        .filter(|key| target.contains_key(*key))
        .map(|key| key.to_string())
        .collect();

    if !duplicates.is_empty() {
        return Err(ConfigError::DuplicateComponents { keys: duplicates });
    }

    target.extend(other);
    Ok(())
}

/// Load and merge every config file named by `paths`.
///
/// Errors from all files are collected so they can be reported together.
pub fn load_from_paths<C: Mergeable>(paths: &[ConfigPath]) -> Result<C, ConfigError> {
    let mut config = C::default();
    let mut errors = Vec::new();

    for path in paths {
        let (location, loaded) = match path {
            ConfigPath::File(file) => (file, load_file::<C>(file)),
            ConfigPath::Dir(dir) => (dir, load_dir::<C>(dir)),
        };
        match loaded.and_then(|partial| config.merge(partial)) {
            Ok(()) => {}
            Err(e) => errors.push(format!("{}: {}", location.display(), e)),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(config)
}

/// Load a single YAML file with environment interpolation.
pub fn load_file<C: Mergeable>(path: &Path) -> Result<C, ConfigError> {
    if !is_yaml_file(path) {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents =
        std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { source })?;

    C::parse_yaml(&interpolate(&contents)?)
}

fn load_dir<C: Mergeable>(dir: &Path) -> Result<C, ConfigError> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| ConfigError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_yaml_file(path))
        .collect();
    files.sort();

    let mut config = C::default();
    for path in files {
        config.merge(load_file::<C>(&path)?)?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        items: IndexMap<String, u32>,
    }

    impl Mergeable for TestConfig {
        fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
            serde_yaml::from_str(contents).map_err(|source| ConfigError::YamlParse { source })
        }

        fn merge(&mut self, other: Self) -> Result<(), ConfigError> {
            merge_components(&mut self.items, other.items)
        }
    }

    #[test]
    fn test_load_dir_merges_files_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "items:\n  second: 2\n").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "items:\n  first: 1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let config: TestConfig =
            load_from_paths(&[ConfigPath::Dir(dir.path().to_path_buf())]).unwrap();

        let keys: Vec<_> = config.items.keys().cloned().collect();
        assert_eq!(keys, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yaml");
        let b = dir.path().join("b.yaml");
        std::fs::write(&a, "items:\n  sales: 1\n").unwrap();
        std::fs::write(&b, "items:\n  sales: 2\n").unwrap();

        let err = load_from_paths::<TestConfig>(&[ConfigPath::File(a), ConfigPath::File(b)])
            .unwrap_err();
        assert!(err.to_string().contains("sales"));
    }

    #[test]
    fn test_non_yaml_rejected() {
        let err = load_file::<TestConfig>(Path::new("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }
}
