use std::path::PathBuf;

use crate::pipeline::ResourceResolver;

/// Resolves a class name to a source file below a root directory.
///
/// `com.acme.Foo` is looked up as `com/acme/Foo.<ext>` for each configured
/// extension in turn. The resource is the matching path relative to the
/// root, `/`-separated.
#[derive(Debug, Clone)]
pub struct SourceTreeResolver {
    root: PathBuf,
    extensions: Vec<String>,
}

impl SourceTreeResolver {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            root: root.into(),
            extensions,
        }
    }
}

impl ResourceResolver for SourceTreeResolver {
    type Resource = String;

    fn resolve(&self, class_key: &str) -> Option<String> {
        if class_key.contains(['/', '\\']) || class_key.split('.').any(str::is_empty) {
            return None;
        }
        let stem = class_key.replace('.', "/");
        self.extensions
            .iter()
            .map(|ext| format!("{stem}.{ext}"))
            .find(|relative| self.root.join(relative).is_file())
    }
}
