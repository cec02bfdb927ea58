//! File-backed text, script and document content
//!
//! Many nodes carry a pair of fields: an inline value and a file reference
//! (`buildExpression` / `buildExpressionFile`). The inline value wins; only
//! when it is empty is the file read, passed through the script transform
//! and stored inline. File contents are cached per run by path.

use base64::Engine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ExchangeError, Result};

/// Source of file contents referenced from a document.
pub trait FileProvider: Send + Sync {
    fn read_text(&self, path: &str) -> Result<String>;

    /// Binary content, base64 encoded.
    fn read_binary(&self, path: &str) -> Result<String>;
}

/// Reads files relative to a root directory (usually the document's own).
pub struct FsFileProvider {
    root: PathBuf,
}

impl FsFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let full = self.root.join(Path::new(path));
        if !full.exists() {
            return Err(ExchangeError::File {
                path: full.display().to_string(),
                message: "file not found".to_string(),
                source: None,
            });
        }
        Ok(full)
    }
}

impl FileProvider for FsFileProvider {
    fn read_text(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        std::fs::read_to_string(&full).map_err(|e| ExchangeError::File {
            path: full.display().to_string(),
            message: "read failed".to_string(),
            source: Some(e),
        })
    }

    fn read_binary(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        let data = std::fs::read(&full).map_err(|e| ExchangeError::File {
            path: full.display().to_string(),
            message: "read failed".to_string(),
            source: Some(e),
        })?;
        Ok(base64::engine::general_purpose::STANDARD.encode(data))
    }
}

/// Entity kinds owning executable expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Case,
    CaseRelation,
    Collector,
    WageType,
    Payrun,
    Report,
}

/// Turns expression source text into the stored expression body.
pub trait ScriptTransform: Send + Sync {
    /// `keys` identify the owning object (e.g. case name, wage type number).
    fn transform(&self, kind: ScriptKind, tenant: &str, source: &str, keys: &[&str]) -> Result<String>;
}

/// Stores expression source unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl ScriptTransform for IdentityTransform {
    fn transform(&self, _kind: ScriptKind, _tenant: &str, source: &str, _keys: &[&str]) -> Result<String> {
        Ok(source.to_string())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::is_empty).unwrap_or(true)
}

/// Loads file-backed fields into their inline counterparts.
///
/// One instance serves exactly one import or inlining run.
pub struct TextResolver {
    files: Arc<dyn FileProvider>,
    transform: Arc<dyn ScriptTransform>,
    clear_file_references: bool,
    texts: HashMap<String, String>,
    binaries: HashMap<String, String>,
}

impl TextResolver {
    pub fn new(
        files: Arc<dyn FileProvider>,
        transform: Arc<dyn ScriptTransform>,
        clear_file_references: bool,
    ) -> Self {
        Self {
            files,
            transform,
            clear_file_references,
            texts: HashMap::new(),
            binaries: HashMap::new(),
        }
    }

    /// Read a text file, at most once per path.
    pub fn read(&mut self, path: &str) -> Result<String> {
        if let Some(text) = self.texts.get(path) {
            return Ok(text.clone());
        }
        let text = self.files.read_text(path)?;
        self.texts.insert(path.to_string(), text.clone());
        Ok(text)
    }

    fn read_binary(&mut self, path: &str) -> Result<String> {
        if let Some(data) = self.binaries.get(path) {
            return Ok(data.clone());
        }
        let data = self.files.read_binary(path)?;
        self.binaries.insert(path.to_string(), data.clone());
        Ok(data)
    }

    /// Resolve a plain text pair (script source, template content).
    pub fn resolve_text(
        &mut self,
        owner: &str,
        value: &mut Option<String>,
        file: &mut Option<String>,
    ) -> Result<()> {
        self.resolve_with(owner, value, file, |_, source| Ok(source.to_string()))
    }

    /// Resolve an expression pair through the script transform.
    pub fn resolve_expression(
        &mut self,
        owner: &str,
        kind: ScriptKind,
        tenant: &str,
        keys: &[&str],
        value: &mut Option<String>,
        file: &mut Option<String>,
    ) -> Result<()> {
        let transform = self.transform.clone();
        self.resolve_with(owner, value, file, |_, source| {
            transform.transform(kind, tenant, source, keys)
        })
    }

    /// Resolve binary document content (base64).
    pub fn resolve_binary(
        &mut self,
        owner: &str,
        content: &mut Option<String>,
        file: &mut Option<String>,
    ) -> Result<()> {
        if !is_blank(content) {
            return Ok(());
        }
        let Some(path) = file.clone().filter(|path| !path.is_empty()) else {
            return Ok(());
        };
        let data = self.read_binary(&path)?;
        if data.is_empty() {
            return Err(ExchangeError::MissingScript {
                owner: owner.to_string(),
                path,
            });
        }
        *content = Some(data);
        if self.clear_file_references {
            *file = None;
        }
        Ok(())
    }

    fn resolve_with(
        &mut self,
        owner: &str,
        value: &mut Option<String>,
        file: &mut Option<String>,
        build: impl FnOnce(&str, &str) -> Result<String>,
    ) -> Result<()> {
        if !is_blank(value) {
            return Ok(());
        }
        let Some(path) = file.clone().filter(|path| !path.is_empty()) else {
            return Ok(());
        };
        let source = self.read(&path)?;
        let built = build(&path, &source)?;
        if built.is_empty() {
            return Err(ExchangeError::MissingScript {
                owner: owner.to_string(),
                path,
            });
        }
        *value = Some(built);
        if self.clear_file_references {
            *file = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves fixed contents and counts reads.
    struct CountingProvider {
        reads: Mutex<Vec<String>>,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                reads: Mutex::new(Vec::new()),
            }
        }
    }

    impl FileProvider for CountingProvider {
        fn read_text(&self, path: &str) -> Result<String> {
            self.reads.lock().unwrap().push(path.to_string());
            if path == "empty.cs" {
                Ok(String::new())
            } else {
                Ok(format!("source of {}", path))
            }
        }

        fn read_binary(&self, path: &str) -> Result<String> {
            self.reads.lock().unwrap().push(path.to_string());
            Ok("AAEC".to_string())
        }
    }

    struct UpperTransform;

    impl ScriptTransform for UpperTransform {
        fn transform(&self, _kind: ScriptKind, tenant: &str, source: &str, keys: &[&str]) -> Result<String> {
            Ok(format!("{}:{}:{}", tenant, keys.join("."), source.to_uppercase()))
        }
    }

    #[test]
    fn test_inline_value_wins_over_file() {
        let provider = Arc::new(CountingProvider::new());
        let mut resolver = TextResolver::new(provider.clone(), Arc::new(IdentityTransform), true);
        let mut value = Some("X".to_string());
        let mut file = Some("path".to_string());
        resolver
            .resolve_expression("case", ScriptKind::Case, "ACME", &[], &mut value, &mut file)
            .unwrap();
        assert_eq!(value.as_deref(), Some("X"));
        assert_eq!(file.as_deref(), Some("path"));
        assert!(provider.reads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_file_is_read_once_and_transformed() {
        let provider = Arc::new(CountingProvider::new());
        let mut resolver = TextResolver::new(provider.clone(), Arc::new(UpperTransform), false);

        for _ in 0..2 {
            let mut value = None;
            let mut file = Some("wage.cs".to_string());
            resolver
                .resolve_expression("wage type", ScriptKind::WageType, "ACME", &["100"], &mut value, &mut file)
                .unwrap();
            assert_eq!(value.as_deref(), Some("ACME:100:SOURCE OF WAGE.CS"));
            assert_eq!(file.as_deref(), Some("wage.cs"));
        }
        assert_eq!(provider.reads.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_result_is_an_error() {
        let mut resolver = TextResolver::new(
            Arc::new(CountingProvider::new()),
            Arc::new(IdentityTransform),
            true,
        );
        let mut value = Some(String::new());
        let mut file = Some("empty.cs".to_string());
        let result = resolver.resolve_text("script", &mut value, &mut file);
        assert!(matches!(result, Err(ExchangeError::MissingScript { .. })));
    }

    #[test]
    fn test_clear_file_reference_after_load() {
        let mut resolver = TextResolver::new(
            Arc::new(CountingProvider::new()),
            Arc::new(IdentityTransform),
            true,
        );
        let mut content = None;
        let mut file = Some("doc.pdf".to_string());
        resolver.resolve_binary("document", &mut content, &mut file).unwrap();
        assert_eq!(content.as_deref(), Some("AAEC"));
        assert!(file.is_none());
    }

    #[test]
    fn test_fs_provider_reads_relative_to_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("scripts")).unwrap();
        std::fs::write(tmp.path().join("scripts/rule.cs"), "return 1;").unwrap();
        std::fs::write(tmp.path().join("logo.bin"), [0u8, 1, 2]).unwrap();

        let provider = FsFileProvider::new(tmp.path());
        assert_eq!(provider.read_text("scripts/rule.cs").unwrap(), "return 1;");
        assert_eq!(provider.read_binary("logo.bin").unwrap(), "AAEC");
        assert!(matches!(
            provider.read_text("missing.cs"),
            Err(ExchangeError::File { .. })
        ));
    }
}
