//! Report template engine
//!
//! A [`ReportEngine`] owns a lazily built handlebars registry. The registry
//! is built at most once per engine: concurrent first callers block on the
//! same initialisation and a failed build is remembered, so every later
//! render on that engine reports the same error. Constructing a new engine
//! is the only way to retry.

pub mod cidr;
pub mod helpers;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use handlebars::Handlebars;
use serde::Serialize;
use tracing::info;

use crate::support::errors::{ReportError, TemplateError};

/// File suffix of template sources. The name of a template is its file name
/// without this suffix.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// Where template sources come from.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    /// Every `*.tmpl` file directly inside the directory.
    Directory(PathBuf),
    /// Named template sources held in memory.
    Inline(Vec<(String, String)>),
}

impl TemplateSource {
    pub fn inline<N, S>(templates: impl IntoIterator<Item = (N, S)>) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        Self::Inline(
            templates
                .into_iter()
                .map(|(n, s)| (n.into(), s.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Treat references to missing fields as render errors.
    pub strict: bool,
    /// Maximum nesting of `include`. `None` leaves recursion unbounded.
    pub max_include_depth: Option<usize>,
}

pub struct ReportEngine {
    source: TemplateSource,
    options: EngineOptions,
    registry: OnceLock<Result<Handlebars<'static>, String>>,
}

impl ReportEngine {
    pub fn new(source: TemplateSource, options: EngineOptions) -> Self {
        Self {
            source,
            options,
            registry: OnceLock::new(),
        }
    }

    /// Returns the registry, building it on first use.
    pub fn registry(&self) -> Result<&Handlebars<'static>, ReportError> {
        self.registry
            .get_or_init(|| build_registry(&self.source, &self.options).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| ReportError::Initialization(e.clone()))
    }

    /// Whether initialisation already ran (successfully or not).
    pub fn is_initialized(&self) -> bool {
        self.registry.get().is_some()
    }

    /// Render the template `name` against `data`.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, ReportError> {
        self.registry()?
            .render(name, data)
            .map_err(|source| ReportError::Render {
                name: name.to_string(),
                source,
            })
    }

    /// Names of the registered templates, sorted.
    pub fn template_names(&self) -> Result<Vec<String>, ReportError> {
        let mut names: Vec<String> = self.registry()?.get_templates().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn build_registry(
    source: &TemplateSource,
    options: &EngineOptions,
) -> Result<Handlebars<'static>, TemplateError> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.set_strict_mode(options.strict);
    helpers::register(&mut registry, options.max_include_depth);

    match source {
        TemplateSource::Directory(dir) => {
            for (name, path) in discover(dir)? {
                info!(target: "mops::templates", file = %path.display(), "found");
                let text = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                    path: path.clone(),
                    source,
                })?;
                registry.register_template_string(&name, text)?;
            }
        }
        TemplateSource::Inline(templates) => {
            for (name, text) in templates {
                registry.register_template_string(name, text)?;
            }
        }
    }

    Ok(registry)
}

/// Lists `(name, path)` of the template files in `dir`, sorted by name.
fn discover(dir: &Path) -> Result<Vec<(String, PathBuf)>, TemplateError> {
    let io_err = |source| TemplateError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(TEMPLATE_SUFFIX))
        else {
            continue;
        };
        if !name.is_empty() {
            found.push((name.to_string(), path.clone()));
        }
    }

    if found.is_empty() {
        return Err(TemplateError::NoTemplates(dir.to_path_buf()));
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mops-templates-{}-{tag}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_render_inline() {
        let engine = ReportEngine::new(
            TemplateSource::inline([("hello", "hello {{name}}")]),
            EngineOptions::default(),
        );
        assert!(!engine.is_initialized());
        assert_eq!(engine.render("hello", &json!({ "name": "z1" })).unwrap(), "hello z1");
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_missing_template_names_it() {
        let engine = ReportEngine::new(TemplateSource::inline([("a", "a")]), EngineOptions::default());
        let err = engine.render("missing", &json!({})).unwrap_err();
        assert!(matches!(err, ReportError::Render { ref name, .. } if name == "missing"));
        assert!(err.to_string().contains("\"missing\""));
    }

    #[test]
    fn test_parse_error_is_sticky() {
        let engine = ReportEngine::new(
            TemplateSource::inline([("bad", "{{#each x}}unclosed")]),
            EngineOptions::default(),
        );
        let first = engine.render("bad", &json!({})).unwrap_err();
        let second = engine.render("bad", &json!({})).unwrap_err();
        assert!(matches!(first, ReportError::Initialization(_)));
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_directory_source() {
        let dir = scratch_dir("dir");
        std::fs::write(dir.join("summary.tmpl"), "zones: {{include \"count\" this}}").unwrap();
        std::fs::write(dir.join("count.tmpl"), "{{len zones}}").unwrap();
        std::fs::write(dir.join("README.md"), "not a template").unwrap();

        let engine = ReportEngine::new(TemplateSource::Directory(dir.clone()), EngineOptions::default());
        assert_eq!(engine.template_names().unwrap(), vec!["count", "summary"]);
        assert_eq!(
            engine.render("summary", &json!({ "zones": [1, 2, 3] })).unwrap(),
            "zones: 3"
        );

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_empty_directory_fails() {
        let dir = scratch_dir("empty");
        let engine = ReportEngine::new(TemplateSource::Directory(dir.clone()), EngineOptions::default());
        let err = engine.registry().unwrap_err();
        assert!(err.to_string().contains("no *.tmpl templates"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_strict_mode() {
        let engine = ReportEngine::new(
            TemplateSource::inline([("t", "{{missing_field}}")]),
            EngineOptions {
                strict: true,
                ..Default::default()
            },
        );
        assert!(engine.render("t", &json!({})).is_err());
    }

    #[test]
    fn test_concurrent_first_use_initializes_once() {
        let engine = Arc::new(ReportEngine::new(
            TemplateSource::inline([("t", "{{v}}")]),
            EngineOptions::default(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.render("t", &json!({ "v": i })).unwrap())
            })
            .collect();

        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), i.to_string());
        }

        let first = engine.registry().unwrap() as *const _;
        let second = engine.registry().unwrap() as *const _;
        assert_eq!(first, second);
    }
}
