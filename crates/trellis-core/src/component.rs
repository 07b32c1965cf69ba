use crate::error::ComposeError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const HTML_TEMPLATE_FILENAME: &str = "index.html";
pub const SCRIPT_ENTRYPOINT_FILENAME: &str = "index.js";
pub const STYLESHEET_FILENAME: &str = "styles.css";

/// Which resources a component bundle is expected to provide. The kind only
/// steers loading; after that, behavior follows from which fields are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Html,
    StyledHtml,
    Javascript,
    StyledJavascript,
    Css,
}

impl ComponentKind {
    pub fn is_scripted(self) -> bool {
        matches!(self, Self::Javascript | Self::StyledJavascript)
    }

    pub fn is_styled(self) -> bool {
        matches!(self, Self::StyledHtml | Self::StyledJavascript | Self::Css)
    }

    pub fn has_markup(self) -> bool {
        matches!(self, Self::Html | Self::StyledHtml)
    }
}

/// A named, loaded bundle of markup, script and/or style. `name` doubles as
/// the tree-lookup key and the client-side instance marker.
#[derive(Debug, Clone, Default)]
pub struct Component {
    pub name: String,
    pub bundle_path: Option<PathBuf>,
    pub template: Option<String>,
    pub script: Option<String>,
    pub stylesheet: Option<String>,
    /// Store keys the component's script declares it reads.
    pub usage: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResourceFile {
    pub bundle_path: PathBuf,
    pub content: String,
}

/// Resolves component resources under a configured directory. The directory
/// is explicit per loader; nothing here is process-global.
#[derive(Debug, Clone)]
pub struct ComponentLoader {
    components_dir: PathBuf,
}

impl ComponentLoader {
    pub fn new(components_dir: impl Into<PathBuf>) -> Self {
        Self {
            components_dir: components_dir.into(),
        }
    }

    pub fn components_dir(&self) -> &Path {
        &self.components_dir
    }

    /// One resource lookup per (bundle id, filename) pair. `None` when the
    /// file does not exist or cannot be read as text.
    pub fn load_resource(&self, bundle_id: &str, filename: &str) -> Option<ResourceFile> {
        let bundle_path = self.components_dir.join(bundle_id);
        let path = bundle_path.join(filename);
        if !path.is_file() {
            return None;
        }
        let content = fs::read_to_string(&path).ok()?;
        Some(ResourceFile {
            bundle_path,
            content,
        })
    }

    /// Loads the resources the kind calls for. A scripted component without
    /// an entrypoint is an error; absent markup or style just leaves the
    /// field unset.
    pub fn load(&self, kind: ComponentKind, bundle_id: &str) -> Result<Component, ComposeError> {
        let mut component = Component {
            name: bundle_id.to_string(),
            ..Default::default()
        };

        if kind.has_markup() {
            if let Some(found) = self.load_resource(bundle_id, HTML_TEMPLATE_FILENAME) {
                component.bundle_path = Some(found.bundle_path);
                component.template = Some(found.content);
            }
        }

        if kind.is_scripted() {
            let found = self
                .load_resource(bundle_id, SCRIPT_ENTRYPOINT_FILENAME)
                .ok_or_else(|| {
                    ComposeError::load(format!("component entrypoint not found: {bundle_id}"))
                })?;
            component.usage = extract_store_usage(&found.content);
            component.bundle_path = Some(found.bundle_path);
            component.script = Some(found.content);
        }

        if kind.is_styled() {
            if let Some(found) = self.load_resource(bundle_id, STYLESHEET_FILENAME) {
                component.bundle_path = Some(found.bundle_path);
                component.stylesheet = Some(found.content);
            }
        }

        Ok(component)
    }
}

/// Parses the first `// using (a, b, c)` comment out of a script source.
/// Names are comma-separated and whitespace-trimmed; a malformed list is
/// skipped and the scan continues with the next comment. No comment means
/// no declared usage.
pub fn extract_store_usage(code: &str) -> Vec<String> {
    let mut rest = code;
    while let Some(pos) = rest.find("//") {
        rest = &rest[pos + 2..];
        if let Some(names) = parse_usage_list(rest) {
            return names;
        }
    }
    Vec::new()
}

fn parse_usage_list(after_slashes: &str) -> Option<Vec<String>> {
    let s = after_slashes.trim_start();
    let s = s.strip_prefix("using")?;
    let s = s.trim_start();
    let s = s.strip_prefix('(')?;
    let end = s.find(')')?;
    let list = &s[..end];
    if !list
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == ',' || c.is_whitespace())
    {
        return None;
    }
    Some(
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
