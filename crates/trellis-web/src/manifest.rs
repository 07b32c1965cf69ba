use serde::Deserialize;
use serde_json::{Map, Value};
use trellis_core::{ComponentKind, ComponentLoader, ComposeError, Node, Store};

/// Declarative page description, usually read from an app's `page.json`:
/// the root node spec plus the initial store contents.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageManifest {
    pub root: NodeSpec,
    #[serde(default)]
    pub store: Map<String, Value>,
}

/// One node of the page tree. Either `component` (with an optional `kind`,
/// defaulting to plain html) or `name` must be present; `usage` overrides a
/// loaded component's declared usage; `present` delegates rendering to
/// another spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub kind: Option<ComponentKind>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub usage: Option<Vec<String>>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
    #[serde(default)]
    pub present: Option<Box<NodeSpec>>,
}

impl PageManifest {
    pub fn parse(source: &str) -> Result<Self, String> {
        serde_json::from_str(source).map_err(|e| format!("failed to parse page manifest: {e}"))
    }

    /// Builds a fresh tree and store. Component resources are loaded here,
    /// once per build, so every request sees the files as they currently
    /// are on disk.
    pub fn build(&self, loader: &ComponentLoader) -> Result<(Node, Store), String> {
        let root = build_node(&self.root, loader).map_err(|e| e.message)?;
        let mut store = Store::new();
        store.set(self.store.clone());
        Ok((root, store))
    }
}

fn build_node(spec: &NodeSpec, loader: &ComponentLoader) -> Result<Node, ComposeError> {
    let mut node = if let Some(bundle_id) = &spec.component {
        let kind = spec.kind.unwrap_or(ComponentKind::Html);
        let component = loader.load(kind, bundle_id)?;
        let mut node = Node::from_component(component, spec.usage.clone());
        if let Some(name) = &spec.name {
            node.name = name.clone();
        }
        if spec.template.is_some() {
            node.template = spec.template.clone();
        }
        node
    } else {
        let name = spec.name.as_deref().ok_or_else(|| {
            ComposeError::manifest("node spec needs either a component or a name")
        })?;
        let mut node = Node::new(name);
        node.template = spec.template.clone();
        node.usage = spec.usage.clone().unwrap_or_default();
        node
    };

    for child in &spec.children {
        node.add_child(build_node(child, loader)?);
    }
    if let Some(present) = &spec.present {
        node.present(build_node(present, loader)?);
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), ts));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    fn write_bundle_file(root: &Path, bundle_id: &str, filename: &str, content: &str) {
        let dir = root.join(bundle_id);
        fs::create_dir_all(&dir).expect("failed to create bundle dir");
        fs::write(dir.join(filename), content).expect("failed to write bundle file");
    }

    #[test]
    fn test_template_only_manifest_builds_and_renders() {
        let manifest = PageManifest::parse(
            r#"{
                "root": {
                    "name": "root",
                    "template": "<greeting/>",
                    "children": [
                        {"name": "greeting", "template": "hello"}
                    ]
                },
                "store": {"appName": "Trellis App"}
            }"#,
        )
        .expect("manifest must parse");

        let loader = ComponentLoader::new(std::env::temp_dir());
        let (root, store) = manifest.build(&loader).expect("build must succeed");

        assert_eq!(root.render().expect("render must succeed").html, "hello");
        assert_eq!(
            store.get_value("appName").and_then(|v| v.as_str()),
            Some("Trellis App")
        );
    }

    #[test]
    fn test_presentable_wiring_preserves_root_usage() {
        let manifest = PageManifest::parse(
            r#"{
                "root": {
                    "name": "root",
                    "usage": ["appName"],
                    "present": {"name": "page", "template": "presented"}
                }
            }"#,
        )
        .expect("manifest must parse");

        let loader = ComponentLoader::new(std::env::temp_dir());
        let (root, _) = manifest.build(&loader).expect("build must succeed");

        assert_eq!(root.usage, vec!["appName"]);
        assert_eq!(root.render().expect("render must succeed").html, "presented");
    }

    #[test]
    fn test_component_nodes_load_through_the_loader() {
        let root_dir = unique_temp_dir("trellis-manifest");
        write_bundle_file(
            &root_dir,
            "com.app.message",
            trellis_core::SCRIPT_ENTRYPOINT_FILENAME,
            "// using (message)\n(el, store) => {}",
        );

        let manifest = PageManifest::parse(
            r#"{
                "root": {
                    "name": "root",
                    "template": "<com.app.message/>",
                    "children": [
                        {"component": "com.app.message", "kind": "javascript"}
                    ]
                }
            }"#,
        )
        .expect("manifest must parse");

        let loader = ComponentLoader::new(&root_dir);
        let (root, _) = manifest.build(&loader).expect("build must succeed");
        let artifact = root.render().expect("render must succeed");

        assert!(artifact.html.contains("instance--com.app.message"));
        assert_eq!(artifact.javascript.len(), 1);
        assert_eq!(root.children()[0].usage, vec!["message"]);

        let _ = fs::remove_dir_all(&root_dir);
    }

    #[test]
    fn test_usage_override_in_manifest() {
        let root_dir = unique_temp_dir("trellis-manifest-usage");
        write_bundle_file(
            &root_dir,
            "widget",
            trellis_core::SCRIPT_ENTRYPOINT_FILENAME,
            "// using (declared)\ncode",
        );

        let manifest = PageManifest::parse(
            r#"{
                "root": {
                    "component": "widget",
                    "kind": "javascript",
                    "usage": ["overridden"]
                }
            }"#,
        )
        .expect("manifest must parse");

        let loader = ComponentLoader::new(&root_dir);
        let (root, _) = manifest.build(&loader).expect("build must succeed");
        assert_eq!(root.usage, vec!["overridden"]);

        let _ = fs::remove_dir_all(&root_dir);
    }

    #[test]
    fn test_nameless_componentless_spec_fails() {
        let manifest = PageManifest::parse(r#"{"root": {"template": "x"}}"#)
            .expect("manifest must parse");
        let loader = ComponentLoader::new(std::env::temp_dir());
        let err = manifest
            .build(&loader)
            .expect_err("spec without name or component must fail");
        assert!(err.contains("component or a name"));
    }

    #[test]
    fn test_missing_entrypoint_fails_build() {
        let manifest = PageManifest::parse(
            r#"{"root": {"component": "ghost", "kind": "styledJavascript"}}"#,
        )
        .expect("manifest must parse");
        let loader = ComponentLoader::new(unique_temp_dir("trellis-manifest-ghost"));
        let err = manifest
            .build(&loader)
            .expect_err("missing entrypoint must fail");
        assert!(err.contains("ghost"));
    }
}
