use crate::content::ContentServer;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};
use std::collections::HashMap;
use trellis_core::{Node, Store};

/// Client-side bundle skeleton: declares the component registry, and after
/// all registrations invokes each component against every element tagged
/// with its instance marker, passing the serialized store projection.
pub const TRELLIS_RUNTIME_JS: &str = include_str!("runtime.js");

const STORE_MARKER: &str = "\"define store\";";
const COMPONENTS_MARKER: &str = "\"define components\";";

/// Turns a rendered node tree into final HTML: builds the client bundle,
/// parks bundle and stylesheet in the content server, and substitutes the
/// reserved `#[place scripts]` / `#[place styles]` markers with tags
/// pointing at the stored blobs.
#[derive(Debug, Default)]
pub struct TrellisEngine {
    content: ContentServer,
}

impl TrellisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: ContentServer) -> Self {
        Self { content }
    }

    /// Compiles a fully-constructed tree against a store. Not idempotent:
    /// every call allocates fresh content entries for the blobs it stores.
    pub fn compile(&mut self, root: &Node, store: &Store) -> Result<String, String> {
        let artifact = root.render().map_err(|e| e.message)?;

        // Only the root's declared usage crosses to the client; everything
        // else in the store stays server-side.
        let mut projection = Map::new();
        for key in &root.usage {
            if let Some(value) = store.get_value(key) {
                projection.insert(key.clone(), value.clone());
            }
        }

        let bundle = if artifact.javascript.is_empty() {
            None
        } else {
            Some(build_bundle(&artifact.javascript, &projection)?)
        };

        let mut html = String::with_capacity(artifact.html.len());
        let mut cursor = 0usize;
        for marker in place_marker_spans(&artifact.html) {
            html.push_str(&artifact.html[cursor..marker.start]);
            cursor = marker.end;

            match marker.name.as_str() {
                "scripts" => {
                    if let Some(bundle) = &bundle {
                        let key = self.content.store(bundle.clone(), "js");
                        html.push_str(&format!("<script src=\"/{key}\"></script>"));
                    }
                }
                "styles" => {
                    if !artifact.css.is_empty() {
                        let key = self.content.store(artifact.css.clone(), "css");
                        html.push_str(&format!(
                            "<link rel=\"stylesheet\" type=\"text/css\" href=\"/{key}\">"
                        ));
                    }
                }
                _ => {}
            }
        }
        html.push_str(&artifact.html[cursor..]);

        Ok(html)
    }

    /// Parks a blob in the content server and returns its generated key.
    pub fn store_content(&mut self, body: impl Into<String>, extension: &str) -> String {
        self.content.store(body, extension)
    }

    /// Exact-key content lookup; a miss means expired, already served, or
    /// never stored, and surfaces as `None` rather than an error.
    pub fn serve_content(&mut self, key: &str) -> Option<String> {
        self.content.serve(key)
    }
}

pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default() {
        "js" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn build_bundle(
    javascript: &HashMap<String, String>,
    projection: &Map<String, Value>,
) -> Result<String, String> {
    let store_json = serde_json::to_string(&Value::Object(projection.clone()))
        .map_err(|e| format!("failed to serialize store projection: {e}"))?;
    let store_definition = format!("const store = {store_json};");

    // Sources go through base64 so arbitrary script text cannot break out of
    // the registration statement.
    let registrations = javascript
        .iter()
        .map(|(name, source)| {
            format!(
                "window.components[\"{name}\"] = eval(atob(\"{}\"));",
                BASE64.encode(source.as_bytes())
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(TRELLIS_RUNTIME_JS
        .replacen(COMPONENTS_MARKER, &registrations, 1)
        .replacen(STORE_MARKER, &store_definition, 1))
}

struct PlaceMarker {
    start: usize,
    end: usize,
    name: String,
}

/// Collects `#[place name]` marker spans in one forward scan. Names are
/// lowercase letters and whitespace, matched exactly (no trimming); an
/// unterminated or empty marker is left as literal text.
fn place_marker_spans(html: &str) -> Vec<PlaceMarker> {
    const OPEN: &str = "#[place ";
    let mut out = Vec::new();
    let mut offset = 0usize;
    while let Some(found) = html[offset..].find(OPEN) {
        let start = offset + found;
        let name_start = start + OPEN.len();
        let rest = &html[name_start..];
        match rest.find(']') {
            Some(close)
                if close > 0
                    && rest[..close]
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_whitespace()) =>
            {
                out.push(PlaceMarker {
                    start,
                    end: name_start + close + 1,
                    name: rest[..close].to_string(),
                });
                offset = name_start + close + 1;
            }
            _ => {
                offset = name_start;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::Component;

    fn scripted_component(name: &str, code: &str) -> Component {
        Component {
            name: name.to_string(),
            script: Some(code.to_string()),
            ..Default::default()
        }
    }

    fn page_with_widget(usage: Vec<String>) -> Node {
        let mut root = Node::from_template(
            "root",
            "<html><head>#[place styles]</head><body><widget/>#[place scripts]</body></html>"
                .to_string(),
            usage,
        );
        let mut widget = scripted_component("widget", "// using (appName)\n(el, store) => {}");
        widget.stylesheet = Some(".widget {}".to_string());
        root.add_child(Node::from_component(widget, None));
        root
    }

    fn extract_key(html: &str, attr: &str) -> String {
        let start = html
            .find(&format!("{attr}=\"/"))
            .expect("expected a content url")
            + attr.len()
            + 3;
        let rest = &html[start..];
        let end = rest.find('"').expect("unterminated content url");
        rest[..end].to_string()
    }

    #[test]
    fn test_markers_are_always_fully_substituted() {
        let mut engine = TrellisEngine::new();
        let root = page_with_widget(Vec::new());
        let html = engine
            .compile(&root, &Store::new())
            .expect("compile must succeed");

        assert!(!html.contains("#[place"), "no marker may survive: {html}");
        assert!(html.contains("<script src=\"/"));
        assert!(html.contains("<link rel=\"stylesheet\""));
    }

    #[test]
    fn test_unknown_place_marker_collapses_to_empty() {
        let mut engine = TrellisEngine::new();
        let root = Node::from_template("root", "a#[place whatever]b".to_string(), Vec::new());
        let html = engine
            .compile(&root, &Store::new())
            .expect("compile must succeed");
        assert_eq!(html, "ab");
    }

    #[test]
    fn test_no_bundle_without_javascript() {
        let mut engine = TrellisEngine::new();
        let root = Node::from_template(
            "root",
            "<html>#[place scripts]#[place styles]</html>".to_string(),
            Vec::new(),
        );
        let html = engine
            .compile(&root, &Store::new())
            .expect("compile must succeed");
        assert_eq!(html, "<html></html>");
    }

    #[test]
    fn test_served_bundle_contains_registration_and_store() {
        let mut engine = TrellisEngine::new();
        let root = page_with_widget(vec!["appName".to_string()]);
        let mut store = Store::new();
        store.set_value("appName", json!("Trellis App"));

        let html = engine.compile(&root, &store).expect("compile must succeed");
        let key = extract_key(&html, "src");
        let bundle = engine.serve_content(&key).expect("bundle must be stored");

        assert!(bundle.contains("window.components = {};"));
        assert!(bundle.contains("window.components[\"widget\"]"));
        assert!(bundle.contains(&BASE64.encode("// using (appName)\n(el, store) => {}")));
        assert!(bundle.contains("const store = {\"appName\":\"Trellis App\"};"));
        assert!(!bundle.contains(STORE_MARKER));
        assert!(!bundle.contains(COMPONENTS_MARKER));
    }

    #[test]
    fn test_projection_excludes_undeclared_keys() {
        let mut engine = TrellisEngine::new();
        let root = page_with_widget(vec!["appName".to_string(), "message".to_string()]);
        let mut store = Store::new();
        store.set_value("appName", json!("X"));
        store.set_value("message", json!("Y"));
        store.set_value("secret", json!("Z"));

        let html = engine.compile(&root, &store).expect("compile must succeed");
        let bundle = engine
            .serve_content(&extract_key(&html, "src"))
            .expect("bundle must be stored");

        assert!(bundle.contains("\"appName\":\"X\""));
        assert!(bundle.contains("\"message\":\"Y\""));
        assert!(
            !bundle.contains("secret"),
            "keys outside the root's usage must never reach the client"
        );
    }

    #[test]
    fn test_served_css_matches_render_output() {
        let mut engine = TrellisEngine::new();
        let root = page_with_widget(Vec::new());
        let html = engine
            .compile(&root, &Store::new())
            .expect("compile must succeed");

        let css = engine
            .serve_content(&extract_key(&html, "href"))
            .expect("stylesheet must be stored");
        assert!(css.contains(".widget {}"));
    }

    #[test]
    fn test_compile_twice_stores_distinct_blobs() {
        let mut engine = TrellisEngine::new();
        let root = page_with_widget(Vec::new());
        let store = Store::new();

        let first = engine.compile(&root, &store).expect("compile must succeed");
        let second = engine.compile(&root, &store).expect("compile must succeed");
        assert_ne!(
            extract_key(&first, "src"),
            extract_key(&second, "src"),
            "each compile allocates fresh content entries"
        );
    }

    #[test]
    fn test_render_errors_surface_through_compile() {
        let mut engine = TrellisEngine::new();
        let root = Node::from_template("page", "<page/>".to_string(), Vec::new());
        let err = engine
            .compile(&root, &Store::new())
            .expect_err("self reference must fail compile");
        assert!(err.contains("cannot render itself"));
    }

    #[test]
    fn test_presented_root_keeps_own_projection() {
        let mut engine = TrellisEngine::new();
        let mut root = Node::new("root");
        root.usage = vec!["appName".to_string()];

        let mut page = Node::from_template(
            "page",
            "<body><widget/>#[place scripts]</body>".to_string(),
            Vec::new(),
        );
        page.add_child(Node::from_component(scripted_component("widget", "w"), None));
        root.present(page);

        let mut store = Store::new();
        store.set_value("appName", json!("X"));
        store.set_value("hidden", json!("Y"));

        let html = engine.compile(&root, &store).expect("compile must succeed");
        let bundle = engine
            .serve_content(&extract_key(&html, "src"))
            .expect("bundle must be stored");
        assert!(bundle.contains("\"appName\":\"X\""));
        assert!(!bundle.contains("hidden"));
    }

    #[test]
    fn test_content_type_for_extensions() {
        assert_eq!(
            content_type_for("abc.js"),
            "application/javascript; charset=utf-8"
        );
        assert_eq!(content_type_for("abc.css"), "text/css; charset=utf-8");
        assert_eq!(content_type_for("abc"), "application/octet-stream");
    }
}
