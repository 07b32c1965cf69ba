use crate::component::Component;
use crate::error::ComposeError;
use std::collections::HashMap;
use std::fmt;

/// The output of rendering a subtree: composite markup, concatenated style,
/// script sources keyed by node name, and the per-call record of child names
/// already rendered (used to emit each child's script/style once while its
/// markup may appear many times).
#[derive(Debug, Clone, Default)]
pub struct RenderArtifact {
    pub html: String,
    pub css: String,
    pub javascript: HashMap<String, String>,
    pub rendered: Vec<String>,
}

/// A unit of the composition tree. A node either wraps a component, wraps a
/// raw template string, or delegates fully to another node via `present`.
/// Children are exclusively owned; trees are built per request and discarded
/// with the response.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub usage: Vec<String>,
    pub component: Option<Component>,
    pub template: Option<String>,
    children: Vec<Node>,
    presentable: Option<Box<Node>>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: Vec::new(),
            component: None,
            template: None,
            children: Vec::new(),
            presentable: None,
        }
    }

    /// The node takes the component's name, and inherits the component's
    /// declared usage unless an explicit list overrides it.
    pub fn from_component(component: Component, usage: Option<Vec<String>>) -> Self {
        let mut node = Self::new(component.name.clone());
        node.usage = usage.unwrap_or_else(|| component.usage.clone());
        node.component = Some(component);
        node
    }

    pub fn from_template(name: impl Into<String>, template: String, usage: Vec<String>) -> Self {
        let mut node = Self::new(name);
        node.template = Some(template);
        node.usage = usage;
        node
    }

    pub fn add_child(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Delegates rendering of this node entirely to `node`. The node keeps
    /// its own name and usage, which still govern the compile-time store
    /// projection.
    pub fn present(&mut self, node: Node) {
        self.presentable = Some(Box::new(node));
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn presentable(&self) -> Option<&Node> {
        self.presentable.as_deref()
    }

    fn child_by_name(&self, name: &str) -> Option<&Node> {
        // first match wins; duplicate sibling names are a documented
        // limitation, not a supported feature
        self.children.iter().find(|child| child.name == name)
    }

    /// Renders the subtree rooted at this node.
    ///
    /// Component contributions come first: a scripted component registers
    /// its source under the node's name and emits a tagged container
    /// element, a styled component seeds the css, and a markup-bearing
    /// component's template overrides the node's own template string. The
    /// effective template is then scanned once for `<name/>` placeholders,
    /// which are substituted in a single pass:
    ///
    /// - a placeholder naming this node itself aborts the render;
    /// - a placeholder with no matching direct child vanishes silently;
    /// - a matched child is rendered recursively, its markup substituted at
    ///   every occurrence, its script/style merged only on first occurrence.
    pub fn render(&self) -> Result<RenderArtifact, ComposeError> {
        if let Some(presentable) = &self.presentable {
            return presentable.render();
        }

        let mut artifact = RenderArtifact::default();
        let mut template = self.template.as_deref();

        if let Some(component) = &self.component {
            if let Some(script) = &component.script {
                artifact
                    .javascript
                    .insert(self.name.clone(), script.clone());
                artifact.html = format!("<div class=\"instance--{}\"></div>", self.name);
            }
            if let Some(stylesheet) = &component.stylesheet {
                artifact.css = stylesheet.clone();
            }
            if let Some(markup) = &component.template {
                template = Some(markup);
            }
        }

        let Some(template) = template else {
            return Ok(artifact);
        };

        let mut html = String::with_capacity(template.len());
        let mut cursor = 0usize;
        for span in placeholder_spans(template) {
            html.push_str(&template[cursor..span.start]);
            cursor = span.end;

            if span.name == self.name {
                return Err(ComposeError::self_render(&self.name));
            }

            let Some(child) = self.child_by_name(&span.name) else {
                continue;
            };

            let child_artifact = child.render()?;
            if !artifact.rendered.iter().any(|name| name == &child.name) {
                artifact.javascript.extend(child_artifact.javascript);
                artifact.css.push('\n');
                artifact.css.push_str(&child_artifact.css);
            }
            artifact.rendered.push(child.name.clone());
            html.push_str(&child_artifact.html);
        }
        html.push_str(&template[cursor..]);
        artifact.html = html;

        Ok(artifact)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.presentable.as_deref().unwrap_or(self);
        write!(f, "Node({})", node.name)?;
        if !node.usage.is_empty() {
            write!(f, ": {}", node.usage.join(", "))?;
        }
        if !node.children.is_empty() {
            writeln!(f, " {{")?;
            for child in &node.children {
                for line in child.to_string().lines() {
                    writeln!(f, "  {line}")?;
                }
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

struct PlaceholderSpan {
    start: usize,
    end: usize,
    name: String,
}

/// Collects every `<name/>` placeholder span in one forward scan. Names are
/// word characters and dots, possibly empty, with optional interior
/// whitespace. Substitution happens afterwards in a single pass, so markup
/// introduced by a substitution is never re-scanned.
fn placeholder_spans(template: &str) -> Vec<PlaceholderSpan> {
    let bytes = template.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let name_start = j;
        while j < bytes.len()
            && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_' || bytes[j] == b'.')
        {
            j += 1;
        }
        let name_end = j;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j + 1 < bytes.len() && bytes[j] == b'/' && bytes[j + 1] == b'>' {
            spans.push(PlaceholderSpan {
                start: i,
                end: j + 2,
                name: template[name_start..name_end].to_string(),
            });
            i = j + 2;
        } else {
            i += 1;
        }
    }
    spans
}
