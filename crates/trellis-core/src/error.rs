#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeError {
    pub code: String,
    pub message: String,
}

impl ComposeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A required component resource is missing. Fatal to constructing the
    /// component; callers must not absorb it.
    pub fn load(message: impl Into<String>) -> Self {
        Self::new("TRELLIS_E_LOAD", message)
    }

    /// A template references its own node name. Fatal to the render call.
    pub fn self_render(name: &str) -> Self {
        Self::new(
            "TRELLIS_E_SELF_RENDER",
            format!("node '{name}' cannot render itself"),
        )
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        Self::new("TRELLIS_E_MANIFEST", message)
    }
}
