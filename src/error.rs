use thiserror::Error;
use wasm_bindgen::JsValue;

/// Which shader stage failed to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderKind::Vertex => f.write_str("vertex"),
            ShaderKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors produced by the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A shader stage failed to compile; carries the driver's info log.
    #[error("{kind} shader compile error: {log}")]
    ShaderCompile { kind: ShaderKind, log: String },

    /// A program failed to link; carries the driver's info log.
    #[error("shader link error: {log}")]
    ProgramLink { log: String },

    /// An attribute buffer length was not divisible by its item size.
    #[error("attribute '{name}': buffer length {len} is not divisible by item size {item_size}")]
    AttributeSize {
        name: String,
        len: usize,
        item_size: i32,
    },

    /// The implicit position attribute cannot be overwritten.
    #[error("attribute '{0}' is reserved and cannot be overwritten")]
    AttributeReserved(String),

    /// `attach_uniforms` was handed a program this instance did not compile.
    #[error("attach_uniforms called with a program compiled by another Program instance")]
    ForeignProgram,

    /// The GL context returned null when asked to create an object.
    #[error("failed to create {0}")]
    ResourceAlloc(&'static str),

    /// A WebGL2 context could not be obtained from the canvas.
    #[error("failed to acquire a WebGL2 context: {0}")]
    ContextUnavailable(String),

    /// A host-boundary call arrived before `init()`.
    #[error("renderer not initialized, call init() first")]
    Uninitialized,

    /// A host-boundary call referenced an unknown mesh id.
    #[error("invalid mesh id: {0}")]
    InvalidMeshId(u32),
}

impl From<RenderError> for JsValue {
    fn from(err: RenderError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}
