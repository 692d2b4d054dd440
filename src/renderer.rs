pub mod geometry;
pub mod mesh;
pub mod program;
pub mod scene;

use js_sys::{Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{console, HtmlCanvasElement, WebGl2RenderingContext};

use crate::error::RenderError;
use crate::renderer::scene::Scene;

// WebGL constants
pub const ARRAY_BUFFER: u32 = WebGl2RenderingContext::ARRAY_BUFFER;
pub const ELEMENT_ARRAY_BUFFER: u32 = WebGl2RenderingContext::ELEMENT_ARRAY_BUFFER;
pub const STATIC_DRAW: u32 = WebGl2RenderingContext::STATIC_DRAW;
pub const DYNAMIC_DRAW: u32 = WebGl2RenderingContext::DYNAMIC_DRAW;
pub const FLOAT: u32 = WebGl2RenderingContext::FLOAT;
pub const UNSIGNED_SHORT: u32 = WebGl2RenderingContext::UNSIGNED_SHORT;
pub const TRIANGLES: u32 = WebGl2RenderingContext::TRIANGLES;
pub const VERTEX_SHADER: u32 = WebGl2RenderingContext::VERTEX_SHADER;
pub const FRAGMENT_SHADER: u32 = WebGl2RenderingContext::FRAGMENT_SHADER;
pub const COMPILE_STATUS: u32 = WebGl2RenderingContext::COMPILE_STATUS;
pub const LINK_STATUS: u32 = WebGl2RenderingContext::LINK_STATUS;
pub const COLOR_BUFFER_BIT: u32 = WebGl2RenderingContext::COLOR_BUFFER_BIT;
pub const DEPTH_BUFFER_BIT: u32 = WebGl2RenderingContext::DEPTH_BUFFER_BIT;
pub const TEXTURE0: u32 = WebGl2RenderingContext::TEXTURE0;
pub const TEXTURE_2D: u32 = WebGl2RenderingContext::TEXTURE_2D;
pub const TEXTURE_WRAP_S: u32 = WebGl2RenderingContext::TEXTURE_WRAP_S;
pub const TEXTURE_WRAP_T: u32 = WebGl2RenderingContext::TEXTURE_WRAP_T;
pub const TEXTURE_MIN_FILTER: u32 = WebGl2RenderingContext::TEXTURE_MIN_FILTER;
pub const TEXTURE_MAG_FILTER: u32 = WebGl2RenderingContext::TEXTURE_MAG_FILTER;
pub const REPEAT: u32 = WebGl2RenderingContext::REPEAT;
pub const MIRRORED_REPEAT: u32 = WebGl2RenderingContext::MIRRORED_REPEAT;
pub const CLAMP_TO_EDGE: u32 = WebGl2RenderingContext::CLAMP_TO_EDGE;
pub const LINEAR: u32 = WebGl2RenderingContext::LINEAR;
pub const NEAREST: u32 = WebGl2RenderingContext::NEAREST;
pub const NO_ERROR: u32 = WebGl2RenderingContext::NO_ERROR;

/// Symbolic name for a `gl.getError()` code, where one is known.
pub fn gl_error_name(code: u32) -> Option<&'static str> {
    match code {
        WebGl2RenderingContext::INVALID_ENUM => Some("INVALID_ENUM"),
        WebGl2RenderingContext::INVALID_VALUE => Some("INVALID_VALUE"),
        WebGl2RenderingContext::INVALID_OPERATION => Some("INVALID_OPERATION"),
        WebGl2RenderingContext::INVALID_FRAMEBUFFER_OPERATION => {
            Some("INVALID_FRAMEBUFFER_OPERATION")
        }
        WebGl2RenderingContext::OUT_OF_MEMORY => Some("OUT_OF_MEMORY"),
        WebGl2RenderingContext::CONTEXT_LOST_WEBGL => Some("CONTEXT_LOST_WEBGL"),
        _ => None,
    }
}

/// Canvas sizes beyond `i32::MAX` would wrap negative in the `viewport`
/// call; clamp instead.
fn viewport_extent(size: u32) -> i32 {
    size.min(i32::MAX as u32) as i32
}

/// Owns the GL context and draws scenes to the backing canvas.
pub struct Renderer {
    gl: WebGl2RenderingContext,
}

impl Renderer {
    /// Wrap an existing WebGL2 context.
    pub fn new(gl: WebGl2RenderingContext) -> Renderer {
        Renderer { gl }
    }

    /// Create a WebGL2 context on the given canvas with the compositor
    /// flags the editor relies on (transparent, unantialiased, drawing
    /// buffer preserved for readback, premultiplied alpha).
    pub fn from_canvas(canvas: &HtmlCanvasElement) -> Result<Renderer, RenderError> {
        let options = Object::new();
        for (key, value) in [
            ("alpha", true),
            ("antialias", false),
            ("preserveDrawingBuffer", true),
            ("premultipliedAlpha", true),
        ] {
            Reflect::set(&options, &JsValue::from_str(key), &JsValue::from_bool(value))
                .map_err(|_| RenderError::ContextUnavailable("context options rejected".into()))?;
        }

        let gl = canvas
            .get_context_with_context_options("webgl2", &options)
            .map_err(|err| {
                RenderError::ContextUnavailable(
                    err.as_string().unwrap_or_else(|| "getContext threw".into()),
                )
            })?
            .ok_or_else(|| RenderError::ContextUnavailable("webgl2 not supported".into()))?
            .dyn_into::<WebGl2RenderingContext>()
            .map_err(|_| RenderError::ContextUnavailable("unexpected context type".into()))?;

        Ok(Renderer { gl })
    }

    pub fn gl(&self) -> &WebGl2RenderingContext {
        &self.gl
    }

    /// Resize the backing canvas and the GL viewport.
    pub fn set_size(&self, width: u32, height: u32) -> Result<(), RenderError> {
        let canvas = self
            .gl
            .canvas()
            .ok_or_else(|| RenderError::ContextUnavailable("context has no canvas".into()))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| RenderError::ContextUnavailable("unexpected canvas type".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        self.gl
            .viewport(0, 0, viewport_extent(width), viewport_extent(height));
        Ok(())
    }

    /// Clear the color and depth buffers.
    pub fn clear(&self) {
        self.gl.clear(COLOR_BUFFER_BIT | DEPTH_BUFFER_BIT);
    }

    /// Draw every scene member in insertion order, then flush and drain the
    /// GL error queue. GL errors are warnings, not failures; a drawable
    /// failure aborts the pass.
    pub fn render(&self, scene: &Scene) -> Result<(), RenderError> {
        for obj in scene.objects() {
            obj.borrow_mut().render(&self.gl)?;
        }

        self.gl.flush();
        self.drain_gl_errors();
        Ok(())
    }

    /// Release the GL resources of every drawable in the scene.
    pub fn dispose(&self, scene: &mut Scene) {
        scene.dispose(&self.gl);
    }

    fn drain_gl_errors(&self) {
        loop {
            let code = self.gl.get_error();
            if code == NO_ERROR {
                break;
            }
            let message = match gl_error_name(code) {
                Some(name) => format!("GL error: {name}"),
                None => format!("GL error: 0x{code:x}"),
            };
            console::warn_1(&message.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_gl_errors_resolve_to_symbolic_names() {
        assert_eq!(
            gl_error_name(WebGl2RenderingContext::INVALID_ENUM),
            Some("INVALID_ENUM")
        );
        assert_eq!(
            gl_error_name(WebGl2RenderingContext::INVALID_OPERATION),
            Some("INVALID_OPERATION")
        );
        assert_eq!(
            gl_error_name(WebGl2RenderingContext::OUT_OF_MEMORY),
            Some("OUT_OF_MEMORY")
        );
    }

    #[test]
    fn unknown_gl_error_codes_have_no_name() {
        assert_eq!(gl_error_name(0xdead), None);
        assert_eq!(gl_error_name(NO_ERROR), None);
    }

    #[test]
    fn viewport_extents_never_go_negative() {
        assert_eq!(viewport_extent(0), 0);
        assert_eq!(viewport_extent(4096), 4096);
        assert_eq!(viewport_extent(i32::MAX as u32), i32::MAX);
        assert_eq!(viewport_extent(u32::MAX), i32::MAX);
        assert_eq!(viewport_extent(i32::MAX as u32 + 1), i32::MAX);
    }
}
