use std::collections::HashMap;

use js_sys::Object;
use web_sys::{
    console, WebGl2RenderingContext, WebGlBuffer, WebGlProgram, WebGlTexture, WebGlUniformLocation,
};

use crate::error::{RenderError, ShaderKind};
use crate::renderer::{
    ARRAY_BUFFER, CLAMP_TO_EDGE, COMPILE_STATUS, FLOAT, FRAGMENT_SHADER, LINEAR, LINK_STATUS,
    MIRRORED_REPEAT, NEAREST, REPEAT, TEXTURE0, TEXTURE_2D, TEXTURE_MAG_FILTER, TEXTURE_MIN_FILTER,
    TEXTURE_WRAP_S, TEXTURE_WRAP_T, VERTEX_SHADER,
};
use crate::renderer::geometry::AttributeLayout;

/// Passthrough vertex stage used when a program supplies only a fragment
/// shader.
pub const DEFAULT_VERTEX_SHADER: &str = r#"#version 300 es
in vec3 aPosition;
void main() {
    gl_Position = vec4(aPosition, 1.0);
}
"#;

/// Flat-fill fragment stage for meshes created without their own shader.
pub const FILL_FRAGMENT_SHADER: &str = r#"#version 300 es
precision lowp float;
uniform vec4 uColor;
out vec4 fragColor;
void main() {
    fragColor = uColor;
}
"#;

/// Texture coordinate wrap mode for texture uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureClamp {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

impl TextureClamp {
    fn gl_value(self) -> i32 {
        (match self {
            TextureClamp::Repeat => REPEAT,
            TextureClamp::MirroredRepeat => MIRRORED_REPEAT,
            TextureClamp::ClampToEdge => CLAMP_TO_EDGE,
        }) as i32
    }
}

/// Sampling filter for texture uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

impl TextureFilter {
    fn gl_value(self) -> i32 {
        (match self {
            TextureFilter::Linear => LINEAR,
            TextureFilter::Nearest => NEAREST,
        }) as i32
    }
}

/// A named shader input value, uploaded by variant tag.
#[derive(Debug, Clone)]
pub enum Uniform {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    Texture {
        texture: WebGlTexture,
        clamp: TextureClamp,
        filter: TextureFilter,
    },
}

/// A vertex+fragment shader pair with its uniform values. The linked GL
/// program and uniform locations are created on first `compile` /
/// `attach_uniforms` and cached for the instance's lifetime.
pub struct Program {
    vertex_source: String,
    fragment_source: String,
    uniforms: HashMap<String, Uniform>,
    program: Option<WebGlProgram>,
    uniform_locations: HashMap<String, Option<WebGlUniformLocation>>,
}

impl Program {
    /// A program from a fragment shader and the default passthrough vertex
    /// stage.
    pub fn new(fragment_source: &str) -> Program {
        Program::with_vertex(DEFAULT_VERTEX_SHADER, fragment_source)
    }

    pub fn with_vertex(vertex_source: &str, fragment_source: &str) -> Program {
        Program {
            vertex_source: vertex_source.to_string(),
            fragment_source: fragment_source.to_string(),
            uniforms: HashMap::new(),
            program: None,
            uniform_locations: HashMap::new(),
        }
    }

    pub fn set_uniform(&mut self, name: &str, value: Uniform) {
        self.uniforms.insert(name.to_string(), value);
    }

    /// Store a texture uniform. `None` options fall back to the defaults
    /// (`Repeat` wrap, `Linear` filter).
    pub fn set_texture_uniform(
        &mut self,
        name: &str,
        texture: WebGlTexture,
        clamp: Option<TextureClamp>,
        filter: Option<TextureFilter>,
    ) {
        self.uniforms.insert(
            name.to_string(),
            Uniform::Texture {
                texture,
                clamp: clamp.unwrap_or_default(),
                filter: filter.unwrap_or_default(),
            },
        );
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// Compile both stages and link. Idempotent: repeat calls return the
    /// cached program handle.
    pub fn compile(&mut self, gl: &WebGl2RenderingContext) -> Result<WebGlProgram, RenderError> {
        if let Some(program) = &self.program {
            return Ok(program.clone());
        }

        let vert = compile_shader(gl, ShaderKind::Vertex, &self.vertex_source)?;
        let frag = match compile_shader(gl, ShaderKind::Fragment, &self.fragment_source) {
            Ok(frag) => frag,
            Err(err) => {
                gl.delete_shader(Some(&vert));
                return Err(err);
            }
        };

        let program = match gl.create_program() {
            Some(program) => program,
            None => {
                gl.delete_shader(Some(&vert));
                gl.delete_shader(Some(&frag));
                return Err(RenderError::ResourceAlloc("shader program"));
            }
        };

        gl.attach_shader(&program, &vert);
        gl.attach_shader(&program, &frag);
        gl.link_program(&program);

        let linked = gl
            .get_program_parameter(&program, LINK_STATUS)
            .as_bool()
            .unwrap_or(false);

        gl.delete_shader(Some(&vert));
        gl.delete_shader(Some(&frag));

        if !linked {
            let log = gl
                .get_program_info_log(&program)
                .unwrap_or_else(|| "unknown link error".to_string());
            gl.delete_program(Some(&program));
            return Err(RenderError::ProgramLink { log });
        }

        self.program = Some(program.clone());
        Ok(program)
    }

    /// Bind each named attribute's buffer and configure its pointer on the
    /// given program. Attributes whose location cannot be resolved are
    /// skipped with a console warning.
    pub fn attach_attributes(
        &self,
        gl: &WebGl2RenderingContext,
        program: &WebGlProgram,
        attribs: &HashMap<String, (AttributeLayout, WebGlBuffer)>,
    ) {
        for (name, (layout, buffer)) in attribs {
            let location = gl.get_attrib_location(program, name);
            if location < 0 {
                console::warn_1(&format!("attribute '{name}' not found in program").into());
                continue;
            }
            gl.bind_buffer(ARRAY_BUFFER, Some(buffer));
            gl.enable_vertex_attrib_array(location as u32);
            gl.vertex_attrib_pointer_with_i32(
                location as u32,
                layout.item_size,
                FLOAT,
                false,
                layout.stride,
                layout.offset,
            );
        }
    }

    /// Upload every stored uniform to the given program, which must be the
    /// one this instance compiled. Locations are resolved once and cached;
    /// unresolvable names warn and are skipped. Texture uniforms get
    /// sequential texture units with their clamp/filter parameters applied.
    pub fn attach_uniforms(
        &mut self,
        gl: &WebGl2RenderingContext,
        program: &WebGlProgram,
    ) -> Result<(), RenderError> {
        match &self.program {
            Some(own) if Object::is(own.as_ref(), program.as_ref()) => {}
            _ => return Err(RenderError::ForeignProgram),
        }

        let mut texture_unit: u32 = 0;
        for (name, value) in &self.uniforms {
            let location = self
                .uniform_locations
                .entry(name.clone())
                .or_insert_with(|| gl.get_uniform_location(program, name));

            let Some(location) = location.as_ref() else {
                console::warn_1(&format!("uniform '{name}' not found in program").into());
                continue;
            };

            match value {
                Uniform::Float(v) => gl.uniform1f(Some(location), *v),
                Uniform::Vec2(v) => gl.uniform2fv_with_f32_array(Some(location), v),
                Uniform::Vec3(v) => gl.uniform3fv_with_f32_array(Some(location), v),
                Uniform::Vec4(v) => gl.uniform4fv_with_f32_array(Some(location), v),
                Uniform::Mat3(v) => {
                    gl.uniform_matrix3fv_with_f32_array(Some(location), false, v)
                }
                Uniform::Mat4(v) => {
                    gl.uniform_matrix4fv_with_f32_array(Some(location), false, v)
                }
                Uniform::Texture {
                    texture,
                    clamp,
                    filter,
                } => {
                    gl.active_texture(TEXTURE0 + texture_unit);
                    gl.bind_texture(TEXTURE_2D, Some(texture));
                    gl.tex_parameteri(TEXTURE_2D, TEXTURE_WRAP_S, clamp.gl_value());
                    gl.tex_parameteri(TEXTURE_2D, TEXTURE_WRAP_T, clamp.gl_value());
                    gl.tex_parameteri(TEXTURE_2D, TEXTURE_MIN_FILTER, filter.gl_value());
                    gl.tex_parameteri(TEXTURE_2D, TEXTURE_MAG_FILTER, filter.gl_value());
                    gl.uniform1i(Some(location), texture_unit as i32);
                    texture_unit += 1;
                }
            }
        }

        Ok(())
    }

    /// Delete the cached program handle and location cache.
    pub fn dispose(&mut self, gl: &WebGl2RenderingContext) {
        if let Some(program) = self.program.take() {
            gl.delete_program(Some(&program));
        }
        self.uniform_locations.clear();
    }
}

/// Compile a single shader stage, failing with the driver's info log.
fn compile_shader(
    gl: &WebGl2RenderingContext,
    kind: ShaderKind,
    source: &str,
) -> Result<web_sys::WebGlShader, RenderError> {
    let shader_type = match kind {
        ShaderKind::Vertex => VERTEX_SHADER,
        ShaderKind::Fragment => FRAGMENT_SHADER,
    };
    let shader = gl
        .create_shader(shader_type)
        .ok_or(RenderError::ResourceAlloc("shader object"))?;

    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);

    if !gl
        .get_shader_parameter(&shader, COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        let log = gl
            .get_shader_info_log(&shader)
            .unwrap_or_else(|| "unknown compile error".to_string());
        gl.delete_shader(Some(&shader));
        return Err(RenderError::ShaderCompile { kind, log });
    }

    Ok(shader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vertex_shader_forwards_position() {
        let program = Program::new(FILL_FRAGMENT_SHADER);
        assert!(program.vertex_source().contains("#version 300 es"));
        assert!(program.vertex_source().contains("aPosition"));
        assert_eq!(program.fragment_source(), FILL_FRAGMENT_SHADER);
    }

    #[test]
    fn uniforms_overwrite_by_name() {
        let mut program = Program::new(FILL_FRAGMENT_SHADER);
        program.set_uniform("uOpacity", Uniform::Float(0.5));
        program.set_uniform("uOpacity", Uniform::Float(1.0));
        assert!(matches!(
            program.uniform("uOpacity"),
            Some(Uniform::Float(v)) if *v == 1.0
        ));
    }

    #[test]
    fn matrix_uniforms_store_full_payload() {
        let mut program = Program::new(FILL_FRAGMENT_SHADER);
        let mat = [
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ];
        program.set_uniform("uTransform", Uniform::Mat3(mat));
        assert!(matches!(
            program.uniform("uTransform"),
            Some(Uniform::Mat3(stored)) if *stored == mat
        ));
    }

    #[test]
    fn texture_sampling_defaults() {
        assert_eq!(TextureClamp::default(), TextureClamp::Repeat);
        assert_eq!(TextureFilter::default(), TextureFilter::Linear);
    }
}
