use web_sys::WebGl2RenderingContext;

use crate::error::RenderError;
use crate::renderer::geometry::{BufferGeometry, POSITION_ATTRIBUTE};
use crate::renderer::program::Program;
use crate::renderer::{ELEMENT_ARRAY_BUFFER, TRIANGLES, UNSIGNED_SHORT};

/// Vertices issued by a non-indexed plain mesh draw.
const MESH_ARRAY_VERTICES: i32 = 3;

/// Vertices per instance of a non-indexed instanced draw (one quad).
const INSTANCE_ARRAY_VERTICES: i32 = 6;

/// Anything a `Scene` can hold and a `Renderer` can draw.
pub trait Drawable {
    fn render(&mut self, gl: &WebGl2RenderingContext) -> Result<(), RenderError>;

    /// Release the GL resources this drawable's geometry and program own.
    fn dispose(&mut self, gl: &WebGl2RenderingContext);
}

/// One geometry paired with one program, issuing a single draw call.
pub struct Mesh {
    pub geometry: BufferGeometry,
    pub program: Program,
}

impl Mesh {
    pub fn new(geometry: BufferGeometry, program: Program) -> Mesh {
        Mesh { geometry, program }
    }
}

/// Compile both halves, bind, attach attributes and uniforms. Shared by the
/// plain and instanced render paths, which differ only in the draw call.
fn prepare(
    geometry: &mut BufferGeometry,
    program: &mut Program,
    gl: &WebGl2RenderingContext,
) -> Result<web_sys::WebGlProgram, RenderError> {
    let gl_program = program.compile(gl)?;
    let compiled = geometry.compile(gl)?;

    gl.use_program(Some(&gl_program));

    let mut attribs = geometry.upload_attributes(gl)?;
    let position = geometry
        .attribute(POSITION_ATTRIBUTE)
        .expect("position attribute installed at construction")
        .layout();
    attribs.insert(POSITION_ATTRIBUTE.to_string(), (position, compiled.vertices));

    program.attach_attributes(gl, &gl_program, &attribs);
    program.attach_uniforms(gl, &gl_program)?;

    if let Some(indices) = &compiled.indices {
        gl.bind_buffer(ELEMENT_ARRAY_BUFFER, Some(indices));
    }

    Ok(gl_program)
}

impl Drawable for Mesh {
    fn render(&mut self, gl: &WebGl2RenderingContext) -> Result<(), RenderError> {
        prepare(&mut self.geometry, &mut self.program, gl)?;

        if self.geometry.index_buffer().is_some() {
            gl.draw_elements_with_i32(
                TRIANGLES,
                self.geometry.vertex_count() as i32,
                UNSIGNED_SHORT,
                0,
            );
        } else {
            gl.draw_arrays(TRIANGLES, 0, MESH_ARRAY_VERTICES);
        }
        Ok(())
    }

    fn dispose(&mut self, gl: &WebGl2RenderingContext) {
        self.geometry.dispose(gl);
        self.program.dispose(gl);
    }
}

/// A mesh drawn `count` times with the instanced draw variants.
pub struct InstancedMesh {
    pub geometry: BufferGeometry,
    pub program: Program,
    pub count: i32,
}

impl InstancedMesh {
    pub fn new(geometry: BufferGeometry, program: Program, count: i32) -> InstancedMesh {
        InstancedMesh {
            geometry,
            program,
            count,
        }
    }
}

impl Drawable for InstancedMesh {
    fn render(&mut self, gl: &WebGl2RenderingContext) -> Result<(), RenderError> {
        if self.count <= 0 {
            return Ok(());
        }

        prepare(&mut self.geometry, &mut self.program, gl)?;

        if self.geometry.index_buffer().is_some() {
            gl.draw_elements_instanced_with_i32(
                TRIANGLES,
                self.geometry.vertex_count() as i32,
                UNSIGNED_SHORT,
                0,
                self.count,
            );
        } else {
            gl.draw_arrays_instanced(TRIANGLES, 0, INSTANCE_ARRAY_VERTICES, self.count);
        }
        Ok(())
    }

    fn dispose(&mut self, gl: &WebGl2RenderingContext) {
        self.geometry.dispose(gl);
        self.program.dispose(gl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::program::FILL_FRAGMENT_SHADER;

    #[test]
    fn mesh_pairs_geometry_and_program() {
        let mesh = Mesh::new(
            BufferGeometry::plane(2.0, 2.0),
            Program::new(FILL_FRAGMENT_SHADER),
        );
        assert_eq!(mesh.geometry.vertex_count(), 6);
    }

    #[test]
    fn instanced_mesh_carries_count() {
        let mesh = InstancedMesh::new(
            BufferGeometry::new(vec![0.0; 18], None),
            Program::new(FILL_FRAGMENT_SHADER),
            64,
        );
        assert_eq!(mesh.count, 64);
        assert_eq!(mesh.geometry.vertex_count(), 6);
    }
}
