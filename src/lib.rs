mod error;
mod renderer;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext};

pub use crate::error::{RenderError, ShaderKind};
pub use crate::renderer::geometry::{Attribute, AttributeOptions, BufferGeometry};
pub use crate::renderer::mesh::{Drawable, InstancedMesh, Mesh};
pub use crate::renderer::program::{Program, TextureClamp, TextureFilter, Uniform};
pub use crate::renderer::scene::{Scene, SceneObject};
pub use crate::renderer::Renderer;

use crate::renderer::program::FILL_FRAGMENT_SHADER;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// One mesh slot tracked by the host. Plain and instanced meshes are kept
/// apart so color updates can reach the program either way.
enum MeshSlot {
    Single(Rc<RefCell<Mesh>>),
    Instanced(Rc<RefCell<InstancedMesh>>),
}

impl MeshSlot {
    fn as_scene_object(&self) -> SceneObject {
        match self {
            MeshSlot::Single(mesh) => mesh.clone(),
            MeshSlot::Instanced(mesh) => mesh.clone(),
        }
    }

    fn set_color(&self, color: [f32; 4]) {
        match self {
            MeshSlot::Single(mesh) => mesh
                .borrow_mut()
                .program
                .set_uniform("uColor", Uniform::Vec4(color)),
            MeshSlot::Instanced(mesh) => mesh
                .borrow_mut()
                .program
                .set_uniform("uColor", Uniform::Vec4(color)),
        }
    }
}

/// Stateful render host driven by the editor shell
#[wasm_bindgen]
#[derive(Default)]
pub struct SilkRenderHost {
    renderer: Option<Renderer>,
    scene: Scene,
    meshes: Vec<Option<MeshSlot>>, // Sparse vec (None = deallocated slot)
}

impl SilkRenderHost {
    fn renderer(&self) -> Result<&Renderer, RenderError> {
        self.renderer.as_ref().ok_or(RenderError::Uninitialized)
    }

    // Find next free slot or extend vec; ids stay stable for the shell.
    fn insert_slot(&mut self, slot: MeshSlot) -> u32 {
        self.scene.add(slot.as_scene_object());
        if let Some(free_slot) = self.meshes.iter().position(|m| m.is_none()) {
            self.meshes[free_slot] = Some(slot);
            free_slot as u32
        } else {
            self.meshes.push(Some(slot));
            (self.meshes.len() - 1) as u32
        }
    }

    fn slot(&self, mesh_id: u32) -> Result<&MeshSlot, RenderError> {
        self.meshes
            .get(mesh_id as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(RenderError::InvalidMeshId(mesh_id))
    }

    fn fill_program() -> Program {
        let mut program = Program::new(FILL_FRAGMENT_SHADER);
        program.set_uniform("uColor", Uniform::Vec4([1.0, 1.0, 1.0, 1.0]));
        program
    }
}

#[wasm_bindgen]
impl SilkRenderHost {
    /// Create a new host with no context and no meshes
    #[wasm_bindgen(constructor)]
    pub fn new() -> SilkRenderHost {
        SilkRenderHost::default()
    }

    /// Initialize with an existing WebGL 2.0 context
    ///
    /// # Returns
    /// * `"init_done"` signal on success
    pub fn init(&mut self, gl: WebGl2RenderingContext) -> Result<String, JsValue> {
        self.renderer = Some(Renderer::new(gl));
        Ok("init_done".to_string())
    }

    /// Initialize by creating a WebGL 2.0 context on the given canvas
    ///
    /// # Returns
    /// * `"init_done"` signal on success
    pub fn init_with_canvas(&mut self, canvas: HtmlCanvasElement) -> Result<String, JsValue> {
        self.renderer = Some(Renderer::from_canvas(&canvas)?);
        Ok("init_done".to_string())
    }

    /// Add a flat-colored triangle mesh from interleaved position floats
    /// (3 per vertex)
    ///
    /// # Returns
    /// * Mesh ID (u32) for tracking this mesh
    pub fn add_mesh(&mut self, positions: Vec<f32>) -> Result<u32, JsValue> {
        self.renderer()?;
        let mesh = Mesh::new(BufferGeometry::new(positions, None), Self::fill_program());
        Ok(self.insert_slot(MeshSlot::Single(Rc::new(RefCell::new(mesh)))))
    }

    /// Add an indexed flat-colored mesh
    ///
    /// # Returns
    /// * Mesh ID (u32) for tracking this mesh
    pub fn add_indexed_mesh(
        &mut self,
        positions: Vec<f32>,
        indices: Vec<u16>,
    ) -> Result<u32, JsValue> {
        self.renderer()?;
        let mesh = Mesh::new(
            BufferGeometry::new(positions, Some(indices)),
            Self::fill_program(),
        );
        Ok(self.insert_slot(MeshSlot::Single(Rc::new(RefCell::new(mesh)))))
    }

    /// Add an instanced flat-colored mesh drawn `count` times
    ///
    /// # Returns
    /// * Mesh ID (u32) for tracking this mesh
    pub fn add_instanced_mesh(&mut self, positions: Vec<f32>, count: i32) -> Result<u32, JsValue> {
        self.renderer()?;
        let mesh = InstancedMesh::new(
            BufferGeometry::new(positions, None),
            Self::fill_program(),
            count,
        );
        Ok(self.insert_slot(MeshSlot::Instanced(Rc::new(RefCell::new(mesh)))))
    }

    /// Set the fill color of a mesh added through this host
    ///
    /// # Returns
    /// * `"color_done"` signal on success
    pub fn set_mesh_color(
        &mut self,
        mesh_id: u32,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) -> Result<String, JsValue> {
        self.slot(mesh_id)?.set_color([r, g, b, a]);
        Ok("color_done".to_string())
    }

    /// Remove a mesh and release its GL resources
    ///
    /// # Returns
    /// * `"remove_done"` signal on success
    pub fn remove_mesh(&mut self, mesh_id: u32) -> Result<String, JsValue> {
        let slot = self
            .meshes
            .get_mut(mesh_id as usize)
            .and_then(|slot| slot.take())
            .ok_or(RenderError::InvalidMeshId(mesh_id))?;

        let obj = slot.as_scene_object();
        self.scene.remove(&obj);
        if let Some(renderer) = &self.renderer {
            obj.borrow_mut().dispose(renderer.gl());
        }
        Ok("remove_done".to_string())
    }

    /// Resize the backing canvas and viewport
    ///
    /// # Returns
    /// * `"resize_done"` signal on success
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<String, JsValue> {
        self.renderer()?.set_size(width, height)?;
        Ok("resize_done".to_string())
    }

    /// Clear the color and depth buffers
    ///
    /// # Returns
    /// * `"clear_done"` signal on success
    pub fn clear(&mut self) -> Result<String, JsValue> {
        self.renderer()?.clear();
        Ok("clear_done".to_string())
    }

    /// Clear and draw the scene in insertion order
    ///
    /// # Returns
    /// * `"render_done"` signal on success
    pub fn render(&mut self) -> Result<String, JsValue> {
        let renderer = self.renderer()?;
        renderer.clear();
        renderer.render(&self.scene)?;
        Ok("render_done".to_string())
    }

    /// Release the GL resources of every mesh and empty the scene
    ///
    /// # Returns
    /// * `"dispose_done"` signal on success
    pub fn dispose(&mut self) -> Result<String, JsValue> {
        match &self.renderer {
            Some(renderer) => renderer.dispose(&mut self.scene),
            // Never compiled anything, so there is nothing to release.
            None => self.scene = Scene::new(),
        }
        self.meshes.clear();
        Ok("dispose_done".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // JsValue cannot be materialized off-wasm, so these tests drive the
    // internal helpers that the bindgen methods delegate to.

    fn test_slot() -> MeshSlot {
        MeshSlot::Single(Rc::new(RefCell::new(Mesh::new(
            BufferGeometry::plane(1.0, 1.0),
            SilkRenderHost::fill_program(),
        ))))
    }

    #[test]
    fn host_starts_uninitialized() {
        let host = SilkRenderHost::new();
        assert!(matches!(host.renderer(), Err(RenderError::Uninitialized)));
    }

    #[test]
    fn unknown_mesh_id_is_rejected() {
        let host = SilkRenderHost::new();
        assert!(matches!(host.slot(3), Err(RenderError::InvalidMeshId(3))));
    }

    #[test]
    fn mesh_ids_reuse_freed_slots() {
        let mut host = SilkRenderHost::new();
        let first = host.insert_slot(test_slot());
        let second = host.insert_slot(test_slot());
        assert_eq!((first, second), (0, 1));
        assert_eq!(host.scene.len(), 2);

        // No GL context held, so removal skips disposal and just frees the slot.
        host.remove_mesh(first).unwrap();
        assert_eq!(host.scene.len(), 1);

        let reused = host.insert_slot(test_slot());
        assert_eq!(reused, first);
        assert_eq!(host.scene.len(), 2);
    }

    #[test]
    fn default_fill_program_is_white() {
        let program = SilkRenderHost::fill_program();
        assert!(matches!(
            program.uniform("uColor"),
            Some(Uniform::Vec4(c)) if *c == [1.0, 1.0, 1.0, 1.0]
        ));
    }

    #[test]
    fn dispose_without_context_is_allowed() {
        let mut host = SilkRenderHost::new();
        host.insert_slot(test_slot());
        assert_eq!(host.dispose().unwrap(), "dispose_done");
        assert!(host.meshes.is_empty());
        assert!(host.scene.is_empty());
    }
}
