use std::cell::RefCell;
use std::rc::Rc;

use web_sys::WebGl2RenderingContext;

use crate::renderer::mesh::Drawable;

/// Shared handle to a scene member. Callers keep their own clones and may
/// keep mutating the drawable after adding it; wasm is single-threaded, so
/// `Rc<RefCell>` stands in for JS reference sharing.
pub type SceneObject = Rc<RefCell<dyn Drawable>>;

/// An ordered mutable list of drawables rendered together each frame.
#[derive(Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Scene {
        Scene::default()
    }

    /// Append a drawable to the end of the draw order.
    pub fn add(&mut self, obj: SceneObject) {
        self.objects.push(obj);
    }

    /// Remove the first entry that is the same allocation as `obj`. No-op
    /// when the object is not in the scene.
    pub fn remove(&mut self, obj: &SceneObject) {
        if let Some(index) = self.objects.iter().position(|o| Rc::ptr_eq(o, obj)) {
            self.objects.remove(index);
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Members in insertion (draw) order.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Dispose every member's GL resources and empty the scene.
    pub fn dispose(&mut self, gl: &WebGl2RenderingContext) {
        for obj in self.objects.drain(..) {
            obj.borrow_mut().dispose(gl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;

    struct NullDrawable;

    impl Drawable for NullDrawable {
        fn render(&mut self, _gl: &WebGl2RenderingContext) -> Result<(), RenderError> {
            Ok(())
        }

        fn dispose(&mut self, _gl: &WebGl2RenderingContext) {}
    }

    fn drawable() -> SceneObject {
        Rc::new(RefCell::new(NullDrawable))
    }

    #[test]
    fn add_then_remove_is_net_zero() {
        let mut scene = Scene::new();
        let obj = drawable();
        scene.add(obj.clone());
        assert_eq!(scene.len(), 1);
        scene.remove(&obj);
        assert!(scene.is_empty());
        assert!(!scene.objects().iter().any(|o| Rc::ptr_eq(o, &obj)));
    }

    #[test]
    fn remove_matches_by_identity_not_position() {
        let mut scene = Scene::new();
        let first = drawable();
        let second = drawable();
        scene.add(first.clone());
        scene.add(second.clone());

        scene.remove(&second);
        assert_eq!(scene.len(), 1);
        assert!(Rc::ptr_eq(&scene.objects()[0], &first));
    }

    #[test]
    fn remove_of_absent_object_is_a_noop() {
        let mut scene = Scene::new();
        scene.add(drawable());
        let stranger = drawable();
        scene.remove(&stranger);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn removes_only_first_match() {
        let mut scene = Scene::new();
        let obj = drawable();
        scene.add(obj.clone());
        scene.add(obj.clone());
        scene.remove(&obj);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut scene = Scene::new();
        let a = drawable();
        let b = drawable();
        let c = drawable();
        scene.add(a.clone());
        scene.add(b.clone());
        scene.add(c.clone());

        let objects = scene.objects();
        assert!(Rc::ptr_eq(&objects[0], &a));
        assert!(Rc::ptr_eq(&objects[1], &b));
        assert!(Rc::ptr_eq(&objects[2], &c));
    }
}
