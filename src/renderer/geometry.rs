use std::collections::HashMap;

use js_sys::{Float32Array, Uint16Array};
use web_sys::{WebGl2RenderingContext, WebGlBuffer};

use crate::error::RenderError;
use crate::renderer::{ARRAY_BUFFER, DYNAMIC_DRAW, ELEMENT_ARRAY_BUFFER, STATIC_DRAW};

/// Name of the implicit position attribute installed at construction.
pub const POSITION_ATTRIBUTE: &str = "aPosition";

/// Floats per position vertex.
pub const POSITION_ITEM_SIZE: i32 = 3;

/// A named vertex attribute: CPU-side float data plus pointer layout.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub item_size: i32,
    pub buffer: Vec<f32>,
    pub stride: i32,
    pub offset: i32,
    /// When set, overwrites re-upload in place via `bufferSubData` instead of
    /// reallocating the GL buffer.
    pub buffer_sub_data: bool,
}

/// Options for [`BufferGeometry::set_attribute`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeOptions {
    pub stride: i32,
    pub offset: i32,
    pub buffer_sub_data: bool,
}

/// Pointer layout of an attribute, all that a draw call needs besides the
/// GL buffer handle.
#[derive(Debug, Clone, Copy)]
pub struct AttributeLayout {
    pub item_size: i32,
    pub stride: i32,
    pub offset: i32,
}

impl Attribute {
    pub fn layout(&self) -> AttributeLayout {
        AttributeLayout {
            item_size: self.item_size,
            stride: self.stride,
            offset: self.offset,
        }
    }
}

/// Compiled GL handles for a geometry's position and index data.
#[derive(Debug, Clone)]
pub struct CompiledGeometry {
    pub vertices: WebGlBuffer,
    pub indices: Option<WebGlBuffer>,
}

/// Per-attribute GL buffer cache entry.
struct AttributeBuffer {
    buffer: WebGlBuffer,
    /// Float count of the GL-side allocation.
    allocated_len: usize,
    /// CPU data changed since the last upload.
    dirty: bool,
}

/// How a dirty attribute reaches the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeUpload {
    /// In-place `bufferSubData` into the existing allocation.
    SubData,
    /// Fresh `bufferData`, replacing the allocation.
    Reallocate,
}

/// `bufferSubData` is only valid while the CPU data still fits the GL
/// allocation exactly; any length change forces a reallocation.
fn plan_upload(allocated_len: usize, data_len: usize, sub_data: bool) -> AttributeUpload {
    if sub_data && data_len == allocated_len {
        AttributeUpload::SubData
    } else {
        AttributeUpload::Reallocate
    }
}

/// CPU-side vertex/index data with named attributes, compiled lazily to GPU
/// buffers. Position data is immutable after construction; GL handles are
/// allocated on first `compile` and cached for the geometry's lifetime.
pub struct BufferGeometry {
    raw_buffer: Vec<f32>,
    index_buffer: Option<Vec<u16>>,
    attributes: HashMap<String, Attribute>,
    vbo: Option<WebGlBuffer>,
    ibo: Option<WebGlBuffer>,
    attribute_buffers: HashMap<String, AttributeBuffer>,
}

impl BufferGeometry {
    /// Create a geometry from interleaved position floats and an optional
    /// index buffer. The `aPosition` attribute is installed here and is
    /// read-only thereafter.
    pub fn new(raw_buffer: Vec<f32>, index_buffer: Option<Vec<u16>>) -> BufferGeometry {
        let mut attributes = HashMap::new();
        attributes.insert(
            POSITION_ATTRIBUTE.to_string(),
            Attribute {
                item_size: POSITION_ITEM_SIZE,
                buffer: raw_buffer.clone(),
                stride: 0,
                offset: 0,
                buffer_sub_data: false,
            },
        );

        BufferGeometry {
            raw_buffer,
            index_buffer,
            attributes,
            vbo: None,
            ibo: None,
            attribute_buffers: HashMap::new(),
        }
    }

    /// A unit-depth plane of the given size: two triangles, 6 vertices
    /// (18 floats), indexed `[0, 1, 2, 2, 3, 0]`.
    pub fn plane(width: f32, height: f32) -> BufferGeometry {
        let (hw, hh) = (width / 2.0, height / 2.0);
        #[rustfmt::skip]
        let positions = vec![
            -hw, -hh, 0.0,
             hw, -hh, 0.0,
             hw,  hh, 0.0,
            -hw,  hh, 0.0,
             hw,  hh, 0.0,
            -hw, -hh, 0.0,
        ];
        BufferGeometry::new(positions, Some(vec![0, 1, 2, 2, 3, 0]))
    }

    /// Store or overwrite a named attribute.
    ///
    /// Fails when `buffer.len()` is not divisible by `item_size`, or when the
    /// name collides with the reserved position attribute. Overwrites mark
    /// the attribute dirty so its GL buffer is refreshed on the next draw.
    pub fn set_attribute(
        &mut self,
        name: &str,
        buffer: Vec<f32>,
        item_size: i32,
        opts: AttributeOptions,
    ) -> Result<(), RenderError> {
        if name == POSITION_ATTRIBUTE {
            return Err(RenderError::AttributeReserved(name.to_string()));
        }
        if item_size <= 0 || buffer.len() % item_size as usize != 0 {
            return Err(RenderError::AttributeSize {
                name: name.to_string(),
                len: buffer.len(),
                item_size,
            });
        }

        self.attributes.insert(
            name.to_string(),
            Attribute {
                item_size,
                buffer,
                stride: opts.stride,
                offset: opts.offset,
                buffer_sub_data: opts.buffer_sub_data,
            },
        );
        if let Some(cached) = self.attribute_buffers.get_mut(name) {
            cached.dirty = true;
        }
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// All attributes, the implicit position attribute included.
    pub fn attributes(&self) -> &HashMap<String, Attribute> {
        &self.attributes
    }

    pub fn raw_buffer(&self) -> &[f32] {
        &self.raw_buffer
    }

    pub fn index_buffer(&self) -> Option<&[u16]> {
        self.index_buffer.as_deref()
    }

    /// Index length when indexed, else raw length / 3 (position-only
    /// triangles).
    pub fn vertex_count(&self) -> usize {
        match &self.index_buffer {
            Some(indices) => indices.len(),
            None => self.raw_buffer.len() / POSITION_ITEM_SIZE as usize,
        }
    }

    /// Allocate and upload the position VBO and, when present, the index
    /// buffer. Idempotent: repeat calls return the cached handles.
    pub fn compile(&mut self, gl: &WebGl2RenderingContext) -> Result<CompiledGeometry, RenderError> {
        if self.vbo.is_none() {
            let vbo = gl
                .create_buffer()
                .ok_or(RenderError::ResourceAlloc("vertex buffer"))?;
            gl.bind_buffer(ARRAY_BUFFER, Some(&vbo));
            unsafe {
                let array = Float32Array::view(&self.raw_buffer);
                gl.buffer_data_with_array_buffer_view(ARRAY_BUFFER, &array, STATIC_DRAW);
            }
            self.vbo = Some(vbo);
        }

        if self.ibo.is_none() {
            if let Some(indices) = &self.index_buffer {
                let ibo = gl
                    .create_buffer()
                    .ok_or(RenderError::ResourceAlloc("index buffer"))?;
                gl.bind_buffer(ELEMENT_ARRAY_BUFFER, Some(&ibo));
                unsafe {
                    let array = Uint16Array::view(indices);
                    gl.buffer_data_with_array_buffer_view(ELEMENT_ARRAY_BUFFER, &array, STATIC_DRAW);
                }
                self.ibo = Some(ibo);
            }
        }

        Ok(CompiledGeometry {
            vertices: self.vbo.clone().expect("vbo compiled above"),
            indices: self.ibo.clone(),
        })
    }

    /// Ensure every named attribute (position excluded, it lives in the VBO)
    /// has an up-to-date GL buffer. Buffers are allocated once; dirty
    /// attributes refresh in place via `bufferSubData` while their length
    /// matches the allocation, and reallocate when it does not.
    pub fn upload_attributes(
        &mut self,
        gl: &WebGl2RenderingContext,
    ) -> Result<HashMap<String, (AttributeLayout, WebGlBuffer)>, RenderError> {
        let mut bound = HashMap::new();

        for (name, attr) in &self.attributes {
            if name == POSITION_ATTRIBUTE {
                continue;
            }

            match self.attribute_buffers.get_mut(name) {
                Some(cached) => {
                    if cached.dirty {
                        gl.bind_buffer(ARRAY_BUFFER, Some(&cached.buffer));
                        unsafe {
                            let array = Float32Array::view(&attr.buffer);
                            match plan_upload(
                                cached.allocated_len,
                                attr.buffer.len(),
                                attr.buffer_sub_data,
                            ) {
                                AttributeUpload::SubData => {
                                    gl.buffer_sub_data_with_i32_and_array_buffer_view(
                                        ARRAY_BUFFER,
                                        0,
                                        &array,
                                    );
                                }
                                AttributeUpload::Reallocate => {
                                    let usage = if attr.buffer_sub_data {
                                        DYNAMIC_DRAW
                                    } else {
                                        STATIC_DRAW
                                    };
                                    gl.buffer_data_with_array_buffer_view(
                                        ARRAY_BUFFER,
                                        &array,
                                        usage,
                                    );
                                }
                            }
                        }
                        cached.allocated_len = attr.buffer.len();
                        cached.dirty = false;
                    }
                }
                None => {
                    let buffer = gl
                        .create_buffer()
                        .ok_or(RenderError::ResourceAlloc("attribute buffer"))?;
                    gl.bind_buffer(ARRAY_BUFFER, Some(&buffer));
                    let usage = if attr.buffer_sub_data {
                        DYNAMIC_DRAW
                    } else {
                        STATIC_DRAW
                    };
                    unsafe {
                        let array = Float32Array::view(&attr.buffer);
                        gl.buffer_data_with_array_buffer_view(ARRAY_BUFFER, &array, usage);
                    }
                    self.attribute_buffers.insert(
                        name.clone(),
                        AttributeBuffer {
                            buffer,
                            allocated_len: attr.buffer.len(),
                            dirty: false,
                        },
                    );
                }
            }

            let cached = &self.attribute_buffers[name];
            bound.insert(name.clone(), (attr.layout(), cached.buffer.clone()));
        }

        Ok(bound)
    }

    /// Delete every GL buffer this geometry allocated and reset the caches.
    pub fn dispose(&mut self, gl: &WebGl2RenderingContext) {
        if let Some(vbo) = self.vbo.take() {
            gl.delete_buffer(Some(&vbo));
        }
        if let Some(ibo) = self.ibo.take() {
            gl.delete_buffer(Some(&ibo));
        }
        for (_, cached) in self.attribute_buffers.drain() {
            gl.delete_buffer(Some(&cached.buffer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_attribute_rejects_mismatched_lengths() {
        let mut geo = BufferGeometry::new(vec![0.0; 9], None);
        for (len, item_size) in [(7, 2), (5, 3), (10, 4), (1, 2)] {
            let result =
                geo.set_attribute("aUv", vec![0.0; len], item_size, AttributeOptions::default());
            assert!(
                matches!(result, Err(RenderError::AttributeSize { .. })),
                "len {len} / item_size {item_size} should be rejected"
            );
        }
    }

    #[test]
    fn set_attribute_accepts_divisible_lengths_and_overwrites() {
        let mut geo = BufferGeometry::new(vec![0.0; 9], None);
        geo.set_attribute("aUv", vec![0.0; 6], 2, AttributeOptions::default())
            .unwrap();
        geo.set_attribute("aUv", vec![1.0; 8], 2, AttributeOptions::default())
            .unwrap();
        let attr = geo.attribute("aUv").unwrap();
        assert_eq!(attr.buffer.len(), 8);
        assert_eq!(attr.item_size, 2);
    }

    #[test]
    fn position_attribute_is_reserved() {
        let mut geo = BufferGeometry::new(vec![0.0; 9], None);
        let result = geo.set_attribute(
            POSITION_ATTRIBUTE,
            vec![0.0; 3],
            3,
            AttributeOptions::default(),
        );
        assert!(matches!(result, Err(RenderError::AttributeReserved(_))));
    }

    #[test]
    fn position_attribute_backed_by_raw_buffer() {
        let raw = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let geo = BufferGeometry::new(raw.clone(), None);
        let pos = geo.attribute(POSITION_ATTRIBUTE).unwrap();
        assert_eq!(pos.buffer, raw);
        assert_eq!(pos.item_size, POSITION_ITEM_SIZE);
    }

    #[test]
    fn vertex_count_prefers_index_buffer() {
        let indexed = BufferGeometry::new(vec![0.0; 12], Some(vec![0, 1, 2, 2, 3, 0]));
        assert_eq!(indexed.vertex_count(), 6);

        let unindexed = BufferGeometry::new(vec![0.0; 12], None);
        assert_eq!(unindexed.vertex_count(), 4);
    }

    #[test]
    fn plane_has_six_vertices_and_quad_indices() {
        let plane = BufferGeometry::plane(2.0, 2.0);
        assert_eq!(plane.raw_buffer().len(), 18);
        assert_eq!(plane.index_buffer(), Some(&[0u16, 1, 2, 2, 3, 0][..]));
        assert_eq!(plane.vertex_count(), 6);
    }

    #[test]
    fn plane_corners_are_centered() {
        let plane = BufferGeometry::plane(4.0, 2.0);
        let raw = plane.raw_buffer();
        assert_eq!(&raw[0..3], &[-2.0, -1.0, 0.0]);
        assert_eq!(&raw[3..6], &[2.0, -1.0, 0.0]);
        assert_eq!(&raw[6..9], &[2.0, 1.0, 0.0]);
        assert_eq!(&raw[9..12], &[-2.0, 1.0, 0.0]);
    }

    #[test]
    fn sub_data_upload_only_while_lengths_match() {
        // Allocation-sized overwrite refreshes in place.
        assert_eq!(plan_upload(6, 6, true), AttributeUpload::SubData);
        // Grown or shrunk data would overflow or underfill the GL store.
        assert_eq!(plan_upload(6, 8, true), AttributeUpload::Reallocate);
        assert_eq!(plan_upload(8, 6, true), AttributeUpload::Reallocate);
        // Attributes without the sub-data flag always reallocate.
        assert_eq!(plan_upload(6, 6, false), AttributeUpload::Reallocate);
    }

    #[test]
    fn layout_carries_pointer_config_only() {
        let mut geo = BufferGeometry::new(vec![0.0; 9], None);
        geo.set_attribute(
            "aUv",
            vec![0.0; 8],
            2,
            AttributeOptions {
                stride: 16,
                offset: 8,
                buffer_sub_data: false,
            },
        )
        .unwrap();
        let layout = geo.attribute("aUv").unwrap().layout();
        assert_eq!(layout.item_size, 2);
        assert_eq!(layout.stride, 16);
        assert_eq!(layout.offset, 8);
    }

    #[test]
    fn attribute_options_default_to_tight_packing() {
        let opts = AttributeOptions::default();
        assert_eq!(opts.stride, 0);
        assert_eq!(opts.offset, 0);
        assert!(!opts.buffer_sub_data);
    }
}
