use bytemuck::{Pod, Zeroable};

/// Matches the layout the vertex shader reads through its buffer
/// reference: two vec4s per vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex {
        position: [0.5, 0.5, 0.0, 1.0],
        color: [1.0, 0.0, 0.0, 1.0],
    },
    Vertex {
        position: [-0.5, 0.5, 0.0, 1.0],
        color: [0.0, 1.0, 0.0, 1.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0, 1.0],
        color: [0.0, 0.0, 1.0, 1.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0, 1.0],
        color: [1.0, 1.0, 0.0, 1.0],
    },
];

/// Two counter-clockwise triangles covering the quad.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn vertex_is_two_vec4s() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::align_of::<Vertex>(), 4);
    }

    #[test]
    fn quad_draw_shape() {
        assert_eq!(QUAD_INDICES.len(), 6);
        assert_eq!(QUAD_INDICES.len() / 3, 2);

        let unique: HashSet<u32> = QUAD_INDICES.iter().copied().collect();
        assert_eq!(unique.len(), 4);
        assert!(unique.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }

    #[test]
    fn byte_payloads_match_cast_slice() {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        let index_bytes: &[u8] = bytemuck::cast_slice(&QUAD_INDICES);
        assert_eq!(vertex_bytes.len(), 4 * 32);
        assert_eq!(index_bytes.len(), 6 * 4);
    }
}
