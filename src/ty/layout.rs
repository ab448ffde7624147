/*! Memory layout computations.

Pure size/alignment/stride rules for the three supported layouts:

- `Std140`: scalar align = size; vec2 align = 2×scalar; vec3/vec4 align =
  4×scalar; array strides round the element size up to vec4 alignment; matrix
  columns each occupy a vec4-aligned slot; struct alignment is the largest
  member alignment rounded up to vec4.
- `Std430`: as std140, except arrays and structs use natural alignment.
- `C`: natural-alignment packing identical to a host-language struct.
*/

use super::{ArraySize, MemoryLayout, Type, TypeCache, TypeInner, VectorSize};
use crate::arena::Handle;

/// Round `value` up to a multiple of `align`.
///
/// An alignment of zero (opaque types) leaves the value untouched.
pub const fn round_up(value: u32, align: u32) -> u32 {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

const VEC4_F32_ALIGN: u32 = 16;

fn vector_alignment(scalar_width: u32, size: VectorSize, layout: MemoryLayout) -> u32 {
    match layout {
        MemoryLayout::C => scalar_width,
        MemoryLayout::Std140 | MemoryLayout::Std430 => match size {
            VectorSize::Bi => 2 * scalar_width,
            VectorSize::Tri | VectorSize::Quad => 4 * scalar_width,
        },
    }
}

/// Byte size of `ty` under `layout`.
pub fn size(cache: &TypeCache, ty: Handle<Type>, layout: MemoryLayout) -> u32 {
    match *cache.lookup(ty) {
        TypeInner::Void => 0,
        TypeInner::Scalar(scalar) => scalar.width as u32,
        TypeInner::Vector { scalar, size } => scalar.width as u32 * size.count(),
        TypeInner::Matrix {
            scalar,
            columns,
            rows,
        } => {
            let column_size = scalar.width as u32 * rows.count();
            let slot = match layout {
                MemoryLayout::C => column_size,
                // Each column occupies one vec4-aligned slot.
                MemoryLayout::Std140 => round_up(column_size, 4 * scalar.width as u32),
                MemoryLayout::Std430 => {
                    round_up(column_size, vector_alignment(scalar.width as u32, rows, layout))
                }
            };
            slot * columns.count()
        }
        TypeInner::Array { base, size } => {
            let stride = element_stride(cache, base, layout);
            match size {
                ArraySize::Constant(count) => stride * count.get(),
                // A runtime array has to have at least one element.
                ArraySize::Dynamic => stride,
            }
        }
        TypeInner::Struct(def) => {
            let def = cache.struct_def(def);
            let align = struct_alignment(cache, ty, layout);
            let end = def
                .members
                .last()
                .map_or(0, |member| member.offset + member.size);
            round_up(end, align)
        }
        TypeInner::Pointer { .. } => 8,
        ref inner if inner.is_opaque() => 0,
        ref inner => inner
            .wrapped()
            .map_or(0, |wrapped| size(cache, wrapped, layout)),
    }
}

/// Byte alignment of `ty` under `layout`.
pub fn alignment(cache: &TypeCache, ty: Handle<Type>, layout: MemoryLayout) -> u32 {
    match *cache.lookup(ty) {
        TypeInner::Void => 1,
        TypeInner::Scalar(scalar) => scalar.width as u32,
        TypeInner::Vector { scalar, size } => {
            vector_alignment(scalar.width as u32, size, layout)
        }
        TypeInner::Matrix { scalar, rows, .. } => match layout {
            MemoryLayout::C => scalar.width as u32,
            MemoryLayout::Std140 => 4 * scalar.width as u32,
            MemoryLayout::Std430 => vector_alignment(scalar.width as u32, rows, layout),
        },
        TypeInner::Array { base, .. } => {
            let element = alignment(cache, base, layout);
            match layout {
                MemoryLayout::Std140 => round_up(element, VEC4_F32_ALIGN),
                MemoryLayout::Std430 | MemoryLayout::C => element,
            }
        }
        TypeInner::Struct(_) => struct_alignment(cache, ty, layout),
        TypeInner::Pointer { .. } => 8,
        ref inner if inner.is_opaque() => 1,
        ref inner => inner
            .wrapped()
            .map_or(1, |wrapped| alignment(cache, wrapped, layout)),
    }
}

fn struct_alignment(cache: &TypeCache, ty: Handle<Type>, layout: MemoryLayout) -> u32 {
    let TypeInner::Struct(def) = *cache.lookup(ty) else {
        unreachable!("struct_alignment on a non-struct type");
    };
    let natural = cache
        .struct_def(def)
        .members
        .iter()
        .map(|member| alignment(cache, member.ty, layout))
        .max()
        .unwrap_or(1);
    match layout {
        MemoryLayout::Std140 => round_up(natural, VEC4_F32_ALIGN),
        MemoryLayout::Std430 | MemoryLayout::C => natural,
    }
}

fn element_stride(cache: &TypeCache, element: Handle<Type>, layout: MemoryLayout) -> u32 {
    let element_size = size(cache, element, layout);
    match layout {
        MemoryLayout::Std140 => round_up(element_size, VEC4_F32_ALIGN),
        MemoryLayout::Std430 | MemoryLayout::C => {
            round_up(element_size, alignment(cache, element, layout))
        }
    }
}

/// Stride between consecutive elements of the array type `ty`.
pub fn array_stride(cache: &TypeCache, ty: Handle<Type>, layout: MemoryLayout) -> u32 {
    match *cache.lookup(ty) {
        TypeInner::Array { base, .. } => element_stride(cache, base, layout),
        _ => element_stride(cache, ty, layout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{Scalar, StructFlag};

    #[test]
    fn std140_struct_offsets() {
        // struct { float a; vec3 b; float c; } -> offsets 0, 16, 28, size 32.
        let mut cache = TypeCache::new();
        let f32_ty = cache.get_scalar(Scalar::F32);
        let vec3 = cache.get_vector(Scalar::F32, VectorSize::Tri);
        let def = cache.get_struct(MemoryLayout::Std140, "Data", StructFlag::None);
        cache.add_member(def, "a", f32_ty, None, None);
        cache.add_member(def, "b", vec3, None, None);
        cache.add_member(def, "c", f32_ty, None, None);

        let offsets: Vec<u32> = cache
            .struct_def(def)
            .members
            .iter()
            .map(|m| m.offset)
            .collect();
        assert_eq!(offsets, [0, 16, 28]);

        let ty = cache.struct_type(def);
        assert_eq!(size(&cache, ty, MemoryLayout::Std140), 32);
    }

    #[test]
    fn std430_natural_array_stride() {
        let mut cache = TypeCache::new();
        let f32_ty = cache.get_scalar(Scalar::F32);
        let arr = cache.get_array(f32_ty, ArraySize::constant(4));
        assert_eq!(array_stride(&cache, arr, MemoryLayout::Std430), 4);
        assert_eq!(array_stride(&cache, arr, MemoryLayout::Std140), 16);
        assert_eq!(size(&cache, arr, MemoryLayout::Std430), 16);
        assert_eq!(size(&cache, arr, MemoryLayout::Std140), 64);
    }

    #[test]
    fn size_is_multiple_of_alignment() {
        let mut cache = TypeCache::new();
        let mut candidates = vec![
            cache.get_scalar(Scalar::F32),
            cache.get_scalar(Scalar::F64),
            cache.get_scalar(Scalar::U8),
            cache.get_vector(Scalar::F32, VectorSize::Bi),
            cache.get_vector(Scalar::F16, VectorSize::Tri),
            cache.get_matrix(Scalar::F32, VectorSize::Tri, VectorSize::Tri),
        ];
        let vec2 = cache.get_vector(Scalar::F32, VectorSize::Bi);
        candidates.push(cache.get_array(vec2, ArraySize::constant(3)));
        for layout in [MemoryLayout::Std140, MemoryLayout::Std430, MemoryLayout::C] {
            for &ty in &candidates {
                let size = size(&cache, ty, layout);
                let align = alignment(&cache, ty, layout);
                assert_eq!(size % align, 0, "{ty:?} under {layout:?}");
            }
        }
    }

    #[test]
    fn offsets_are_aligned_and_non_decreasing() {
        let mut cache = TypeCache::new();
        let u32_ty = cache.get_scalar(Scalar::U32);
        let vec2 = cache.get_vector(Scalar::F32, VectorSize::Bi);
        let mat4 = cache.get_matrix(Scalar::F32, VectorSize::Quad, VectorSize::Quad);
        for layout in [MemoryLayout::Std140, MemoryLayout::Std430, MemoryLayout::C] {
            let def = cache.get_struct(layout, format!("S{layout:?}"), StructFlag::None);
            cache.add_member(def, "a", u32_ty, None, None);
            cache.add_member(def, "b", vec2, None, None);
            cache.add_member(def, "c", mat4, None, None);
            cache.add_member(def, "d", u32_ty, None, None);
            let mut last = 0;
            for member in &cache.struct_def(def).members {
                let align = alignment(&cache, member.ty, layout);
                assert!(member.offset >= last);
                assert_eq!(member.offset % align, 0);
                last = member.offset;
            }
        }
    }
}
