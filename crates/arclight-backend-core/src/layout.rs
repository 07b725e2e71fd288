//! Buffer layout computation (std140 / std430).
//!
//! Both backends need identical member offsets for externally visible
//! buffer data, so the rules live here rather than in either writer:
//!
//! - scalars: natural 4-byte size and alignment;
//! - vec2: 8-byte alignment; vec3 and vec4: 16-byte alignment
//!   (vec3 still occupies 12 bytes — the padding is the next member's
//!   problem, as Scenario-style `{vec3, float}` packing relies on);
//! - matrices: column-major arrays of columns, each column aligned as a
//!   4-component vector;
//! - arrays and structs: under std140 the element stride and struct
//!   alignment round up to 16 bytes; std430 keeps natural alignment.

use arclight_ast::{ArraySize, Handle, Module, Type, TypeInner, VectorSize};

/// Which layout rule set to apply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StructLayout {
    /// std140: uniform buffer rules.
    Uniform,
    /// std430: storage buffer rules.
    Storage,
}

/// A laid-out struct member.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberLayout {
    /// Member name (empty for a lone non-struct external).
    pub name: String,
    /// The member's declared type.
    pub ty: Handle<Type>,
    /// Byte offset from the start of the buffer.
    pub offset: u32,
    /// Size in bytes, without trailing padding.
    pub size: u32,
    /// Required alignment in bytes.
    pub align: u32,
}

/// The computed layout of a buffer-backed type.
#[derive(Clone, Debug)]
pub struct BufferLayout {
    /// Members in declaration order with resolved offsets.
    pub members: Vec<MemberLayout>,
    /// Total size including trailing padding to the struct alignment.
    pub span: u32,
    /// The whole buffer's alignment.
    pub align: u32,
}

/// Layout failures (types that cannot live in a buffer).
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The type has no buffer representation (samplers, void).
    #[error("type cannot be laid out in a buffer: {0}")]
    NotLayoutable(String),
    /// An array length is still an unresolved option.
    #[error("array length is not resolved (option `{0}` still symbolic)")]
    UnresolvedArrayLength(String),
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

fn vector_align(size: VectorSize) -> u32 {
    match size {
        VectorSize::Bi => 8,
        // vec3 rounds up to the next power-of-two alignment class.
        VectorSize::Tri | VectorSize::Quad => 16,
    }
}

/// Computes `(size, align)` of a type under the given rules.
pub fn size_and_align(
    module: &Module,
    ty: Handle<Type>,
    layout: StructLayout,
) -> Result<(u32, u32), LayoutError> {
    match &module.types[ty].inner {
        TypeInner::Void => Err(LayoutError::NotLayoutable("void".into())),
        TypeInner::Sampler { .. } => Err(LayoutError::NotLayoutable("sampler".into())),
        TypeInner::Scalar(p) => Ok((p.size(), p.size())),
        TypeInner::Vector { size, scalar } => {
            Ok((*size as u32 * scalar.size(), vector_align(*size)))
        }
        TypeInner::Matrix { columns, rows, scalar } => {
            // Each column padded to vec4 alignment.
            let col_stride = round_up(*rows as u32 * scalar.size(), 16);
            Ok((*columns as u32 * col_stride, 16))
        }
        TypeInner::Array { base, size } => {
            let count = match size {
                ArraySize::Constant(n) => *n,
                ArraySize::Implicit => 0,
                ArraySize::Option(name) => {
                    return Err(LayoutError::UnresolvedArrayLength(name.clone()))
                }
            };
            let (elem_size, elem_align) = size_and_align(module, *base, layout)?;
            let stride = match layout {
                StructLayout::Uniform => round_up(elem_size.max(elem_align), 16),
                StructLayout::Storage => round_up(elem_size, elem_align),
            };
            let align = match layout {
                StructLayout::Uniform => elem_align.max(16),
                StructLayout::Storage => elem_align,
            };
            Ok((stride * count, align))
        }
        TypeInner::Struct { .. } => {
            let computed = compute(module, ty, layout)?;
            Ok((computed.span, computed.align))
        }
    }
}

/// Lays out a struct type's members.
///
/// Scalars and vectors may also be laid out directly (a one-member
/// anonymous block), which is how lone externals are emitted.
pub fn compute(
    module: &Module,
    ty: Handle<Type>,
    layout: StructLayout,
) -> Result<BufferLayout, LayoutError> {
    let members = match &module.types[ty].inner {
        TypeInner::Struct { members } => members.clone(),
        _ => {
            let (size, align) = size_and_align(module, ty, layout)?;
            return Ok(BufferLayout {
                members: vec![MemberLayout {
                    name: String::new(),
                    ty,
                    offset: 0,
                    size,
                    align,
                }],
                span: round_up(size, align),
                align,
            });
        }
    };

    let mut laid_out = Vec::with_capacity(members.len());
    let mut offset = 0;
    let mut struct_align = match layout {
        StructLayout::Uniform => 16,
        StructLayout::Storage => 4,
    };
    for member in &members {
        let (size, align) = size_and_align(module, member.ty, layout)?;
        offset = round_up(offset, align);
        laid_out.push(MemberLayout {
            name: member.name.clone(),
            ty: member.ty,
            offset,
            size,
            align,
        });
        offset += size;
        struct_align = struct_align.max(align);
    }

    Ok(BufferLayout {
        members: laid_out,
        span: round_up(offset, struct_align),
        align: struct_align,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arclight_ast::Statement;
    use arclight_parser::parse;

    fn struct_layout(source: &str, name: &str, layout: StructLayout) -> BufferLayout {
        let module = parse(source).unwrap();
        let ty = match module.declaration(name) {
            Some(Statement::StructDeclaration { ty, .. }) => *ty,
            other => panic!("expected struct declaration, got {other:?}"),
        };
        compute(&module, ty, layout).unwrap()
    }

    #[test]
    fn vec3_float_vec4_packing() {
        // The documented layout scenario: a float packs into the tail
        // of a vec3 slot, the following vec4 starts 16-aligned.
        let l = struct_layout(
            "struct S { vec3f a; float b; vec4f c; }",
            "S",
            StructLayout::Uniform,
        );
        let offsets: Vec<_> = l.members.iter().map(|m| (m.name.as_str(), m.offset)).collect();
        assert_eq!(offsets, vec![("a", 0), ("b", 12), ("c", 16)]);
        assert_eq!(l.span, 32);
    }

    #[test]
    fn scalar_pairs_pack_naturally() {
        let l = struct_layout(
            "struct S { float a; float b; vec2f c; }",
            "S",
            StructLayout::Uniform,
        );
        let offsets: Vec<_> = l.members.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(l.span, 16);
    }

    #[test]
    fn matrix_columns_are_vec4_aligned() {
        let module = parse("struct S { mat3f m; }").unwrap();
        let ty = match module.declaration("S") {
            Some(Statement::StructDeclaration { ty, .. }) => *ty,
            _ => unreachable!(),
        };
        let l = compute(&module, ty, StructLayout::Uniform).unwrap();
        // 3 columns x 16-byte stride.
        assert_eq!(l.members[0].size, 48);
        assert_eq!(l.members[0].align, 16);
    }

    #[test]
    fn uniform_array_stride_rounds_to_16() {
        let module = parse("external float[4] weights;").unwrap();
        let ty = match module.declaration("weights") {
            Some(Statement::ExternalDeclaration { ty, .. }) => *ty,
            _ => unreachable!(),
        };
        let (size, align) = size_and_align(&module, ty, StructLayout::Uniform).unwrap();
        assert_eq!(size, 64); // 4 elements x 16-byte stride
        assert_eq!(align, 16);

        let (storage_size, storage_align) =
            size_and_align(&module, ty, StructLayout::Storage).unwrap();
        assert_eq!(storage_size, 16); // tight 4-byte stride
        assert_eq!(storage_align, 4);
    }

    #[test]
    fn struct_span_rounds_to_alignment() {
        let l = struct_layout("struct S { float a; }", "S", StructLayout::Uniform);
        assert_eq!(l.span, 16);
        let l = struct_layout("struct S { float a; }", "S", StructLayout::Storage);
        assert_eq!(l.span, 4);
    }

    #[test]
    fn unresolved_option_length_is_an_error() {
        let module = parse("option uint N;\nexternal float[N] weights;").unwrap();
        let ty = match module.declaration("weights") {
            Some(Statement::ExternalDeclaration { ty, .. }) => *ty,
            _ => unreachable!(),
        };
        match size_and_align(&module, ty, StructLayout::Uniform) {
            Err(LayoutError::UnresolvedArrayLength(name)) => assert_eq!(name, "N"),
            other => panic!("expected UnresolvedArrayLength, got {other:?}"),
        }
    }

    #[test]
    fn sampler_is_not_layoutable() {
        let module = parse("external sampler2Df tex;").unwrap();
        let ty = match module.declaration("tex") {
            Some(Statement::ExternalDeclaration { ty, .. }) => *ty,
            _ => unreachable!(),
        };
        assert!(matches!(
            size_and_align(&module, ty, StructLayout::Uniform),
            Err(LayoutError::NotLayoutable(_))
        ));
    }
}
