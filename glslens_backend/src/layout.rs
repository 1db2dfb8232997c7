/// Buffer layout rules for uniform blocks
///
/// Offsets follow std140 for uniform blocks unless `layout(std430)` is given:
/// - std140: arrays, matrix columns and structs are aligned to at least 16
/// - std430: natural alignment (max of member alignments)
///
/// Layout qualifiers (`binding`, `offset`, packing) are parsed here as well.

use glsl::syntax::{LayoutQualifierSpec, TypeQualifier, TypeQualifierSpec};
use crate::types::{GlslType, StructField, TypeScope};

/// Packing rules of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Packing {
    #[default]
    Std140,
    Std430,
}

/// Round `offset` up to the next multiple of `align` (a power of two)
///
/// `None` when the result does not fit in a `u32`.
pub fn align_up(offset: u32, align: u32) -> Option<u32> {
    Some(offset.checked_add(align - 1)? & !(align - 1))
}

impl Packing {
    /// Base alignment in bytes
    pub fn alignment(self, ty: &GlslType) -> u32 {
        match ty {
            GlslType::Scalar(scalar) => scalar.size(),
            GlslType::Vector(scalar, components) => match components {
                2 => scalar.size() * 2,
                _ => scalar.size() * 4,
            },
            GlslType::Matrix { scalar, rows, .. } => {
                self.alignment(&GlslType::Array {
                    element: Box::new(GlslType::Vector(*scalar, *rows)),
                    count: 1,
                })
            }
            GlslType::Opaque(_) | GlslType::AtomicCounter => 4,
            GlslType::Array { element, .. } => self.round(self.alignment(element)),
            GlslType::Struct { fields, .. } => {
                let max_field_align = fields
                    .iter()
                    .map(|field| self.alignment(&field.ty))
                    .max()
                    .unwrap_or(4);
                self.round(max_field_align)
            }
        }
    }

    /// Size in bytes, including the trailing padding of arrays and structs
    ///
    /// `None` when the size does not fit in a `u32` or a struct has an
    /// invalid member layout.
    pub fn size(self, ty: &GlslType) -> Option<u32> {
        match ty {
            GlslType::Scalar(scalar) => Some(scalar.size()),
            GlslType::Vector(scalar, components) => scalar.size().checked_mul(*components),
            GlslType::Matrix { scalar, columns, rows } => {
                self.array_stride(&GlslType::Vector(*scalar, *rows))?.checked_mul(*columns)
            }
            GlslType::Opaque(_) | GlslType::AtomicCounter => Some(4),
            GlslType::Array { element, count } => self.array_stride(element)?.checked_mul(*count),
            GlslType::Struct { fields, .. } => {
                let offsets = self.member_offsets(fields).ok()?;
                let end = match fields.iter().zip(offsets).last() {
                    Some((last, offset)) => offset.checked_add(self.size(&last.ty)?)?,
                    None => 0,
                };
                align_up(end, self.alignment(ty))
            }
        }
    }

    /// Distance in bytes between consecutive elements of an array of `element`
    pub fn array_stride(self, element: &GlslType) -> Option<u32> {
        let align = self.round(self.alignment(element));
        align_up(self.size(element)?, align)
    }

    /// Offsets of `fields` relative to the start of their struct or block
    ///
    /// An explicit `layout(offset = N)` must be aligned and must not overlap
    /// the previous member. Every member must end below 4 GiB.
    pub fn member_offsets(self, fields: &[StructField]) -> Result<Vec<u32>, String> {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut current_offset: u32 = 0;

        for field in fields {
            let too_large = || format!("'{}' : member does not fit in a 4 GiB block", field.name);
            let align = self.alignment(&field.ty);
            let offset = match field.explicit_offset {
                Some(offset) => {
                    if offset % align != 0 {
                        return Err(format!(
                            "'{}' : layout offset {} is not aligned to {}",
                            field.name, offset, align
                        ));
                    }
                    if offset < current_offset {
                        return Err(format!(
                            "'{}' : layout offset {} overlaps a previous member",
                            field.name, offset
                        ));
                    }
                    offset
                }
                None => align_up(current_offset, align).ok_or_else(too_large)?,
            };
            offsets.push(offset);
            current_offset = self
                .size(&field.ty)
                .and_then(|size| offset.checked_add(size))
                .ok_or_else(too_large)?;
        }

        Ok(offsets)
    }

    /// std140 rounds array and struct alignment up to a vec4
    fn round(self, align: u32) -> u32 {
        match self {
            Packing::Std140 => align.max(16),
            Packing::Std430 => align,
        }
    }
}

// ===== LAYOUT QUALIFIERS =====

/// The subset of `layout(...)` that affects reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutQualifiers {
    pub binding: Option<i32>,
    pub offset: Option<u32>,
    pub packing: Option<Packing>,
}

impl LayoutQualifiers {
    /// Collect layout ids from every `layout(...)` in `qualifier`
    ///
    /// Ids are case-insensitive; unknown ids and non-constant values are ignored.
    pub fn parse(qualifier: &TypeQualifier, scope: &TypeScope) -> Self {
        let mut layout = Self::default();

        for spec in qualifier.qualifiers.0.iter() {
            let TypeQualifierSpec::Layout(layout_qualifier) = spec else {
                continue;
            };
            for id in layout_qualifier.ids.0.iter() {
                let LayoutQualifierSpec::Identifier(name, value) = id else {
                    continue;
                };
                let value = value.as_ref().and_then(|expr| scope.eval(expr));
                match name.0.to_ascii_lowercase().as_str() {
                    "binding" => layout.binding = value.and_then(|v| i32::try_from(v).ok()),
                    "offset" => layout.offset = value.and_then(|v| u32::try_from(v).ok()),
                    "std140" => layout.packing = Some(Packing::Std140),
                    "std430" => layout.packing = Some(Packing::Std430),
                    _ => {}
                }
            }
        }

        layout
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
