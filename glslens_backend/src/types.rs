/// GLSL type model used by the reflector
///
/// `TypeScope` turns `glsl` syntax trees into `GlslType`s. It remembers the
/// struct declarations and integral constants seen so far, which is what
/// array sizes and struct references resolve against.

use glsl::syntax::{
    ArraySpecifier, ArraySpecifierDimension, BinaryOp, Expr, StructFieldSpecifier,
    StructSpecifier, TypeSpecifier, TypeSpecifierNonArray, UnaryOp,
};
use rustc_hash::FxHashMap;
use crate::gl_types as gl;
use crate::layout::LayoutQualifiers;

// ===== TYPES =====

/// Scalar component type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Float,
    Double,
    Int,
    UInt,
    Bool,
}

impl ScalarKind {
    /// Size in bytes inside a buffer (bool is stored as a 32-bit value)
    pub fn size(self) -> u32 {
        match self {
            ScalarKind::Double => 8,
            _ => 4,
        }
    }
}

/// Resolved GLSL type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlslType {
    Scalar(ScalarKind),
    /// Vector of 2 to 4 components
    Vector(ScalarKind, u32),
    /// `columns` column vectors of `rows` components
    Matrix { scalar: ScalarKind, columns: u32, rows: u32 },
    /// Sampler or image, carrying its GL type code
    Opaque(u32),
    AtomicCounter,
    /// Array with all dimensions folded into one element count (0 = unsized)
    Array { element: Box<GlslType>, count: u32 },
    Struct { name: String, fields: Vec<StructField> },
}

/// Member of a struct or uniform block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub ty: GlslType,
    /// `layout(offset = N)` on the member
    pub explicit_offset: Option<u32>,
}

impl GlslType {
    /// Wrap `element` in an array, folding nested arrays into one count
    pub fn array_of(element: GlslType, count: u32) -> GlslType {
        match element {
            GlslType::Array { element, count: inner } => GlslType::Array {
                element,
                count: count.saturating_mul(inner),
            },
            element => GlslType::Array {
                element: Box::new(element),
                count,
            },
        }
    }

    /// GL type code; arrays report their element type, structs report 0
    pub fn type_code(&self) -> u32 {
        match self {
            GlslType::Scalar(scalar) => match scalar {
                ScalarKind::Float => gl::FLOAT,
                ScalarKind::Double => gl::DOUBLE,
                ScalarKind::Int => gl::INT,
                ScalarKind::UInt => gl::UNSIGNED_INT,
                ScalarKind::Bool => gl::BOOL,
            },
            GlslType::Vector(scalar, components) => vector_code(*scalar, *components),
            GlslType::Matrix { scalar, columns, rows } => matrix_code(*scalar, *columns, *rows),
            GlslType::Opaque(code) => *code,
            GlslType::AtomicCounter => gl::UNSIGNED_INT_ATOMIC_COUNTER,
            GlslType::Array { element, .. } => element.type_code(),
            GlslType::Struct { .. } => 0,
        }
    }

    /// Element count for arrays, 0 otherwise
    pub fn array_count(&self) -> u32 {
        match self {
            GlslType::Array { count, .. } => *count,
            _ => 0,
        }
    }

    /// Type with the array dimensions stripped
    pub fn element(&self) -> &GlslType {
        match self {
            GlslType::Array { element, .. } => element,
            other => other,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.element(), GlslType::Opaque(_) | GlslType::AtomicCounter)
    }
}

fn vector_code(scalar: ScalarKind, components: u32) -> u32 {
    match (scalar, components) {
        (ScalarKind::Float, 2) => gl::FLOAT_VEC2,
        (ScalarKind::Float, 3) => gl::FLOAT_VEC3,
        (ScalarKind::Float, _) => gl::FLOAT_VEC4,
        (ScalarKind::Double, 2) => gl::DOUBLE_VEC2,
        (ScalarKind::Double, 3) => gl::DOUBLE_VEC3,
        (ScalarKind::Double, _) => gl::DOUBLE_VEC4,
        (ScalarKind::Int, 2) => gl::INT_VEC2,
        (ScalarKind::Int, 3) => gl::INT_VEC3,
        (ScalarKind::Int, _) => gl::INT_VEC4,
        (ScalarKind::UInt, 2) => gl::UNSIGNED_INT_VEC2,
        (ScalarKind::UInt, 3) => gl::UNSIGNED_INT_VEC3,
        (ScalarKind::UInt, _) => gl::UNSIGNED_INT_VEC4,
        (ScalarKind::Bool, 2) => gl::BOOL_VEC2,
        (ScalarKind::Bool, 3) => gl::BOOL_VEC3,
        (ScalarKind::Bool, _) => gl::BOOL_VEC4,
    }
}

fn matrix_code(scalar: ScalarKind, columns: u32, rows: u32) -> u32 {
    let double = scalar == ScalarKind::Double;
    match (columns, rows, double) {
        (2, 2, false) => gl::FLOAT_MAT2,
        (3, 3, false) => gl::FLOAT_MAT3,
        (4, 4, false) => gl::FLOAT_MAT4,
        (2, 3, false) => gl::FLOAT_MAT2X3,
        (2, 4, false) => gl::FLOAT_MAT2X4,
        (3, 2, false) => gl::FLOAT_MAT3X2,
        (3, 4, false) => gl::FLOAT_MAT3X4,
        (4, 2, false) => gl::FLOAT_MAT4X2,
        (4, 3, false) => gl::FLOAT_MAT4X3,
        (2, 2, true) => gl::DOUBLE_MAT2,
        (3, 3, true) => gl::DOUBLE_MAT3,
        (4, 4, true) => gl::DOUBLE_MAT4,
        (2, 3, true) => gl::DOUBLE_MAT2X3,
        (2, 4, true) => gl::DOUBLE_MAT2X4,
        (3, 2, true) => gl::DOUBLE_MAT3X2,
        (3, 4, true) => gl::DOUBLE_MAT3X4,
        (4, 2, true) => gl::DOUBLE_MAT4X2,
        (_, _, true) => gl::DOUBLE_MAT4X3,
        (_, _, false) => gl::FLOAT_MAT4X3,
    }
}

// ===== SCOPE =====

/// Struct and constant declarations visible to later declarations
#[derive(Debug, Default)]
pub struct TypeScope {
    constants: FxHashMap<String, i64>,
    structs: FxHashMap<String, GlslType>,
}

impl TypeScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_constant(&mut self, name: &str, value: i64) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn constant(&self, name: &str) -> Option<i64> {
        self.constants.get(name).copied()
    }

    /// Evaluate an integral constant expression
    pub fn eval(&self, expr: &Expr) -> Option<i64> {
        match expr {
            Expr::IntConst(value) => Some(i64::from(*value)),
            Expr::UIntConst(value) => Some(i64::from(*value)),
            Expr::Variable(ident) => self.constant(&ident.0),
            Expr::Unary(UnaryOp::Minus, operand) => self.eval(operand).map(|v| -v),
            Expr::Unary(UnaryOp::Add, operand) => self.eval(operand),
            Expr::Binary(op, lhs, rhs) => {
                let (lhs, rhs) = (self.eval(lhs)?, self.eval(rhs)?);
                match op {
                    BinaryOp::Add => lhs.checked_add(rhs),
                    BinaryOp::Sub => lhs.checked_sub(rhs),
                    BinaryOp::Mult => lhs.checked_mul(rhs),
                    BinaryOp::Div => lhs.checked_div(rhs),
                    BinaryOp::Mod => lhs.checked_rem(rhs),
                    BinaryOp::LShift => u32::try_from(rhs).ok().and_then(|s| lhs.checked_shl(s)),
                    BinaryOp::RShift => u32::try_from(rhs).ok().and_then(|s| lhs.checked_shr(s)),
                    BinaryOp::BitAnd => Some(lhs & rhs),
                    BinaryOp::BitOr => Some(lhs | rhs),
                    BinaryOp::BitXor => Some(lhs ^ rhs),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Register a struct declaration and return its type
    pub fn define_struct(&mut self, spec: &StructSpecifier) -> Result<GlslType, String> {
        let name = spec.name.as_ref().map(|n| n.0.clone()).unwrap_or_default();
        let fields = self.fields(spec.fields.0.iter())?;
        let ty = GlslType::Struct { name: name.clone(), fields };
        if !name.is_empty() {
            self.structs.insert(name, ty.clone());
        }
        Ok(ty)
    }

    /// Resolve struct or block members, in declaration order
    pub fn fields<'a, I>(&mut self, specs: I) -> Result<Vec<StructField>, String>
    where
        I: IntoIterator<Item = &'a StructFieldSpecifier>,
    {
        let mut fields = Vec::new();
        for spec in specs {
            let base = self.resolve(&spec.ty)?;
            let explicit_offset = match &spec.qualifier {
                Some(qualifier) => LayoutQualifiers::parse(qualifier, self).offset,
                None => None,
            };
            for ident in spec.identifiers.0.iter() {
                fields.push(StructField {
                    name: ident.ident.0.clone(),
                    ty: self.apply_array(base.clone(), ident.array_spec.as_ref())?,
                    explicit_offset,
                });
            }
        }
        Ok(fields)
    }

    /// Resolve a type specifier, including its own array dimensions
    pub fn resolve(&mut self, ty: &TypeSpecifier) -> Result<GlslType, String> {
        let base = self.resolve_non_array(&ty.ty)?;
        self.apply_array(base, ty.array_specifier.as_ref())
    }

    /// Wrap `ty` in the dimensions of `spec`
    pub fn apply_array(&self, ty: GlslType, spec: Option<&ArraySpecifier>) -> Result<GlslType, String> {
        let Some(spec) = spec else {
            return Ok(ty);
        };

        let mut count: u32 = 1;
        for dimension in spec.dimensions.0.iter() {
            let size = match dimension {
                ArraySpecifierDimension::Unsized => 0,
                ArraySpecifierDimension::ExplicitlySized(expr) => {
                    let value = self
                        .eval(expr)
                        .ok_or_else(|| "array size must be a constant integral expression".to_string())?;
                    if value <= 0 {
                        return Err(format!("array size must be a positive integer, found {}", value));
                    }
                    u32::try_from(value).map_err(|_| format!("array size {} is too large", value))?
                }
            };
            count = count.saturating_mul(size);
        }

        Ok(GlslType::array_of(ty, count))
    }

    /// Resolve a type without array dimensions
    pub fn resolve_non_array(&mut self, ty: &TypeSpecifierNonArray) -> Result<GlslType, String> {
        use ScalarKind::*;
        use TypeSpecifierNonArray as T;

        let resolved = match ty {
            T::Void => return Err("'void' is not a valid variable type".to_string()),
            T::Bool => GlslType::Scalar(Bool),
            T::Int => GlslType::Scalar(Int),
            T::UInt => GlslType::Scalar(UInt),
            T::Float => GlslType::Scalar(Float),
            T::Double => GlslType::Scalar(Double),

            T::Vec2 => GlslType::Vector(Float, 2),
            T::Vec3 => GlslType::Vector(Float, 3),
            T::Vec4 => GlslType::Vector(Float, 4),
            T::DVec2 => GlslType::Vector(Double, 2),
            T::DVec3 => GlslType::Vector(Double, 3),
            T::DVec4 => GlslType::Vector(Double, 4),
            T::BVec2 => GlslType::Vector(Bool, 2),
            T::BVec3 => GlslType::Vector(Bool, 3),
            T::BVec4 => GlslType::Vector(Bool, 4),
            T::IVec2 => GlslType::Vector(Int, 2),
            T::IVec3 => GlslType::Vector(Int, 3),
            T::IVec4 => GlslType::Vector(Int, 4),
            T::UVec2 => GlslType::Vector(UInt, 2),
            T::UVec3 => GlslType::Vector(UInt, 3),
            T::UVec4 => GlslType::Vector(UInt, 4),

            T::Mat2 => matrix(Float, 2, 2),
            T::Mat3 => matrix(Float, 3, 3),
            T::Mat4 => matrix(Float, 4, 4),
            T::Mat23 => matrix(Float, 2, 3),
            T::Mat24 => matrix(Float, 2, 4),
            T::Mat32 => matrix(Float, 3, 2),
            T::Mat34 => matrix(Float, 3, 4),
            T::Mat42 => matrix(Float, 4, 2),
            T::Mat43 => matrix(Float, 4, 3),
            T::DMat2 => matrix(Double, 2, 2),
            T::DMat3 => matrix(Double, 3, 3),
            T::DMat4 => matrix(Double, 4, 4),
            T::DMat23 => matrix(Double, 2, 3),
            T::DMat24 => matrix(Double, 2, 4),
            T::DMat32 => matrix(Double, 3, 2),
            T::DMat34 => matrix(Double, 3, 4),
            T::DMat42 => matrix(Double, 4, 2),
            T::DMat43 => matrix(Double, 4, 3),

            T::Sampler1D => GlslType::Opaque(gl::SAMPLER_1D),
            T::Sampler2D => GlslType::Opaque(gl::SAMPLER_2D),
            T::Sampler3D => GlslType::Opaque(gl::SAMPLER_3D),
            T::SamplerCube => GlslType::Opaque(gl::SAMPLER_CUBE),
            T::Sampler2DRect => GlslType::Opaque(gl::SAMPLER_2D_RECT),
            T::Sampler1DArray => GlslType::Opaque(gl::SAMPLER_1D_ARRAY),
            T::Sampler2DArray => GlslType::Opaque(gl::SAMPLER_2D_ARRAY),
            T::SamplerBuffer => GlslType::Opaque(gl::SAMPLER_BUFFER),
            T::Sampler2DMS => GlslType::Opaque(gl::SAMPLER_2D_MULTISAMPLE),
            T::Sampler2DMSArray => GlslType::Opaque(gl::SAMPLER_2D_MULTISAMPLE_ARRAY),
            T::SamplerCubeArray => GlslType::Opaque(gl::SAMPLER_CUBE_MAP_ARRAY),
            T::Sampler1DShadow => GlslType::Opaque(gl::SAMPLER_1D_SHADOW),
            T::Sampler2DShadow => GlslType::Opaque(gl::SAMPLER_2D_SHADOW),
            T::Sampler2DRectShadow => GlslType::Opaque(gl::SAMPLER_2D_RECT_SHADOW),
            T::Sampler1DArrayShadow => GlslType::Opaque(gl::SAMPLER_1D_ARRAY_SHADOW),
            T::Sampler2DArrayShadow => GlslType::Opaque(gl::SAMPLER_2D_ARRAY_SHADOW),
            T::SamplerCubeShadow => GlslType::Opaque(gl::SAMPLER_CUBE_SHADOW),
            T::SamplerCubeArrayShadow => GlslType::Opaque(gl::SAMPLER_CUBE_MAP_ARRAY_SHADOW),

            T::ISampler1D => GlslType::Opaque(gl::INT_SAMPLER_1D),
            T::ISampler2D => GlslType::Opaque(gl::INT_SAMPLER_2D),
            T::ISampler3D => GlslType::Opaque(gl::INT_SAMPLER_3D),
            T::ISamplerCube => GlslType::Opaque(gl::INT_SAMPLER_CUBE),
            T::ISampler2DRect => GlslType::Opaque(gl::INT_SAMPLER_2D_RECT),
            T::ISampler1DArray => GlslType::Opaque(gl::INT_SAMPLER_1D_ARRAY),
            T::ISampler2DArray => GlslType::Opaque(gl::INT_SAMPLER_2D_ARRAY),
            T::ISamplerBuffer => GlslType::Opaque(gl::INT_SAMPLER_BUFFER),
            T::ISampler2DMS => GlslType::Opaque(gl::INT_SAMPLER_2D_MULTISAMPLE),
            T::ISampler2DMSArray => GlslType::Opaque(gl::INT_SAMPLER_2D_MULTISAMPLE_ARRAY),
            T::ISamplerCubeArray => GlslType::Opaque(gl::INT_SAMPLER_CUBE_MAP_ARRAY),

            T::USampler1D => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_1D),
            T::USampler2D => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_2D),
            T::USampler3D => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_3D),
            T::USamplerCube => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_CUBE),
            T::USampler2DRect => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_2D_RECT),
            T::USampler1DArray => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_1D_ARRAY),
            T::USampler2DArray => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_2D_ARRAY),
            T::USamplerBuffer => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_BUFFER),
            T::USampler2DMS => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_2D_MULTISAMPLE),
            T::USampler2DMSArray => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_2D_MULTISAMPLE_ARRAY),
            T::USamplerCubeArray => GlslType::Opaque(gl::UNSIGNED_INT_SAMPLER_CUBE_MAP_ARRAY),

            T::Image1D => GlslType::Opaque(gl::IMAGE_1D),
            T::Image2D => GlslType::Opaque(gl::IMAGE_2D),
            T::Image3D => GlslType::Opaque(gl::IMAGE_3D),
            T::ImageCube => GlslType::Opaque(gl::IMAGE_CUBE),
            T::Image2DRect => GlslType::Opaque(gl::IMAGE_2D_RECT),
            T::Image1DArray => GlslType::Opaque(gl::IMAGE_1D_ARRAY),
            T::Image2DArray => GlslType::Opaque(gl::IMAGE_2D_ARRAY),
            T::ImageBuffer => GlslType::Opaque(gl::IMAGE_BUFFER),
            T::Image2DMS => GlslType::Opaque(gl::IMAGE_2D_MULTISAMPLE),
            T::Image2DMSArray => GlslType::Opaque(gl::IMAGE_2D_MULTISAMPLE_ARRAY),
            T::ImageCubeArray => GlslType::Opaque(gl::IMAGE_CUBE_MAP_ARRAY),

            T::IImage1D => GlslType::Opaque(gl::INT_IMAGE_1D),
            T::IImage2D => GlslType::Opaque(gl::INT_IMAGE_2D),
            T::IImage3D => GlslType::Opaque(gl::INT_IMAGE_3D),
            T::IImageCube => GlslType::Opaque(gl::INT_IMAGE_CUBE),
            T::IImage2DRect => GlslType::Opaque(gl::INT_IMAGE_2D_RECT),
            T::IImage1DArray => GlslType::Opaque(gl::INT_IMAGE_1D_ARRAY),
            T::IImage2DArray => GlslType::Opaque(gl::INT_IMAGE_2D_ARRAY),
            T::IImageBuffer => GlslType::Opaque(gl::INT_IMAGE_BUFFER),
            T::IImage2DMS => GlslType::Opaque(gl::INT_IMAGE_2D_MULTISAMPLE),
            T::IImage2DMSArray => GlslType::Opaque(gl::INT_IMAGE_2D_MULTISAMPLE_ARRAY),
            T::IImageCubeArray => GlslType::Opaque(gl::INT_IMAGE_CUBE_MAP_ARRAY),

            T::UImage1D => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_1D),
            T::UImage2D => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_2D),
            T::UImage3D => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_3D),
            T::UImageCube => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_CUBE),
            T::UImage2DRect => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_2D_RECT),
            T::UImage1DArray => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_1D_ARRAY),
            T::UImage2DArray => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_2D_ARRAY),
            T::UImageBuffer => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_BUFFER),
            T::UImage2DMS => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_2D_MULTISAMPLE),
            T::UImage2DMSArray => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_2D_MULTISAMPLE_ARRAY),
            T::UImageCubeArray => GlslType::Opaque(gl::UNSIGNED_INT_IMAGE_CUBE_MAP_ARRAY),

            T::AtomicUInt => GlslType::AtomicCounter,

            T::Struct(spec) => self.define_struct(spec)?,
            T::TypeName(name) => self
                .structs
                .get(&name.0)
                .cloned()
                .ok_or_else(|| format!("'{}' : undeclared type", name.0))?,
        };

        Ok(resolved)
    }
}

fn matrix(scalar: ScalarKind, columns: u32, rows: u32) -> GlslType {
    GlslType::Matrix { scalar, columns, rows }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
