//! OpenGL type enums reported as uniform type codes
//!
//! Values come from the OpenGL registry (`GL_FLOAT_VEC4`, `GL_SAMPLER_2D`, ...).

// ===== SCALARS AND VECTORS =====

pub const INT: u32 = 0x1404;
pub const UNSIGNED_INT: u32 = 0x1405;
pub const FLOAT: u32 = 0x1406;
pub const DOUBLE: u32 = 0x140A;
pub const BOOL: u32 = 0x8B56;

pub const FLOAT_VEC2: u32 = 0x8B50;
pub const FLOAT_VEC3: u32 = 0x8B51;
pub const FLOAT_VEC4: u32 = 0x8B52;
pub const INT_VEC2: u32 = 0x8B53;
pub const INT_VEC3: u32 = 0x8B54;
pub const INT_VEC4: u32 = 0x8B55;
pub const BOOL_VEC2: u32 = 0x8B57;
pub const BOOL_VEC3: u32 = 0x8B58;
pub const BOOL_VEC4: u32 = 0x8B59;
pub const UNSIGNED_INT_VEC2: u32 = 0x8DC6;
pub const UNSIGNED_INT_VEC3: u32 = 0x8DC7;
pub const UNSIGNED_INT_VEC4: u32 = 0x8DC8;
pub const DOUBLE_VEC2: u32 = 0x8FFC;
pub const DOUBLE_VEC3: u32 = 0x8FFD;
pub const DOUBLE_VEC4: u32 = 0x8FFE;

// ===== MATRICES =====

pub const FLOAT_MAT2: u32 = 0x8B5A;
pub const FLOAT_MAT3: u32 = 0x8B5B;
pub const FLOAT_MAT4: u32 = 0x8B5C;
pub const FLOAT_MAT2X3: u32 = 0x8B65;
pub const FLOAT_MAT2X4: u32 = 0x8B66;
pub const FLOAT_MAT3X2: u32 = 0x8B67;
pub const FLOAT_MAT3X4: u32 = 0x8B68;
pub const FLOAT_MAT4X2: u32 = 0x8B69;
pub const FLOAT_MAT4X3: u32 = 0x8B6A;

pub const DOUBLE_MAT2: u32 = 0x8F46;
pub const DOUBLE_MAT3: u32 = 0x8F47;
pub const DOUBLE_MAT4: u32 = 0x8F48;
pub const DOUBLE_MAT2X3: u32 = 0x8F49;
pub const DOUBLE_MAT2X4: u32 = 0x8F4A;
pub const DOUBLE_MAT3X2: u32 = 0x8F4B;
pub const DOUBLE_MAT3X4: u32 = 0x8F4C;
pub const DOUBLE_MAT4X2: u32 = 0x8F4D;
pub const DOUBLE_MAT4X3: u32 = 0x8F4E;

// ===== SAMPLERS =====

pub const SAMPLER_1D: u32 = 0x8B5D;
pub const SAMPLER_2D: u32 = 0x8B5E;
pub const SAMPLER_3D: u32 = 0x8B5F;
pub const SAMPLER_CUBE: u32 = 0x8B60;
pub const SAMPLER_1D_SHADOW: u32 = 0x8B61;
pub const SAMPLER_2D_SHADOW: u32 = 0x8B62;
pub const SAMPLER_2D_RECT: u32 = 0x8B63;
pub const SAMPLER_2D_RECT_SHADOW: u32 = 0x8B64;
pub const SAMPLER_1D_ARRAY: u32 = 0x8DC0;
pub const SAMPLER_2D_ARRAY: u32 = 0x8DC1;
pub const SAMPLER_BUFFER: u32 = 0x8DC2;
pub const SAMPLER_1D_ARRAY_SHADOW: u32 = 0x8DC3;
pub const SAMPLER_2D_ARRAY_SHADOW: u32 = 0x8DC4;
pub const SAMPLER_CUBE_SHADOW: u32 = 0x8DC5;
pub const SAMPLER_CUBE_MAP_ARRAY: u32 = 0x900C;
pub const SAMPLER_CUBE_MAP_ARRAY_SHADOW: u32 = 0x900D;
pub const SAMPLER_2D_MULTISAMPLE: u32 = 0x9108;
pub const SAMPLER_2D_MULTISAMPLE_ARRAY: u32 = 0x910B;

pub const INT_SAMPLER_1D: u32 = 0x8DC9;
pub const INT_SAMPLER_2D: u32 = 0x8DCA;
pub const INT_SAMPLER_3D: u32 = 0x8DCB;
pub const INT_SAMPLER_CUBE: u32 = 0x8DCC;
pub const INT_SAMPLER_2D_RECT: u32 = 0x8DCD;
pub const INT_SAMPLER_1D_ARRAY: u32 = 0x8DCE;
pub const INT_SAMPLER_2D_ARRAY: u32 = 0x8DCF;
pub const INT_SAMPLER_BUFFER: u32 = 0x8DD0;
pub const INT_SAMPLER_CUBE_MAP_ARRAY: u32 = 0x900E;
pub const INT_SAMPLER_2D_MULTISAMPLE: u32 = 0x9109;
pub const INT_SAMPLER_2D_MULTISAMPLE_ARRAY: u32 = 0x910C;

pub const UNSIGNED_INT_SAMPLER_1D: u32 = 0x8DD1;
pub const UNSIGNED_INT_SAMPLER_2D: u32 = 0x8DD2;
pub const UNSIGNED_INT_SAMPLER_3D: u32 = 0x8DD3;
pub const UNSIGNED_INT_SAMPLER_CUBE: u32 = 0x8DD4;
pub const UNSIGNED_INT_SAMPLER_2D_RECT: u32 = 0x8DD5;
pub const UNSIGNED_INT_SAMPLER_1D_ARRAY: u32 = 0x8DD6;
pub const UNSIGNED_INT_SAMPLER_2D_ARRAY: u32 = 0x8DD7;
pub const UNSIGNED_INT_SAMPLER_BUFFER: u32 = 0x8DD8;
pub const UNSIGNED_INT_SAMPLER_CUBE_MAP_ARRAY: u32 = 0x900F;
pub const UNSIGNED_INT_SAMPLER_2D_MULTISAMPLE: u32 = 0x910A;
pub const UNSIGNED_INT_SAMPLER_2D_MULTISAMPLE_ARRAY: u32 = 0x910D;

// ===== IMAGES =====

pub const IMAGE_1D: u32 = 0x904C;
pub const IMAGE_2D: u32 = 0x904D;
pub const IMAGE_3D: u32 = 0x904E;
pub const IMAGE_2D_RECT: u32 = 0x904F;
pub const IMAGE_CUBE: u32 = 0x9050;
pub const IMAGE_BUFFER: u32 = 0x9051;
pub const IMAGE_1D_ARRAY: u32 = 0x9052;
pub const IMAGE_2D_ARRAY: u32 = 0x9053;
pub const IMAGE_CUBE_MAP_ARRAY: u32 = 0x9054;
pub const IMAGE_2D_MULTISAMPLE: u32 = 0x9055;
pub const IMAGE_2D_MULTISAMPLE_ARRAY: u32 = 0x9056;

pub const INT_IMAGE_1D: u32 = 0x9057;
pub const INT_IMAGE_2D: u32 = 0x9058;
pub const INT_IMAGE_3D: u32 = 0x9059;
pub const INT_IMAGE_2D_RECT: u32 = 0x905A;
pub const INT_IMAGE_CUBE: u32 = 0x905B;
pub const INT_IMAGE_BUFFER: u32 = 0x905C;
pub const INT_IMAGE_1D_ARRAY: u32 = 0x905D;
pub const INT_IMAGE_2D_ARRAY: u32 = 0x905E;
pub const INT_IMAGE_CUBE_MAP_ARRAY: u32 = 0x905F;
pub const INT_IMAGE_2D_MULTISAMPLE: u32 = 0x9060;
pub const INT_IMAGE_2D_MULTISAMPLE_ARRAY: u32 = 0x9061;

pub const UNSIGNED_INT_IMAGE_1D: u32 = 0x9062;
pub const UNSIGNED_INT_IMAGE_2D: u32 = 0x9063;
pub const UNSIGNED_INT_IMAGE_3D: u32 = 0x9064;
pub const UNSIGNED_INT_IMAGE_2D_RECT: u32 = 0x9065;
pub const UNSIGNED_INT_IMAGE_CUBE: u32 = 0x9066;
pub const UNSIGNED_INT_IMAGE_BUFFER: u32 = 0x9067;
pub const UNSIGNED_INT_IMAGE_1D_ARRAY: u32 = 0x9068;
pub const UNSIGNED_INT_IMAGE_2D_ARRAY: u32 = 0x9069;
pub const UNSIGNED_INT_IMAGE_CUBE_MAP_ARRAY: u32 = 0x906A;
pub const UNSIGNED_INT_IMAGE_2D_MULTISAMPLE: u32 = 0x906B;
pub const UNSIGNED_INT_IMAGE_2D_MULTISAMPLE_ARRAY: u32 = 0x906C;

// ===== ATOMICS =====

pub const UNSIGNED_INT_ATOMIC_COUNTER: u32 = 0x92DB;
