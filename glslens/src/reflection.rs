/// Reflection records returned by the backend
///
/// `ReflectionRecord` mirrors everything the backend knows about one active
/// uniform (layout included). `UniformSummary` is the smaller, externally
/// promised view a renderer needs to bind values by name.

/// Sentinel for `ReflectionRecord::counter_index` on non-atomic uniforms
pub const NO_COUNTER: i32 = -1;

/// Sentinel for `ReflectionRecord::binding_index` when no binding was declared
pub const NO_BINDING: i32 = -1;

/// Full reflection data for one uniform or uniform block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionRecord {
    /// Declared name (empty for anonymous blocks)
    pub name: String,
    /// Byte offset inside the parent block (std140/std430)
    pub offset: u32,
    /// Fundamental type code (OpenGL type enum), passed through untouched
    pub type_code: u32,
    /// Size in bytes
    pub size: u32,
    /// Explicit binding of the uniform or its block, `NO_BINDING` otherwise
    pub binding_index: i32,
    /// Atomic counter buffer index, `NO_COUNTER` for other types
    pub counter_index: i32,
    /// Number of members (blocks and structs), 0 otherwise
    pub num_members: u32,
    /// Stride between array elements in bytes
    pub array_stride: u32,
    /// Element count of the outermost array dimension of the block member
    pub top_level_array_size: u32,
    /// Stride of the outermost array dimension, meaningful when `top_level_array_size > 1`
    pub top_level_array_stride: u32,
    /// Element count (0 = not an array, arrays of arrays are flattened)
    pub array_size: u32,
}

impl ReflectionRecord {
    /// Record for a non-array, non-block uniform of the given type
    pub fn new(name: impl Into<String>, type_code: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            offset: 0,
            type_code,
            size,
            binding_index: NO_BINDING,
            counter_index: NO_COUNTER,
            num_members: 0,
            array_stride: 0,
            top_level_array_size: 0,
            top_level_array_stride: 0,
            array_size: 0,
        }
    }

    pub fn is_array(&self) -> bool {
        self.array_size > 0
    }

    pub fn is_atomic_counter(&self) -> bool {
        self.counter_index != NO_COUNTER
    }
}

/// Externally visible metadata of one active uniform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniformSummary {
    name: String,
    array_size: u32,
    type_id: u32,
}

impl UniformSummary {
    pub fn new(name: impl Into<String>, array_size: u32, type_id: u32) -> Self {
        Self {
            name: name.into(),
            array_size,
            type_id,
        }
    }

    /// Name used to address the uniform through the render API
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of array elements, 0 if the uniform is not an array
    pub fn array_size(&self) -> u32 {
        self.array_size
    }

    /// Type code used to pick the upload function in the render API
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    pub fn is_array(&self) -> bool {
        self.array_size > 0
    }
}

impl From<&ReflectionRecord> for UniformSummary {
    fn from(record: &ReflectionRecord) -> Self {
        Self::new(record.name.clone(), record.array_size, record.type_code)
    }
}

impl From<ReflectionRecord> for UniformSummary {
    fn from(record: ReflectionRecord) -> Self {
        Self::new(record.name, record.array_size, record.type_code)
    }
}

/// Project full records to summaries, keeping the backend's declaration order
pub fn project(records: &[ReflectionRecord]) -> Vec<UniformSummary> {
    records.iter().map(UniformSummary::from).collect()
}

/// Full reflection of one shader: active uniforms and active uniform blocks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    /// Active uniforms (block members included), in declaration order
    pub uniforms: Vec<ReflectionRecord>,
    /// Active uniform blocks, in declaration order
    pub blocks: Vec<ReflectionRecord>,
}

impl ShaderReflection {
    /// Summaries of the active uniforms
    pub fn summaries(&self) -> Vec<UniformSummary> {
        project(&self.uniforms)
    }

    /// Look up an active uniform by name
    pub fn uniform(&self, name: &str) -> Option<&ReflectionRecord> {
        self.uniforms.iter().find(|record| record.name == name)
    }

    /// Look up an active block by name
    pub fn block(&self, name: &str) -> Option<&ReflectionRecord> {
        self.blocks.iter().find(|record| record.name == name)
    }
}

#[cfg(test)]
#[path = "reflection_tests.rs"]
mod tests;
