/// Shader stage identifiers and the textual tag table
///
/// Tags follow the glslang file-extension convention ("vert", "frag", "rchit", ...)
/// and the glslang enum names, including the vendor ray-tracing aliases that
/// share a numeric stage with their core counterpart.

use std::fmt;
use std::sync::LazyLock;
use rustc_hash::FxHashMap;

/// Pipeline stage a GLSL source targets
///
/// The discriminant is the wire code sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Vertex shader
    Vertex = 0,
    /// Tessellation control shader
    TessControl = 1,
    /// Tessellation evaluation shader
    TessEvaluation = 2,
    /// Geometry shader
    Geometry = 3,
    /// Fragment shader
    Fragment = 4,
    /// Compute shader
    Compute = 5,
    /// Ray generation shader
    RayGen = 6,
    /// Ray intersection shader
    Intersect = 7,
    /// Ray any-hit shader
    AnyHit = 8,
    /// Ray closest-hit shader
    ClosestHit = 9,
    /// Ray miss shader
    Miss = 10,
    /// Callable shader
    Callable = 11,
    /// Task shader
    Task = 12,
    /// Mesh shader
    Mesh = 13,
}

/// Every tag accepted by `StageId::parse`
const STAGE_TAGS: &[(&str, StageId)] = &[
    ("vert", StageId::Vertex),
    ("tesc", StageId::TessControl),
    ("tese", StageId::TessEvaluation),
    ("geom", StageId::Geometry),
    ("frag", StageId::Fragment),
    ("comp", StageId::Compute),
    ("rgen", StageId::RayGen),
    ("rint", StageId::Intersect),
    ("rahit", StageId::AnyHit),
    ("rchit", StageId::ClosestHit),
    ("rmiss", StageId::Miss),
    ("call", StageId::Callable),
    ("rcall", StageId::Callable),
    ("task", StageId::Task),
    ("mesh", StageId::Mesh),
    ("EShLangVertex", StageId::Vertex),
    ("EShLangTessControl", StageId::TessControl),
    ("EShLangTessEvaluation", StageId::TessEvaluation),
    ("EShLangGeometry", StageId::Geometry),
    ("EShLangFragment", StageId::Fragment),
    ("EShLangCompute", StageId::Compute),
    ("EShLangRayGen", StageId::RayGen),
    ("EShLangRayGenNV", StageId::RayGen),
    ("EShLangIntersect", StageId::Intersect),
    ("EShLangIntersectNV", StageId::Intersect),
    ("EShLangAnyHit", StageId::AnyHit),
    ("EShLangAnyHitNV", StageId::AnyHit),
    ("EShLangClosestHit", StageId::ClosestHit),
    ("EShLangClosestHitNV", StageId::ClosestHit),
    ("EShLangMiss", StageId::Miss),
    ("EShLangMissNV", StageId::Miss),
    ("EShLangCallable", StageId::Callable),
    ("EShLangCallableNV", StageId::Callable),
    ("EShLangTask", StageId::Task),
    ("EShLangTaskNV", StageId::Task),
    ("EShLangMesh", StageId::Mesh),
    ("EShLangMeshNV", StageId::Mesh),
];

static STAGE_TABLE: LazyLock<FxHashMap<&'static str, StageId>> =
    LazyLock::new(|| STAGE_TAGS.iter().copied().collect());

impl StageId {
    /// All stages in wire-code order
    pub const ALL: [StageId; 14] = [
        StageId::Vertex,
        StageId::TessControl,
        StageId::TessEvaluation,
        StageId::Geometry,
        StageId::Fragment,
        StageId::Compute,
        StageId::RayGen,
        StageId::Intersect,
        StageId::AnyHit,
        StageId::ClosestHit,
        StageId::Miss,
        StageId::Callable,
        StageId::Task,
        StageId::Mesh,
    ];

    /// Resolve a textual stage tag
    ///
    /// Returns `None` for any tag outside the table. Lookup is case-sensitive.
    ///
    /// # Example
    ///
    /// ```
    /// use glslens::StageId;
    ///
    /// assert_eq!(StageId::parse("frag"), Some(StageId::Fragment));
    /// assert_eq!(StageId::parse("EShLangRayGenNV"), StageId::parse("rgen"));
    /// assert_eq!(StageId::parse("xyz"), None);
    /// ```
    pub fn parse(tag: &str) -> Option<StageId> {
        STAGE_TABLE.get(tag).copied()
    }

    /// Numeric code used on the wire
    pub fn value(self) -> u32 {
        self as u32
    }

    /// Inverse of `value()`
    pub fn from_value(value: u32) -> Option<StageId> {
        Self::ALL.get(value as usize).copied()
    }

    /// Canonical short tag
    pub fn tag(self) -> &'static str {
        match self {
            StageId::Vertex => "vert",
            StageId::TessControl => "tesc",
            StageId::TessEvaluation => "tese",
            StageId::Geometry => "geom",
            StageId::Fragment => "frag",
            StageId::Compute => "comp",
            StageId::RayGen => "rgen",
            StageId::Intersect => "rint",
            StageId::AnyHit => "rahit",
            StageId::ClosestHit => "rchit",
            StageId::Miss => "rmiss",
            StageId::Callable => "call",
            StageId::Task => "task",
            StageId::Mesh => "mesh",
        }
    }

    /// Every tag that resolves to this stage
    pub fn aliases(self) -> impl Iterator<Item = &'static str> {
        STAGE_TAGS
            .iter()
            .filter(move |(_, stage)| *stage == self)
            .map(|(tag, _)| *tag)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
