/// Uniform reflection of a GLSL translation unit
///
/// `reflect` parses the source, collects uniform declarations in declaration
/// order, keeps the ones reachable from `main`, and lays out block members
/// with std140/std430 rules.

use glsl::parser::Parse;
use glsl::syntax::{
    Block, Declaration, ExternalDeclaration, InitDeclaratorList, Preprocessor, StorageQualifier,
    TranslationUnit, TypeQualifier, TypeQualifierSpec,
};
use rustc_hash::FxHashMap;
use glslens::reflection::{ReflectionRecord, ShaderReflection, NO_BINDING, NO_COUNTER};
use glslens::{Error, Result, StageId};
use crate::layout::{LayoutQualifiers, Packing};
use crate::types::{GlslType, ScalarKind, StructField, TypeScope};
use crate::usage::Usage;

/// Oldest accepted `#version`
pub const MIN_VERSION: u32 = 100;

/// Newest accepted `#version`
pub const MAX_VERSION: u32 = 460;

const SOURCE: &str = "glslens_backend::reflect";

const ENTRY_POINT: &str = "main";

/// Upper bound on flattened uniform records per shader
pub const MAX_RECORDS: usize = 1 << 16;

// ===== DECLARATIONS =====

struct UniformDecl {
    name: String,
    ty: GlslType,
    layout: LayoutQualifiers,
}

struct BlockDecl {
    name: String,
    /// Instance name, `None` for anonymous blocks
    instance: Option<String>,
    /// Element count of an instance array, 0 otherwise
    instance_count: u32,
    fields: Vec<StructField>,
    layout: LayoutQualifiers,
    packing: Packing,
}

enum UniformItem {
    Uniform(UniformDecl),
    Block(BlockDecl),
}

/// Everything the reflection pass needs from one walk over the unit
#[derive(Default)]
struct Declarations {
    scope: TypeScope,
    version: Option<u32>,
    default_packing: Packing,
    items: Vec<UniformItem>,
    functions: FxHashMap<String, Usage>,
    /// References made by global initializers, live before `main` runs
    globals: Usage,
}

// ===== ENTRY POINT =====

/// Reflect the active uniforms and uniform blocks of `source`
///
/// A `#version` directive in the source takes precedence over `version`.
///
/// # Errors
///
/// Returns `Error::CompilationError` with a diagnostic when the source does
/// not parse, declares an unsupported version, has no `main`, or declares an
/// invalid uniform (unsized array, bad layout offset, undeclared type, or a
/// layout that does not fit in 32-bit offsets).
pub fn reflect(source: &str, version: u32, stage: StageId) -> Result<ShaderReflection> {
    let unit = TranslationUnit::parse(source)
        .map_err(|err| compile_error(format!("ERROR: {}", err)))?;

    let declarations = Declarations::collect(&unit)?;

    let version = declarations.version.unwrap_or(version);
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(compile_error(format!("Unsupported GLSL version: {}", version)));
    }

    let Some(mut live) = Usage::reachable(&declarations.functions, ENTRY_POINT) else {
        return Err(compile_error(format!(
            "ERROR: Linking {} stage: Missing entry point: Each stage requires one entry point",
            stage
        )));
    };
    live.merge(&declarations.globals);

    let mut reflector = Reflector::new(&live);
    for item in &declarations.items {
        match item {
            UniformItem::Uniform(uniform) => reflector.uniform(uniform)?,
            UniformItem::Block(block) => reflector.block(block)?,
        }
    }

    glslens::glslens_debug!(
        SOURCE,
        "Reflected {} uniform(s) and {} block(s) for {} stage, version {}",
        reflector.reflection.uniforms.len(),
        reflector.reflection.blocks.len(),
        stage,
        version
    );

    Ok(reflector.reflection)
}

fn compile_error(message: String) -> Error {
    Error::CompilationError(message)
}

// ===== COLLECTION =====

impl Declarations {
    fn collect(unit: &TranslationUnit) -> Result<Self> {
        let mut declarations = Self::default();

        for external in unit.0 .0.iter() {
            match external {
                ExternalDeclaration::Preprocessor(Preprocessor::Version(directive)) => {
                    declarations.version = Some(u32::from(directive.version));
                }
                ExternalDeclaration::Preprocessor(_) => {}
                ExternalDeclaration::FunctionDefinition(def) => {
                    declarations
                        .functions
                        .entry(def.prototype.name.0.clone())
                        .or_default()
                        .merge(&Usage::of_function(def));
                }
                ExternalDeclaration::Declaration(declaration) => {
                    declarations.declaration(declaration).map_err(compile_error)?;
                }
            }
        }

        Ok(declarations)
    }

    fn declaration(&mut self, declaration: &Declaration) -> std::result::Result<(), String> {
        match declaration {
            Declaration::InitDeclaratorList(list) => self.variables(list),
            Declaration::Block(block) => self.block(block),
            Declaration::Global(qualifier, identifiers) => {
                // `layout(std430) uniform;` changes the default for later blocks
                if identifiers.is_empty() && has_storage(qualifier, StorageQualifier::Uniform) {
                    let layout = LayoutQualifiers::parse(qualifier, &self.scope);
                    if let Some(packing) = layout.packing {
                        self.default_packing = packing;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn variables(&mut self, list: &InitDeclaratorList) -> std::result::Result<(), String> {
        let qualifier = list.head.ty.qualifier.as_ref();
        let is_uniform = qualifier.is_some_and(|q| has_storage(q, StorageQualifier::Uniform));
        let is_const = qualifier.is_some_and(|q| has_storage(q, StorageQualifier::Const));
        let layout = qualifier
            .map(|q| LayoutQualifiers::parse(q, &self.scope))
            .unwrap_or_default();

        // Also registers struct definitions, named or not
        let base = self.scope.resolve(&list.head.ty.ty)?;

        let head = list
            .head
            .name
            .as_ref()
            .map(|name| (name, list.head.array_specifier.as_ref(), list.head.initializer.as_ref()));
        let tail = list
            .tail
            .iter()
            .map(|decl| (&decl.ident.ident, decl.ident.array_spec.as_ref(), decl.initializer.as_ref()));

        for (name, array_spec, initializer) in head.into_iter().chain(tail) {
            let ty = self.scope.apply_array(base.clone(), array_spec)?;

            if is_uniform {
                if matches!(ty, GlslType::Array { count: 0, .. }) {
                    return Err(format!("'{}' : implicitly-sized uniform arrays are not supported", name.0));
                }
                self.items.push(UniformItem::Uniform(UniformDecl {
                    name: name.0.clone(),
                    ty,
                    layout,
                }));
                continue;
            }

            let Some(initializer) = initializer else {
                continue;
            };
            if is_const && matches!(ty, GlslType::Scalar(ScalarKind::Int | ScalarKind::UInt)) {
                if let glsl::syntax::Initializer::Simple(expr) = initializer {
                    if let Some(value) = self.scope.eval(expr) {
                        self.scope.define_constant(&name.0, value);
                    }
                }
            }
            self.globals.add_initializer(initializer);
        }

        Ok(())
    }

    fn block(&mut self, block: &Block) -> std::result::Result<(), String> {
        // Buffer and interface blocks are not uniforms
        if !has_storage(&block.qualifier, StorageQualifier::Uniform) {
            return Ok(());
        }

        let layout = LayoutQualifiers::parse(&block.qualifier, &self.scope);
        let fields = self.scope.fields(&block.fields)?;
        if let Some(opaque) = fields.iter().find(|field| field.ty.is_opaque()) {
            return Err(format!(
                "'{}' : opaque types are not allowed in uniform block '{}'",
                opaque.name, block.name.0
            ));
        }

        let (instance, instance_count) = match &block.identifier {
            Some(ident) => {
                let placeholder = GlslType::Scalar(ScalarKind::Int);
                let instance_ty = self.scope.apply_array(placeholder, ident.array_spec.as_ref())?;
                (Some(ident.ident.0.clone()), instance_ty.array_count())
            }
            None => (None, 0),
        };

        self.items.push(UniformItem::Block(BlockDecl {
            name: block.name.0.clone(),
            instance,
            instance_count,
            fields,
            layout,
            packing: layout.packing.unwrap_or(self.default_packing),
        }));
        Ok(())
    }
}

fn has_storage(qualifier: &TypeQualifier, storage: StorageQualifier) -> bool {
    qualifier
        .qualifiers
        .0
        .iter()
        .any(|spec| matches!(spec, TypeQualifierSpec::Storage(s) if *s == storage))
}

// ===== RECORDS =====

struct Reflector<'a> {
    live: &'a Usage,
    reflection: ShaderReflection,
    /// Distinct atomic counter bindings, in declaration order
    counter_bindings: Vec<i32>,
    /// Next free offset per atomic counter binding
    counter_offsets: FxHashMap<i32, u32>,
}

impl<'a> Reflector<'a> {
    fn new(live: &'a Usage) -> Self {
        Self {
            live,
            reflection: ShaderReflection::default(),
            counter_bindings: Vec::new(),
            counter_offsets: FxHashMap::default(),
        }
    }

    /// Default-block uniform
    fn uniform(&mut self, uniform: &UniformDecl) -> Result<()> {
        if !self.live.references(&uniform.name) {
            return Ok(());
        }

        if matches!(uniform.ty.element(), GlslType::AtomicCounter) {
            return self.atomic_counter(uniform);
        }

        let binding = uniform.layout.binding.unwrap_or(NO_BINDING);
        self.default_block_records(&uniform.name, &uniform.ty, binding)
    }

    /// Flatten structs in the default block; leaves have no offset or stride
    fn default_block_records(&mut self, name: &str, ty: &GlslType, binding: i32) -> Result<()> {
        match ty.element() {
            GlslType::Struct { fields, .. } => {
                for prefix in element_names(name, ty) {
                    for field in fields {
                        let member = format!("{}.{}", prefix, field.name);
                        self.default_block_records(&member, &field.ty, binding)?;
                    }
                }
            }
            _ => {
                let size = Packing::Std140.size(ty).ok_or_else(|| too_large(name))?;
                let mut record = ReflectionRecord::new(name, ty.type_code(), size);
                record.binding_index = binding;
                record.array_size = ty.array_count();
                push_record(&mut self.reflection.uniforms, record)?;
            }
        }
        Ok(())
    }

    fn atomic_counter(&mut self, uniform: &UniformDecl) -> Result<()> {
        let binding = uniform.layout.binding.unwrap_or(0);
        let counter_index = match self.counter_bindings.iter().position(|b| *b == binding) {
            Some(index) => index,
            None => {
                self.counter_bindings.push(binding);
                self.counter_bindings.len() - 1
            }
        };

        let overflow = || too_large(&uniform.name);
        let size = Packing::Std430.size(&uniform.ty).ok_or_else(overflow)?;
        let next = self.counter_offsets.entry(binding).or_insert(0);
        let offset = uniform.layout.offset.unwrap_or(*next);
        *next = offset.checked_add(size).ok_or_else(overflow)?;

        let mut record = ReflectionRecord::new(uniform.name.as_str(), uniform.ty.type_code(), size);
        record.offset = offset;
        record.binding_index = binding;
        record.counter_index = i32::try_from(counter_index).unwrap_or(NO_COUNTER);
        record.array_size = uniform.ty.array_count();
        if record.array_size > 0 {
            record.array_stride = 4;
        }
        push_record(&mut self.reflection.uniforms, record)
    }

    fn block(&mut self, block: &BlockDecl) -> Result<()> {
        let offsets = block.packing.member_offsets(&block.fields).map_err(compile_error)?;
        let binding = block.layout.binding.unwrap_or(NO_BINDING);
        if block.instance_count as usize > MAX_RECORDS {
            return Err(too_many_records(&block.name));
        }

        let mut members = Vec::new();
        for (field, offset) in block.fields.iter().zip(offsets) {
            if !self.member_is_live(block, &field.name) {
                continue;
            }
            let name = match block.instance {
                Some(_) => format!("{}.{}", block.name, field.name),
                None => field.name.clone(),
            };
            let (top_size, top_stride) = match &field.ty {
                GlslType::Array { element, count } => {
                    let stride = block.packing.array_stride(element).ok_or_else(|| too_large(&name))?;
                    (*count, stride)
                }
                _ => (1, 0),
            };
            let member = MemberRecord { binding, top_size, top_stride };
            member.flatten(&mut members, block.packing, &name, &field.ty, offset)?;
        }

        if members.is_empty() {
            return Ok(());
        }

        let size = block
            .packing
            .size(&GlslType::Struct {
                name: block.name.clone(),
                fields: block.fields.clone(),
            })
            .ok_or_else(|| too_large(&block.name))?;
        let num_members = u32::try_from(members.len()).unwrap_or(u32::MAX);

        if block.instance_count == 0 {
            let mut record = ReflectionRecord::new(block.name.as_str(), 0, size);
            record.binding_index = binding;
            record.num_members = num_members;
            self.reflection.blocks.push(record);
        } else {
            for index in 0..block.instance_count {
                let mut record = ReflectionRecord::new(format!("{}[{}]", block.name, index), 0, size);
                record.binding_index = instance_binding(binding, index).ok_or_else(|| {
                    compile_error(format!("'{}' : binding {} + {} is out of range", block.name, binding, index))
                })?;
                record.num_members = num_members;
                self.reflection.blocks.push(record);
            }
        }

        for member in members {
            push_record(&mut self.reflection.uniforms, member)?;
        }
        Ok(())
    }

    fn member_is_live(&self, block: &BlockDecl, member: &str) -> bool {
        match &block.instance {
            Some(instance) => self.live.bare(instance) || self.live.accesses(instance, member),
            None => self.live.references(member),
        }
    }
}

/// Per-member data shared by every record a block member flattens into
struct MemberRecord {
    binding: i32,
    top_size: u32,
    top_stride: u32,
}

impl MemberRecord {
    fn flatten(
        &self,
        out: &mut Vec<ReflectionRecord>,
        packing: Packing,
        name: &str,
        ty: &GlslType,
        offset: u32,
    ) -> Result<()> {
        if let GlslType::Struct { fields, .. } = ty.element() {
            let stride = packing.array_stride(ty.element()).ok_or_else(|| too_large(name))?;
            let field_offsets = packing.member_offsets(fields).map_err(compile_error)?;
            for (index, prefix) in element_names(name, ty).enumerate() {
                let base = stride
                    .checked_mul(index as u32)
                    .and_then(|skip| offset.checked_add(skip))
                    .ok_or_else(|| too_large(name))?;
                for (field, field_offset) in fields.iter().zip(&field_offsets) {
                    let member = format!("{}.{}", prefix, field.name);
                    let member_offset = base.checked_add(*field_offset).ok_or_else(|| too_large(&member))?;
                    self.flatten(out, packing, &member, &field.ty, member_offset)?;
                }
            }
            return Ok(());
        }

        let size = packing.size(ty).ok_or_else(|| too_large(name))?;
        let mut record = ReflectionRecord::new(name, ty.type_code(), size);
        record.offset = offset;
        record.binding_index = self.binding;
        record.counter_index = NO_COUNTER;
        record.array_size = ty.array_count();
        if let GlslType::Array { element, .. } = ty {
            record.array_stride = packing.array_stride(element).ok_or_else(|| too_large(name))?;
        }
        record.top_level_array_size = self.top_size;
        record.top_level_array_stride = self.top_stride;
        push_record(out, record)
    }
}

/// `name` for a single value, `name[0]`..`name[n-1]` for an array
fn element_names<'a>(name: &'a str, ty: &GlslType) -> impl Iterator<Item = String> + 'a {
    let count = match ty {
        GlslType::Array { count, .. } => Some(*count),
        _ => None,
    };
    let indexed = count
        .into_iter()
        .flat_map(|count| 0..count)
        .map(move |index| format!("{}[{}]", name, index));
    let single = count.is_none().then(|| name.to_string());
    single.into_iter().chain(indexed)
}

/// Binding of element `index` of an instance array
fn instance_binding(binding: i32, index: u32) -> Option<i32> {
    if binding == NO_BINDING {
        return Some(NO_BINDING);
    }
    binding.checked_add(i32::try_from(index).ok()?)
}

/// Flattening stops once a shader would report this many records
fn push_record(records: &mut Vec<ReflectionRecord>, record: ReflectionRecord) -> Result<()> {
    if records.len() >= MAX_RECORDS {
        return Err(too_many_records(&record.name));
    }
    records.push(record);
    Ok(())
}

fn too_large(name: &str) -> Error {
    compile_error(format!("'{}' : array size is too large", name))
}

fn too_many_records(name: &str) -> Error {
    compile_error(format!("'{}' : more than {} active uniforms", name, MAX_RECORDS))
}

#[cfg(test)]
#[path = "reflect_tests.rs"]
mod tests;
