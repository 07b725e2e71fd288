//! The SPIR-V module writer.
//!
//! Emits a word stream that is valid by construction: types and
//! constants are deduplicated through lookup maps, every instruction is
//! appended in dependency order, and control flow uses the structured
//! merge constructs (`OpSelectionMerge` / `OpLoopMerge`). Buffer-backed
//! external types carry explicit `Offset`/`ArrayStride`/`MatrixStride`
//! decorations computed by the shared layout rules.

use std::collections::HashMap;

use arclight_ast::{
    ArraySize, AssignOp, BinaryOp, BuiltInFunction, ConstantValue, Expression, Function, Handle,
    ImageKind, Module, Primitive, Stage, Statement, Type, TypeInner, UnaryOp, VectorSize,
};
use arclight_backend_core::{layout, BackendError, BackendOptions};
use arclight_reflect::reflect;

use crate::inst::{
    self, builtin, decoration, execution_mode, execution_model, misc, push_inst, storage, GlslExt,
    Op, Word,
};
use crate::typeck::{self, Environment, ValueType};
use crate::unsupported;

#[derive(Clone, Hash, Eq, PartialEq)]
enum TypeKey {
    Void,
    Bool,
    Int,
    UInt,
    Float,
    Vector(VectorSize, Primitive),
    Matrix(VectorSize),
    Image(ImageKind, Primitive),
    SampledImage(Word),
    Array {
        element: Word,
        length: Word,
        stride: Option<u32>,
    },
    Struct {
        index: usize,
        laid_out: bool,
    },
    Pointer {
        storage: Word,
        pointee: Word,
    },
    Function {
        result: Word,
        params: Vec<Word>,
    },
}

#[derive(Clone, Hash, Eq, PartialEq)]
enum ConstKey {
    Bool(bool),
    Scalar { ty: Word, bits: Word },
    Composite { ty: Word, parts: Vec<Word> },
}

#[derive(Clone, Copy)]
struct GlobalVar {
    id: Word,
    ty: Handle<Type>,
    storage: Word,
    /// Data externals live behind a one-member Block struct; access
    /// chains start with member 0.
    wrapped: bool,
}

/// A resolved pointer into a variable.
struct Ptr {
    id: Word,
    /// SPIR-V id of the pointee type.
    type_id: Word,
    vt: ValueType,
    storage: Word,
    /// Whether the pointee uses the laid-out (decorated) type ids.
    laid_out: bool,
}

struct FnSig {
    id: Word,
    param_types: Vec<Word>,
    result_type: Word,
    fn_type: Word,
}

pub(crate) struct Writer<'a> {
    module: &'a Module,
    stage: Stage,
    debug_info: bool,
    next_id: Word,
    glsl_ext: Word,
    names: Vec<Word>,
    decorations: Vec<Word>,
    globals: Vec<Word>,
    functions: Vec<Word>,
    type_cache: HashMap<TypeKey, Word>,
    const_cache: HashMap<ConstKey, Word>,
    global_vars: HashMap<String, GlobalVar>,
    fn_sigs: HashMap<String, FnSig>,
    env: Environment,
    interface: Vec<Word>,
    position_var: Option<Word>,
    /// Module consts stored at entry start: (pointer, init expression).
    const_inits: Vec<(String, Handle<Expression>)>,
}

struct FnCtx {
    vars: HashMap<String, (Word, Handle<Type>)>,
    env: Environment,
    loop_stack: Vec<(Word, Word)>,
    body: Vec<Word>,
    terminated: bool,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(module: &'a Module, stage: Stage, opts: &BackendOptions) -> Self {
        Self {
            module,
            stage,
            debug_info: opts.debug_info,
            next_id: 1,
            glsl_ext: 0,
            names: Vec::new(),
            decorations: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            type_cache: HashMap::new(),
            const_cache: HashMap::new(),
            global_vars: HashMap::new(),
            fn_sigs: HashMap::new(),
            env: Environment::default(),
            interface: Vec::new(),
            position_var: None,
            const_inits: Vec::new(),
        }
    }

    pub(crate) fn write(mut self) -> Result<Vec<u8>, BackendError> {
        self.reject_unresolved()?;
        self.env = Environment::from_module(self.module);
        self.glsl_ext = self.id();

        let entry = self
            .module
            .entry_functions()
            .find(|(s, _)| *s == self.stage)
            .map(|(_, f)| f)
            .ok_or(BackendError::Reflection(
                arclight_reflect::ReflectError::MissingEntryPoint { stage: self.stage },
            ))?;
        if !entry.parameters.is_empty() || entry.result.is_some() {
            return Err(unsupported(format!(
                "entry function `{}` must take no parameters and return nothing",
                entry.name
            )));
        }

        self.declare_globals()?;
        self.declare_functions()?;

        for stmt in &self.module.root {
            if let Statement::FunctionDeclaration(f) = stmt {
                self.emit_function(f, false)?;
            }
        }
        let entry_id = self.emit_function(entry, true)?;

        Ok(inst::words_to_bytes(&self.assemble(entry_id, &entry.name)))
    }

    fn reject_unresolved(&self) -> Result<(), BackendError> {
        for stmt in &self.module.root {
            match stmt {
                Statement::OptionDeclaration { name, .. } => {
                    return Err(unsupported(format!(
                        "option `{name}` is still symbolic at emission time"
                    )));
                }
                Statement::Include { library } => {
                    return Err(unsupported(format!(
                        "include <{library}> was not resolved before emission"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn assemble(&self, entry_id: Word, entry_name: &str) -> Vec<Word> {
        let mut words = vec![inst::MAGIC, inst::VERSION, inst::GENERATOR, self.next_id, 0];
        push_inst(&mut words, Op::Capability, &[misc::CAPABILITY_SHADER]);

        let mut import = vec![self.glsl_ext];
        import.extend(inst::string_words("GLSL.std.450"));
        push_inst(&mut words, Op::ExtInstImport, &import);

        push_inst(
            &mut words,
            Op::MemoryModel,
            &[misc::ADDRESSING_LOGICAL, misc::MEMORY_GLSL450],
        );

        let model = match self.stage {
            Stage::Vertex => execution_model::VERTEX,
            Stage::Fragment => execution_model::FRAGMENT,
        };
        let mut ep = vec![model, entry_id];
        ep.extend(inst::string_words(entry_name));
        ep.extend(&self.interface);
        push_inst(&mut words, Op::EntryPoint, &ep);

        if self.stage == Stage::Fragment {
            push_inst(
                &mut words,
                Op::ExecutionMode,
                &[entry_id, execution_mode::ORIGIN_UPPER_LEFT],
            );
        }

        words.extend(&self.names);
        words.extend(&self.decorations);
        words.extend(&self.globals);
        words.extend(&self.functions);
        words
    }

    fn id(&mut self) -> Word {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn name_id(&mut self, id: Word, name: &str) {
        if self.debug_info {
            let mut ops = vec![id];
            ops.extend(inst::string_words(name));
            push_inst(&mut self.names, Op::Name, &ops);
        }
    }

    // --- types ---

    fn cached_type(&mut self, key: TypeKey, op: Op, operands: &[Word]) -> Word {
        if let Some(&id) = self.type_cache.get(&key) {
            return id;
        }
        let id = self.id();
        let mut ops = vec![id];
        ops.extend_from_slice(operands);
        push_inst(&mut self.globals, op, &ops);
        self.type_cache.insert(key, id);
        id
    }

    fn void_type(&mut self) -> Word {
        self.cached_type(TypeKey::Void, Op::TypeVoid, &[])
    }

    fn scalar_type(&mut self, p: Primitive) -> Word {
        match p {
            Primitive::Bool => self.cached_type(TypeKey::Bool, Op::TypeBool, &[]),
            Primitive::Int => self.cached_type(TypeKey::Int, Op::TypeInt, &[32, 1]),
            Primitive::UInt => self.cached_type(TypeKey::UInt, Op::TypeInt, &[32, 0]),
            Primitive::Float => self.cached_type(TypeKey::Float, Op::TypeFloat, &[32]),
        }
    }

    fn vector_type(&mut self, size: VectorSize, p: Primitive) -> Word {
        let scalar = self.scalar_type(p);
        self.cached_type(
            TypeKey::Vector(size, p),
            Op::TypeVector,
            &[scalar, size as Word],
        )
    }

    fn matrix_type(&mut self, columns: VectorSize) -> Word {
        let column = self.vector_type(columns, Primitive::Float);
        self.cached_type(
            TypeKey::Matrix(columns),
            Op::TypeMatrix,
            &[column, columns as Word],
        )
    }

    fn value_type_id(&mut self, vt: ValueType) -> Result<Word, BackendError> {
        match vt {
            ValueType::Void => Ok(self.void_type()),
            ValueType::Scalar(p) => Ok(self.scalar_type(p)),
            ValueType::Vector(size, p) => Ok(self.vector_type(size, p)),
            ValueType::Matrix(columns) => Ok(self.matrix_type(columns)),
            ValueType::Sampler(image, scalar) => Ok(self.sampled_image_type(image, scalar)),
            ValueType::Composite(handle) => self.type_id(handle, false),
        }
    }

    fn sampled_image_type(&mut self, image: ImageKind, scalar: Primitive) -> Word {
        let sampled = self.scalar_type(scalar);
        let dim = match image {
            ImageKind::Image1D => misc::DIM_1D,
            ImageKind::Image2D => misc::DIM_2D,
            ImageKind::Image3D => misc::DIM_3D,
            ImageKind::Cubemap => misc::DIM_CUBE,
        };
        // depth 0, arrayed 0, multisampled 0, sampled 1, format Unknown.
        let image_id = self.cached_type(
            TypeKey::Image(image, scalar),
            Op::TypeImage,
            &[sampled, dim, 0, 0, 0, 1, 0],
        );
        self.cached_type(
            TypeKey::SampledImage(image_id),
            Op::TypeSampledImage,
            &[image_id],
        )
    }

    /// SPIR-V type id for a declared ATSL type. `laid_out` selects the
    /// buffer-decorated variant (explicit offsets and strides), which
    /// gets distinct ids from the plain variant.
    fn type_id(&mut self, handle: Handle<Type>, laid_out: bool) -> Result<Word, BackendError> {
        match &self.module.types[handle].inner {
            TypeInner::Void => Ok(self.void_type()),
            TypeInner::Scalar(p) => Ok(self.scalar_type(*p)),
            TypeInner::Vector { size, scalar } => Ok(self.vector_type(*size, *scalar)),
            TypeInner::Matrix { columns, .. } => Ok(self.matrix_type(*columns)),
            TypeInner::Sampler { image, scalar } => Ok(self.sampled_image_type(*image, *scalar)),
            TypeInner::Array { base, size } => {
                let base = *base;
                let size = size.clone();
                let element = self.type_id(base, laid_out)?;
                let count = match size {
                    ArraySize::Constant(n) => n,
                    ArraySize::Implicit => {
                        return Err(unsupported(
                            "implicitly sized arrays cannot be emitted".into(),
                        ))
                    }
                    ArraySize::Option(name) => {
                        return Err(unsupported(format!(
                            "array length option `{name}` is still symbolic"
                        )))
                    }
                };
                let length = self.const_u32(count);
                let stride = if laid_out {
                    let (elem_size, elem_align) = layout::size_and_align(
                        self.module,
                        base,
                        layout::StructLayout::Uniform,
                    )?;
                    Some(round_up(elem_size.max(elem_align), 16))
                } else {
                    None
                };
                let key = TypeKey::Array {
                    element,
                    length,
                    stride,
                };
                if let Some(&id) = self.type_cache.get(&key) {
                    return Ok(id);
                }
                let id = self.id();
                push_inst(&mut self.globals, Op::TypeArray, &[id, element, length]);
                if let Some(stride) = stride {
                    push_inst(
                        &mut self.decorations,
                        Op::Decorate,
                        &[id, decoration::ARRAY_STRIDE, stride],
                    );
                }
                self.type_cache.insert(key, id);
                Ok(id)
            }
            TypeInner::Struct { members } => {
                let members = members.clone();
                let key = TypeKey::Struct {
                    index: handle.index(),
                    laid_out,
                };
                if let Some(&id) = self.type_cache.get(&key) {
                    return Ok(id);
                }
                let member_ids = members
                    .iter()
                    .map(|m| self.type_id(m.ty, laid_out))
                    .collect::<Result<Vec<_>, _>>()?;
                let id = self.id();
                let mut ops = vec![id];
                ops.extend(&member_ids);
                push_inst(&mut self.globals, Op::TypeStruct, &ops);
                if laid_out {
                    let computed =
                        layout::compute(self.module, handle, layout::StructLayout::Uniform)?;
                    for (i, member) in computed.members.iter().enumerate() {
                        push_inst(
                            &mut self.decorations,
                            Op::MemberDecorate,
                            &[id, i as Word, decoration::OFFSET, member.offset],
                        );
                        if let TypeInner::Matrix { rows, .. } =
                            self.module.types[member.ty].inner
                        {
                            let _ = rows;
                            push_inst(
                                &mut self.decorations,
                                Op::MemberDecorate,
                                &[id, i as Word, decoration::COL_MAJOR],
                            );
                            push_inst(
                                &mut self.decorations,
                                Op::MemberDecorate,
                                &[id, i as Word, decoration::MATRIX_STRIDE, 16],
                            );
                        }
                    }
                }
                self.type_cache.insert(key, id);
                Ok(id)
            }
        }
    }

    fn pointer_type(&mut self, storage_class: Word, pointee: Word) -> Word {
        self.cached_type(
            TypeKey::Pointer {
                storage: storage_class,
                pointee,
            },
            Op::TypePointer,
            &[storage_class, pointee],
        )
    }

    fn function_type(&mut self, result: Word, params: &[Word]) -> Word {
        let mut operands = vec![result];
        operands.extend_from_slice(params);
        self.cached_type(
            TypeKey::Function {
                result,
                params: params.to_vec(),
            },
            Op::TypeFunction,
            &operands,
        )
    }

    // --- constants ---

    fn cached_const(&mut self, key: ConstKey, op: Op, operands: &[Word]) -> Word {
        if let Some(&id) = self.const_cache.get(&key) {
            return id;
        }
        let id = self.id();
        // Result type precedes the result id for constant instructions.
        let mut ops = vec![operands[0], id];
        ops.extend_from_slice(&operands[1..]);
        push_inst(&mut self.globals, op, &ops);
        self.const_cache.insert(key, id);
        id
    }

    fn const_bool(&mut self, value: bool) -> Word {
        let ty = self.scalar_type(Primitive::Bool);
        let op = if value {
            Op::ConstantTrue
        } else {
            Op::ConstantFalse
        };
        self.cached_const(ConstKey::Bool(value), op, &[ty])
    }

    fn const_u32(&mut self, value: u32) -> Word {
        let ty = self.scalar_type(Primitive::UInt);
        self.cached_const(ConstKey::Scalar { ty, bits: value }, Op::Constant, &[ty, value])
    }

    fn const_i32(&mut self, value: i32) -> Word {
        let ty = self.scalar_type(Primitive::Int);
        self.cached_const(
            ConstKey::Scalar {
                ty,
                bits: value as u32,
            },
            Op::Constant,
            &[ty, value as u32],
        )
    }

    fn const_f32(&mut self, value: f32) -> Word {
        let ty = self.scalar_type(Primitive::Float);
        let bits = value.to_bits();
        self.cached_const(ConstKey::Scalar { ty, bits }, Op::Constant, &[ty, bits])
    }

    fn constant(&mut self, value: &ConstantValue) -> Result<(Word, ValueType), BackendError> {
        Ok(match value {
            ConstantValue::Bool(v) => (self.const_bool(*v), ValueType::Scalar(Primitive::Bool)),
            ConstantValue::Int(v) => (self.const_i32(*v), ValueType::Scalar(Primitive::Int)),
            ConstantValue::UInt(v) => (self.const_u32(*v), ValueType::Scalar(Primitive::UInt)),
            ConstantValue::Float(v) => (self.const_f32(*v), ValueType::Scalar(Primitive::Float)),
            ConstantValue::Vector(components) => {
                let scalar = components
                    .first()
                    .and_then(|c| c.primitive())
                    .ok_or_else(|| unsupported("empty composite constant".into()))?;
                let size = VectorSize::from_count(components.len() as u32)
                    .ok_or_else(|| unsupported("composite constant width".into()))?;
                let parts = components
                    .iter()
                    .map(|c| self.constant(c).map(|(id, _)| id))
                    .collect::<Result<Vec<_>, _>>()?;
                let ty = self.vector_type(size, scalar);
                let mut ops = vec![ty];
                ops.extend(&parts);
                let id = self.cached_const(
                    ConstKey::Composite { ty, parts },
                    Op::ConstantComposite,
                    &ops,
                );
                (id, ValueType::Vector(size, scalar))
            }
        })
    }

    // --- module-scope variables ---

    fn declare_globals(&mut self) -> Result<(), BackendError> {
        let table = reflect(self.module, self.stage)?;

        for stmt in &self.module.root {
            match stmt {
                Statement::ExternalDeclaration { name, ty, .. } => {
                    let entry = table
                        .external(name)
                        .expect("reflection covers every external");
                    let (set, binding) = (entry.set, entry.binding);
                    let id = if entry.is_sampler {
                        let type_id = self.type_id(*ty, false)?;
                        let ptr = self.pointer_type(storage::UNIFORM_CONSTANT, type_id);
                        let id = self.id();
                        push_inst(
                            &mut self.globals,
                            Op::Variable,
                            &[ptr, id, storage::UNIFORM_CONSTANT],
                        );
                        self.global_vars.insert(
                            name.clone(),
                            GlobalVar {
                                id,
                                ty: *ty,
                                storage: storage::UNIFORM_CONSTANT,
                                wrapped: false,
                            },
                        );
                        id
                    } else {
                        // One-member Block struct wrapper.
                        let inner = self.type_id(*ty, true)?;
                        let block = self.id();
                        push_inst(&mut self.globals, Op::TypeStruct, &[block, inner]);
                        push_inst(
                            &mut self.decorations,
                            Op::Decorate,
                            &[block, decoration::BLOCK],
                        );
                        push_inst(
                            &mut self.decorations,
                            Op::MemberDecorate,
                            &[block, 0, decoration::OFFSET, 0],
                        );
                        if let TypeInner::Matrix { .. } = self.module.types[*ty].inner {
                            push_inst(
                                &mut self.decorations,
                                Op::MemberDecorate,
                                &[block, 0, decoration::COL_MAJOR],
                            );
                            push_inst(
                                &mut self.decorations,
                                Op::MemberDecorate,
                                &[block, 0, decoration::MATRIX_STRIDE, 16],
                            );
                        }
                        let ptr = self.pointer_type(storage::UNIFORM, block);
                        let id = self.id();
                        push_inst(
                            &mut self.globals,
                            Op::Variable,
                            &[ptr, id, storage::UNIFORM],
                        );
                        self.global_vars.insert(
                            name.clone(),
                            GlobalVar {
                                id,
                                ty: *ty,
                                storage: storage::UNIFORM,
                                wrapped: true,
                            },
                        );
                        id
                    };
                    push_inst(
                        &mut self.decorations,
                        Op::Decorate,
                        &[id, decoration::DESCRIPTOR_SET, set],
                    );
                    push_inst(
                        &mut self.decorations,
                        Op::Decorate,
                        &[id, decoration::BINDING, binding],
                    );
                    self.name_id(id, name);
                }
                Statement::InputDeclaration { stage, name, ty, .. } if *stage == self.stage => {
                    self.declare_io(name, *ty, storage::INPUT, &table)?;
                }
                Statement::OutputDeclaration { stage, name, ty, .. } if *stage == self.stage => {
                    self.declare_io(name, *ty, storage::OUTPUT, &table)?;
                }
                Statement::ConstDeclaration { name, ty, init } => {
                    let type_id = self.type_id(*ty, false)?;
                    let ptr = self.pointer_type(storage::PRIVATE, type_id);
                    let id = self.id();
                    push_inst(
                        &mut self.globals,
                        Op::Variable,
                        &[ptr, id, storage::PRIVATE],
                    );
                    self.global_vars.insert(
                        name.clone(),
                        GlobalVar {
                            id,
                            ty: *ty,
                            storage: storage::PRIVATE,
                            wrapped: false,
                        },
                    );
                    self.const_inits.push((name.clone(), *init));
                    self.name_id(id, name);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_io(
        &mut self,
        name: &str,
        ty: Handle<Type>,
        storage_class: Word,
        table: &arclight_reflect::ReflectionTable,
    ) -> Result<(), BackendError> {
        let entry = if storage_class == storage::INPUT {
            table.inputs.iter().find(|e| e.name == name)
        } else {
            table.outputs.iter().find(|e| e.name == name)
        }
        .expect("reflection covers every io declaration");

        let type_id = self.type_id(ty, false)?;
        let ptr = self.pointer_type(storage_class, type_id);
        let id = self.id();
        push_inst(&mut self.globals, Op::Variable, &[ptr, id, storage_class]);
        push_inst(
            &mut self.decorations,
            Op::Decorate,
            &[id, decoration::LOCATION, entry.location],
        );
        self.global_vars.insert(
            name.to_owned(),
            GlobalVar {
                id,
                ty,
                storage: storage_class,
                wrapped: false,
            },
        );
        self.interface.push(id);
        self.name_id(id, name);
        Ok(())
    }

    /// Lazily creates the `gl_Position`-equivalent output.
    fn position_variable(&mut self) -> Word {
        if let Some(id) = self.position_var {
            return id;
        }
        let vec4 = self.vector_type(VectorSize::Quad, Primitive::Float);
        let ptr = self.pointer_type(storage::OUTPUT, vec4);
        let id = self.id();
        push_inst(&mut self.globals, Op::Variable, &[ptr, id, storage::OUTPUT]);
        push_inst(
            &mut self.decorations,
            Op::Decorate,
            &[id, decoration::BUILT_IN, builtin::POSITION],
        );
        self.interface.push(id);
        self.position_var = Some(id);
        id
    }

    // --- functions ---

    fn declare_functions(&mut self) -> Result<(), BackendError> {
        for stmt in &self.module.root {
            if let Statement::FunctionDeclaration(f) = stmt {
                let param_types = f
                    .parameters
                    .iter()
                    .map(|p| self.type_id(p.ty, false))
                    .collect::<Result<Vec<_>, _>>()?;
                let result_type = match f.result {
                    Some(ty) => self.type_id(ty, false)?,
                    None => self.void_type(),
                };
                let fn_type = self.function_type(result_type, &param_types);
                let id = self.id();
                self.name_id(id, &f.name);
                self.fn_sigs.insert(
                    f.name.clone(),
                    FnSig {
                        id,
                        param_types,
                        result_type,
                        fn_type,
                    },
                );
            }
        }
        Ok(())
    }

    fn emit_function(&mut self, f: &Function, entry: bool) -> Result<Word, BackendError> {
        let (fn_id, result_type, fn_type, param_types) = if entry {
            let void = self.void_type();
            let fn_type = self.function_type(void, &[]);
            let id = self.id();
            self.name_id(id, &f.name);
            (id, void, fn_type, vec![])
        } else {
            let sig = &self.fn_sigs[&f.name];
            (sig.id, sig.result_type, sig.fn_type, sig.param_types.clone())
        };

        push_inst(
            &mut self.functions,
            Op::Function,
            &[result_type, fn_id, misc::FUNCTION_CONTROL_NONE, fn_type],
        );

        // Parameters arrive by value; copy them into Function-storage
        // variables so all name accesses go through pointers.
        let mut param_ids = Vec::new();
        for (&type_id, param) in param_types.iter().zip(&f.parameters) {
            let id = self.id();
            push_inst(&mut self.functions, Op::FunctionParameter, &[type_id, id]);
            param_ids.push((id, param.name.clone(), param.ty));
        }

        let entry_label = self.id();
        push_inst(&mut self.functions, Op::Label, &[entry_label]);

        let mut ctx = FnCtx {
            vars: HashMap::new(),
            env: self.env.clone(),
            loop_stack: Vec::new(),
            body: Vec::new(),
            terminated: false,
        };

        // All Function-storage variables must sit at the top of the
        // first block: params first, then every local in the body.
        let mut prologue = Vec::new();
        for (value_id, name, ty) in &param_ids {
            let type_id = self.type_id(*ty, false)?;
            let ptr_ty = self.pointer_type(storage::FUNCTION, type_id);
            let var = self.id();
            push_inst(&mut prologue, Op::Variable, &[ptr_ty, var, storage::FUNCTION]);
            push_inst(&mut ctx.body, Op::Store, &[var, *value_id]);
            ctx.vars.insert(name.clone(), (var, *ty));
            ctx.env.bind(name.clone(), *ty);
        }
        let mut locals = Vec::new();
        collect_locals(&f.body, &mut locals);
        for (name, ty) in locals {
            let type_id = self.type_id(ty, false)?;
            let ptr_ty = self.pointer_type(storage::FUNCTION, type_id);
            let var = self.id();
            push_inst(&mut prologue, Op::Variable, &[ptr_ty, var, storage::FUNCTION]);
            self.name_id(var, &name);
            ctx.vars.insert(name.clone(), (var, ty));
            ctx.env.bind(name, ty);
        }

        if entry {
            // Module-scope consts are materialized before user code.
            for (name, init) in self.const_inits.clone() {
                let var = self.global_vars[&name];
                let (value, _) = self.emit_expr(&mut ctx, init)?;
                push_inst(&mut ctx.body, Op::Store, &[var.id, value]);
            }
        }

        for stmt in &f.body {
            self.emit_statement(&mut ctx, stmt)?;
        }
        if !ctx.terminated {
            if f.result.is_some() {
                return Err(unsupported(format!(
                    "function `{}` may fall off its end without returning a value",
                    f.name
                )));
            }
            push_inst(&mut ctx.body, Op::Return, &[]);
        }

        self.functions.extend(prologue);
        self.functions.extend(ctx.body);
        push_inst(&mut self.functions, Op::FunctionEnd, &[]);
        Ok(fn_id)
    }

    // --- statements ---

    fn emit_statement(&mut self, ctx: &mut FnCtx, stmt: &Statement) -> Result<(), BackendError> {
        if ctx.terminated {
            // Unreachable code after return/break/continue is dropped.
            return Ok(());
        }
        match stmt {
            Statement::VariableDeclaration { name, init, .. } => {
                if let Some(init) = init {
                    let (value, _) = self.emit_expr(ctx, *init)?;
                    let (var, _) = ctx.vars[name];
                    push_inst(&mut ctx.body, Op::Store, &[var, value]);
                }
            }
            Statement::Expression(e) => {
                let _ = self.emit_expr(ctx, *e)?;
            }
            Statement::Return { value } => {
                match value {
                    Some(v) => {
                        let (value, _) = self.emit_expr(ctx, *v)?;
                        push_inst(&mut ctx.body, Op::ReturnValue, &[value]);
                    }
                    None => push_inst(&mut ctx.body, Op::Return, &[]),
                }
                ctx.terminated = true;
            }
            Statement::Break => {
                let &(merge, _) = ctx
                    .loop_stack
                    .last()
                    .ok_or_else(|| unsupported("`break` outside of a loop".into()))?;
                push_inst(&mut ctx.body, Op::Branch, &[merge]);
                ctx.terminated = true;
            }
            Statement::Continue => {
                let &(_, cont) = ctx
                    .loop_stack
                    .last()
                    .ok_or_else(|| unsupported("`continue` outside of a loop".into()))?;
                push_inst(&mut ctx.body, Op::Branch, &[cont]);
                ctx.terminated = true;
            }
            Statement::Sequence(block) => {
                for s in block {
                    self.emit_statement(ctx, s)?;
                }
            }
            Statement::Conditional {
                condition,
                accept,
                reject,
            } => {
                let (cond, _) = self.emit_expr(ctx, *condition)?;
                let then_label = self.id();
                let merge = self.id();
                let else_label = if reject.is_empty() { merge } else { self.id() };
                push_inst(
                    &mut ctx.body,
                    Op::SelectionMerge,
                    &[merge, misc::CONTROL_NONE],
                );
                push_inst(
                    &mut ctx.body,
                    Op::BranchConditional,
                    &[cond, then_label, else_label],
                );

                push_inst(&mut ctx.body, Op::Label, &[then_label]);
                ctx.terminated = false;
                for s in accept {
                    self.emit_statement(ctx, s)?;
                }
                let accept_terminated = ctx.terminated;
                if !ctx.terminated {
                    push_inst(&mut ctx.body, Op::Branch, &[merge]);
                }

                let mut reject_terminated = false;
                if !reject.is_empty() {
                    push_inst(&mut ctx.body, Op::Label, &[else_label]);
                    ctx.terminated = false;
                    for s in reject {
                        self.emit_statement(ctx, s)?;
                    }
                    reject_terminated = ctx.terminated;
                    if !ctx.terminated {
                        push_inst(&mut ctx.body, Op::Branch, &[merge]);
                    }
                }

                push_inst(&mut ctx.body, Op::Label, &[merge]);
                // When every path out of the conditional already left
                // the function, the merge block can never be entered.
                if accept_terminated && reject_terminated {
                    push_inst(&mut ctx.body, Op::Unreachable, &[]);
                    ctx.terminated = true;
                } else {
                    ctx.terminated = false;
                }
            }
            Statement::While { condition, body } => {
                self.emit_loop(ctx, Some(*condition), body, None, true)?;
            }
            Statement::DoWhile { body, condition } => {
                self.emit_loop(ctx, Some(*condition), body, None, false)?;
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.emit_statement(ctx, init)?;
                }
                self.emit_loop(ctx, *condition, body, *step, true)?;
            }
            other => {
                return Err(unsupported(format!(
                    "statement {other:?} inside a function body has no SPIR-V form"
                )))
            }
        }
        Ok(())
    }

    /// Structured loop skeleton shared by while/do-while/for.
    ///
    /// `test_first` selects while-style (condition gates entry) versus
    /// do-while-style (condition sits in the continue block).
    fn emit_loop(
        &mut self,
        ctx: &mut FnCtx,
        condition: Option<Handle<Expression>>,
        body: &[Statement],
        step: Option<Handle<Expression>>,
        test_first: bool,
    ) -> Result<(), BackendError> {
        let header = self.id();
        let merge = self.id();
        let cont = self.id();
        let body_label = self.id();

        push_inst(&mut ctx.body, Op::Branch, &[header]);
        push_inst(&mut ctx.body, Op::Label, &[header]);
        push_inst(
            &mut ctx.body,
            Op::LoopMerge,
            &[merge, cont, misc::CONTROL_NONE],
        );

        if test_first {
            if let Some(condition) = condition {
                let check = self.id();
                push_inst(&mut ctx.body, Op::Branch, &[check]);
                push_inst(&mut ctx.body, Op::Label, &[check]);
                ctx.terminated = false;
                let (cond, _) = self.emit_expr(ctx, condition)?;
                push_inst(
                    &mut ctx.body,
                    Op::BranchConditional,
                    &[cond, body_label, merge],
                );
            } else {
                push_inst(&mut ctx.body, Op::Branch, &[body_label]);
            }
        } else {
            push_inst(&mut ctx.body, Op::Branch, &[body_label]);
        }

        push_inst(&mut ctx.body, Op::Label, &[body_label]);
        ctx.terminated = false;
        ctx.loop_stack.push((merge, cont));
        for s in body {
            self.emit_statement(ctx, s)?;
        }
        ctx.loop_stack.pop();
        if !ctx.terminated {
            push_inst(&mut ctx.body, Op::Branch, &[cont]);
        }

        push_inst(&mut ctx.body, Op::Label, &[cont]);
        ctx.terminated = false;
        if let Some(step) = step {
            let _ = self.emit_expr(ctx, step)?;
        }
        if test_first {
            push_inst(&mut ctx.body, Op::Branch, &[header]);
        } else {
            let condition = condition.expect("do-while always has a condition");
            let (cond, _) = self.emit_expr(ctx, condition)?;
            push_inst(
                &mut ctx.body,
                Op::BranchConditional,
                &[cond, header, merge],
            );
        }

        push_inst(&mut ctx.body, Op::Label, &[merge]);
        ctx.terminated = false;
        Ok(())
    }

    // --- pointers ---

    /// Resolves an expression to a pointer chain, when it is rooted in
    /// a variable. Returns `None` for pure values.
    fn emit_pointer(
        &mut self,
        ctx: &mut FnCtx,
        expr: Handle<Expression>,
    ) -> Result<Option<Ptr>, BackendError> {
        match &self.module.expressions[expr] {
            Expression::Variable(name) => {
                if let Some(&(id, ty)) = ctx.vars.get(name) {
                    let type_id = self.type_id(ty, false)?;
                    return Ok(Some(Ptr {
                        id,
                        type_id,
                        vt: ValueType::of(self.module, ty),
                        storage: storage::FUNCTION,
                        laid_out: false,
                    }));
                }
                let Some(&var) = self.global_vars.get(name) else {
                    return Err(unsupported(format!(
                        "reference to undeclared name `{name}`"
                    )));
                };
                let laid_out = var.wrapped;
                let type_id = self.type_id(var.ty, laid_out)?;
                if var.wrapped {
                    let zero = self.const_u32(0);
                    let ptr_ty = self.pointer_type(var.storage, type_id);
                    let id = self.id();
                    push_inst(
                        &mut ctx.body,
                        Op::AccessChain,
                        &[ptr_ty, id, var.id, zero],
                    );
                    return Ok(Some(Ptr {
                        id,
                        type_id,
                        vt: ValueType::of(self.module, var.ty),
                        storage: var.storage,
                        laid_out,
                    }));
                }
                Ok(Some(Ptr {
                    id: var.id,
                    type_id,
                    vt: ValueType::of(self.module, var.ty),
                    storage: var.storage,
                    laid_out,
                }))
            }
            Expression::AccessIndex { base, index } => {
                let (base, index) = (*base, *index);
                let Some(ptr) = self.emit_pointer(ctx, base)? else {
                    return Ok(None);
                };
                let (index_id, _) = self.emit_expr(ctx, index)?;
                let (elem_vt, elem_type) = match ptr.vt {
                    ValueType::Vector(_, scalar) => {
                        (ValueType::Scalar(scalar), self.scalar_type(scalar))
                    }
                    ValueType::Matrix(columns) => (
                        ValueType::Vector(columns, Primitive::Float),
                        self.vector_type(columns, Primitive::Float),
                    ),
                    ValueType::Composite(handle) => match &self.module.types[handle].inner {
                        TypeInner::Array { base, .. } => {
                            let base = *base;
                            (
                                ValueType::of(self.module, base),
                                self.type_id(base, ptr.laid_out)?,
                            )
                        }
                        _ => return Err(unsupported("indexing a non-indexable value".into())),
                    },
                    other => return Err(unsupported(format!("indexing into {other:?}"))),
                };
                Ok(Some(self.access_chain(ctx, &ptr, index_id, elem_type, elem_vt)))
            }
            Expression::AccessMember { base, member } => {
                let (base, member) = (*base, member.clone());
                let Some(ptr) = self.emit_pointer(ctx, base)? else {
                    return Ok(None);
                };
                let ValueType::Composite(handle) = ptr.vt else {
                    return Err(unsupported(format!(
                        "member access `.{member}` on non-struct"
                    )));
                };
                let (index, member_ty) = typeck::member_type(self.module, handle, &member)?;
                let index_id = self.const_u32(index);
                let elem_type = self.type_id(member_ty, ptr.laid_out)?;
                let elem_vt = ValueType::of(self.module, member_ty);
                Ok(Some(self.access_chain(ctx, &ptr, index_id, elem_type, elem_vt)))
            }
            Expression::Swizzle { base, pattern } if pattern.len() == 1 => {
                let (base, component) = (*base, pattern[0]);
                let Some(ptr) = self.emit_pointer(ctx, base)? else {
                    return Ok(None);
                };
                let ValueType::Vector(_, scalar) = ptr.vt else {
                    return Err(unsupported("swizzle on non-vector".into()));
                };
                let index_id = self.const_u32(component as u32);
                let elem_type = self.scalar_type(scalar);
                Ok(Some(self.access_chain(
                    ctx,
                    &ptr,
                    index_id,
                    elem_type,
                    ValueType::Scalar(scalar),
                )))
            }
            _ => Ok(None),
        }
    }

    fn access_chain(
        &mut self,
        ctx: &mut FnCtx,
        base: &Ptr,
        index: Word,
        elem_type: Word,
        elem_vt: ValueType,
    ) -> Ptr {
        let ptr_ty = self.pointer_type(base.storage, elem_type);
        let id = self.id();
        push_inst(&mut ctx.body, Op::AccessChain, &[ptr_ty, id, base.id, index]);
        Ptr {
            id,
            type_id: elem_type,
            vt: elem_vt,
            storage: base.storage,
            laid_out: base.laid_out,
        }
    }

    fn load(&mut self, ctx: &mut FnCtx, ptr: &Ptr) -> Result<(Word, ValueType), BackendError> {
        // Loads produce plain (non-decorated) values; the laid-out type
        // id only matters behind the pointer.
        let result_type = self.value_type_id(ptr.vt)?;
        let result_type = if ptr.laid_out { ptr.type_id } else { result_type };
        let id = self.id();
        push_inst(&mut ctx.body, Op::Load, &[result_type, id, ptr.id]);
        Ok((id, ptr.vt))
    }

    // --- expressions ---

    fn emit_expr(
        &mut self,
        ctx: &mut FnCtx,
        expr: Handle<Expression>,
    ) -> Result<(Word, ValueType), BackendError> {
        match &self.module.expressions[expr] {
            Expression::Constant(value) => {
                let value = value.clone();
                self.constant(&value)
            }
            Expression::Variable(_)
            | Expression::AccessIndex { .. }
            | Expression::AccessMember { .. } => {
                if let Some(ptr) = self.emit_pointer(ctx, expr)? {
                    return self.load(ctx, &ptr);
                }
                // Value-level fallback: composite extraction.
                match &self.module.expressions[expr] {
                    Expression::AccessMember { base, member } => {
                        let (base, member) = (*base, member.clone());
                        let (base_id, base_vt) = self.emit_expr(ctx, base)?;
                        let ValueType::Composite(handle) = base_vt else {
                            return Err(unsupported(format!(
                                "member access `.{member}` on non-struct value"
                            )));
                        };
                        let (index, member_ty) =
                            typeck::member_type(self.module, handle, &member)?;
                        let vt = ValueType::of(self.module, member_ty);
                        let result_type = self.value_type_id(vt)?;
                        let id = self.id();
                        push_inst(
                            &mut ctx.body,
                            Op::CompositeExtract,
                            &[result_type, id, base_id, index],
                        );
                        Ok((id, vt))
                    }
                    _ => Err(unsupported(
                        "dynamic indexing of a temporary value".into(),
                    )),
                }
            }
            Expression::Swizzle { base, pattern } => {
                let (base, pattern) = (*base, pattern.clone());
                if pattern.len() == 1 {
                    if let Some(ptr) = self.emit_pointer(ctx, expr)? {
                        return self.load(ctx, &ptr);
                    }
                }
                let (vector, base_vt) = self.emit_expr(ctx, base)?;
                let ValueType::Vector(_, scalar) = base_vt else {
                    return Err(unsupported("swizzle on non-vector".into()));
                };
                if pattern.len() == 1 {
                    let result_type = self.scalar_type(scalar);
                    let id = self.id();
                    push_inst(
                        &mut ctx.body,
                        Op::CompositeExtract,
                        &[result_type, id, vector, pattern[0] as Word],
                    );
                    return Ok((id, ValueType::Scalar(scalar)));
                }
                let size = VectorSize::from_count(pattern.len() as u32)
                    .ok_or_else(|| unsupported("swizzle pattern too long".into()))?;
                let result_type = self.vector_type(size, scalar);
                let id = self.id();
                let mut ops = vec![result_type, id, vector, vector];
                ops.extend(pattern.iter().map(|&c| c as Word));
                push_inst(&mut ctx.body, Op::VectorShuffle, &ops);
                Ok((id, ValueType::Vector(size, scalar)))
            }
            Expression::Assignment { op, target, value } => {
                let (op, target, value) = (*op, *target, *value);
                let ptr = self.emit_pointer(ctx, target)?.ok_or_else(|| {
                    unsupported("assignment target is not addressable".into())
                })?;
                let (mut rhs, rhs_vt) = self.emit_expr(ctx, value)?;
                if let Some(binop) = op.binary_op() {
                    let (current, cur_vt) = self.load(ctx, &ptr)?;
                    let (combined, _) =
                        self.emit_binary(ctx, binop, current, cur_vt, rhs, rhs_vt)?;
                    rhs = combined;
                }
                push_inst(&mut ctx.body, Op::Store, &[ptr.id, rhs]);
                Ok((rhs, ptr.vt))
            }
            Expression::Unary { op, operand } => {
                let (op, operand) = (*op, *operand);
                match op {
                    UnaryOp::Negate => {
                        let (value, vt) = self.emit_expr(ctx, operand)?;
                        let opcode = match vt.scalar() {
                            Some(Primitive::Float) => Op::FNegate,
                            Some(Primitive::Int) => Op::SNegate,
                            _ => {
                                return Err(unsupported(format!("negation of {vt:?}")));
                            }
                        };
                        let result_type = self.value_type_id(vt)?;
                        let id = self.id();
                        push_inst(&mut ctx.body, opcode, &[result_type, id, value]);
                        Ok((id, vt))
                    }
                    UnaryOp::LogicalNot => {
                        let (value, vt) = self.emit_expr(ctx, operand)?;
                        let result_type = self.value_type_id(vt)?;
                        let id = self.id();
                        push_inst(&mut ctx.body, Op::LogicalNot, &[result_type, id, value]);
                        Ok((id, vt))
                    }
                    UnaryOp::PreIncrement
                    | UnaryOp::PreDecrement
                    | UnaryOp::PostIncrement
                    | UnaryOp::PostDecrement => {
                        let ptr = self.emit_pointer(ctx, operand)?.ok_or_else(|| {
                            unsupported("increment target is not addressable".into())
                        })?;
                        let (old, vt) = self.load(ctx, &ptr)?;
                        let one = match vt {
                            ValueType::Scalar(Primitive::Int) => self.const_i32(1),
                            ValueType::Scalar(Primitive::UInt) => self.const_u32(1),
                            ValueType::Scalar(Primitive::Float) => self.const_f32(1.0),
                            other => {
                                return Err(unsupported(format!("increment of {other:?}")))
                            }
                        };
                        let binop = if matches!(op, UnaryOp::PreIncrement | UnaryOp::PostIncrement)
                        {
                            BinaryOp::Add
                        } else {
                            BinaryOp::Subtract
                        };
                        let (new, _) = self.emit_binary(ctx, binop, old, vt, one, vt)?;
                        push_inst(&mut ctx.body, Op::Store, &[ptr.id, new]);
                        Ok((if op.is_postfix() { old } else { new }, vt))
                    }
                }
            }
            Expression::Binary { op, left, right } => {
                let (op, left, right) = (*op, *left, *right);
                let (lhs, lt) = self.emit_expr(ctx, left)?;
                let (rhs, rt) = self.emit_expr(ctx, right)?;
                self.emit_binary(ctx, op, lhs, lt, rhs, rt)
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let (function, arguments) = (function.clone(), arguments.clone());
                let args = arguments
                    .iter()
                    .map(|&a| self.emit_expr(ctx, a).map(|(id, _)| id))
                    .collect::<Result<Vec<_>, _>>()?;
                let sig = self.fn_sigs.get(&function).ok_or_else(|| {
                    unsupported(format!("call to undeclared function `{function}`"))
                })?;
                let (fn_id, result_type) = (sig.id, sig.result_type);
                let vt = match ctx.env.function_result(&function) {
                    Some(Some(ty)) => ValueType::of(self.module, ty),
                    _ => ValueType::Void,
                };
                let id = self.id();
                let mut ops = vec![result_type, id, fn_id];
                ops.extend(&args);
                push_inst(&mut ctx.body, Op::FunctionCall, &ops);
                Ok((id, vt))
            }
            Expression::BuiltInCall {
                function,
                arguments,
            } => {
                let (function, arguments) = (*function, arguments.clone());
                self.emit_builtin(ctx, function, &arguments)
            }
            Expression::Cast { ty, arguments } => {
                let (ty, arguments) = (*ty, arguments.clone());
                self.emit_cast(ctx, ty, &arguments)
            }
            Expression::Ternary {
                condition,
                accept,
                reject,
            } => {
                let (condition, accept, reject) = (*condition, *accept, *reject);
                let (cond, _) = self.emit_expr(ctx, condition)?;
                let (a, vt) = self.emit_expr(ctx, accept)?;
                let (b, _) = self.emit_expr(ctx, reject)?;
                let result_type = self.value_type_id(vt)?;
                let id = self.id();
                push_inst(&mut ctx.body, Op::Select, &[result_type, id, cond, a, b]);
                Ok((id, vt))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_binary(
        &mut self,
        ctx: &mut FnCtx,
        op: BinaryOp,
        mut lhs: Word,
        mut lt: ValueType,
        mut rhs: Word,
        mut rt: ValueType,
    ) -> Result<(Word, ValueType), BackendError> {
        use BinaryOp::*;

        // Matrix and mixed vector/scalar products have dedicated opcodes.
        if op == Multiply {
            let special = match (lt, rt) {
                (ValueType::Matrix(n), ValueType::Vector(..)) => {
                    Some((Op::MatrixTimesVector, ValueType::Vector(n, Primitive::Float)))
                }
                (ValueType::Vector(n, _), ValueType::Matrix(_)) => {
                    Some((Op::VectorTimesMatrix, ValueType::Vector(n, Primitive::Float)))
                }
                (ValueType::Matrix(n), ValueType::Matrix(_)) => {
                    Some((Op::MatrixTimesMatrix, ValueType::Matrix(n)))
                }
                (ValueType::Matrix(n), ValueType::Scalar(Primitive::Float)) => {
                    Some((Op::MatrixTimesScalar, ValueType::Matrix(n)))
                }
                (ValueType::Scalar(Primitive::Float), ValueType::Matrix(n)) => {
                    std::mem::swap(&mut lhs, &mut rhs);
                    Some((Op::MatrixTimesScalar, ValueType::Matrix(n)))
                }
                (ValueType::Vector(n, Primitive::Float), ValueType::Scalar(Primitive::Float)) => {
                    Some((Op::VectorTimesScalar, ValueType::Vector(n, Primitive::Float)))
                }
                (ValueType::Scalar(Primitive::Float), ValueType::Vector(n, Primitive::Float)) => {
                    std::mem::swap(&mut lhs, &mut rhs);
                    Some((Op::VectorTimesScalar, ValueType::Vector(n, Primitive::Float)))
                }
                _ => None,
            };
            if let Some((opcode, vt)) = special {
                let result_type = self.value_type_id(vt)?;
                let id = self.id();
                push_inst(&mut ctx.body, opcode, &[result_type, id, lhs, rhs]);
                return Ok((id, vt));
            }
        }

        // Other vector/scalar mixes splat the scalar side first.
        if let (ValueType::Vector(size, a), ValueType::Scalar(b)) = (lt, rt) {
            if a == b {
                rhs = self.splat(ctx, rhs, size, b)?;
                rt = lt;
            }
        } else if let (ValueType::Scalar(a), ValueType::Vector(size, b)) = (lt, rt) {
            if a == b {
                lhs = self.splat(ctx, lhs, size, a)?;
                lt = rt;
            }
        }

        let scalar = lt.scalar().ok_or_else(|| {
            unsupported(format!("operator {op:?} on {lt:?} and {rt:?}"))
        })?;
        let _ = rt;

        let (opcode, result_vt) = match (op, scalar) {
            (Add, Primitive::Float) => (Op::FAdd, lt),
            (Add, Primitive::Int | Primitive::UInt) => (Op::IAdd, lt),
            (Subtract, Primitive::Float) => (Op::FSub, lt),
            (Subtract, Primitive::Int | Primitive::UInt) => (Op::ISub, lt),
            (Multiply, Primitive::Float) => (Op::FMul, lt),
            (Multiply, Primitive::Int | Primitive::UInt) => (Op::IMul, lt),
            (Divide, Primitive::Float) => (Op::FDiv, lt),
            (Divide, Primitive::Int) => (Op::SDiv, lt),
            (Divide, Primitive::UInt) => (Op::UDiv, lt),
            (Modulo, Primitive::Float) => (Op::FRem, lt),
            (Modulo, Primitive::Int) => (Op::SRem, lt),
            (Modulo, Primitive::UInt) => (Op::UMod, lt),
            (Less, Primitive::Float) => (Op::FOrdLessThan, ValueType::Scalar(Primitive::Bool)),
            (Less, Primitive::Int) => (Op::SLessThan, ValueType::Scalar(Primitive::Bool)),
            (Less, Primitive::UInt) => (Op::ULessThan, ValueType::Scalar(Primitive::Bool)),
            (Greater, Primitive::Float) => {
                (Op::FOrdGreaterThan, ValueType::Scalar(Primitive::Bool))
            }
            (Greater, Primitive::Int) => (Op::SGreaterThan, ValueType::Scalar(Primitive::Bool)),
            (Greater, Primitive::UInt) => (Op::UGreaterThan, ValueType::Scalar(Primitive::Bool)),
            (LessEqual, Primitive::Float) => {
                (Op::FOrdLessThanEqual, ValueType::Scalar(Primitive::Bool))
            }
            (LessEqual, Primitive::Int) => {
                (Op::SLessThanEqual, ValueType::Scalar(Primitive::Bool))
            }
            (LessEqual, Primitive::UInt) => {
                (Op::ULessThanEqual, ValueType::Scalar(Primitive::Bool))
            }
            (GreaterEqual, Primitive::Float) => (
                Op::FOrdGreaterThanEqual,
                ValueType::Scalar(Primitive::Bool),
            ),
            (GreaterEqual, Primitive::Int) => {
                (Op::SGreaterThanEqual, ValueType::Scalar(Primitive::Bool))
            }
            (GreaterEqual, Primitive::UInt) => {
                (Op::UGreaterThanEqual, ValueType::Scalar(Primitive::Bool))
            }
            (Equal, Primitive::Float) => (Op::FOrdEqual, ValueType::Scalar(Primitive::Bool)),
            (Equal, Primitive::Int | Primitive::UInt) => {
                (Op::IEqual, ValueType::Scalar(Primitive::Bool))
            }
            (Equal, Primitive::Bool) => (Op::LogicalEqual, ValueType::Scalar(Primitive::Bool)),
            (NotEqual, Primitive::Float) => {
                (Op::FOrdNotEqual, ValueType::Scalar(Primitive::Bool))
            }
            (NotEqual, Primitive::Int | Primitive::UInt) => {
                (Op::INotEqual, ValueType::Scalar(Primitive::Bool))
            }
            (NotEqual, Primitive::Bool) => {
                (Op::LogicalNotEqual, ValueType::Scalar(Primitive::Bool))
            }
            (LogicalAnd, Primitive::Bool) => {
                (Op::LogicalAnd, ValueType::Scalar(Primitive::Bool))
            }
            (LogicalOr, Primitive::Bool) => (Op::LogicalOr, ValueType::Scalar(Primitive::Bool)),
            (op, scalar) => {
                return Err(unsupported(format!("operator {op:?} on {scalar:?}")))
            }
        };

        let result_type = self.value_type_id(result_vt)?;
        let id = self.id();
        push_inst(&mut ctx.body, opcode, &[result_type, id, lhs, rhs]);
        Ok((id, result_vt))
    }

    fn splat(
        &mut self,
        ctx: &mut FnCtx,
        value: Word,
        size: VectorSize,
        scalar: Primitive,
    ) -> Result<Word, BackendError> {
        let result_type = self.vector_type(size, scalar);
        let id = self.id();
        let mut ops = vec![result_type, id];
        ops.extend(std::iter::repeat(value).take(size as usize));
        push_inst(&mut ctx.body, Op::CompositeConstruct, &ops);
        Ok(id)
    }

    fn emit_builtin(
        &mut self,
        ctx: &mut FnCtx,
        function: BuiltInFunction,
        arguments: &[Handle<Expression>],
    ) -> Result<(Word, ValueType), BackendError> {
        use BuiltInFunction::*;

        if function == SetVertexPosition {
            if self.stage != Stage::Vertex {
                return Err(unsupported(
                    "setVertexPosition is only available in the vertex stage".into(),
                ));
            }
            let (value, _) = self.emit_expr(ctx, arguments[0])?;
            let position = self.position_variable();
            push_inst(&mut ctx.body, Op::Store, &[position, value]);
            return Ok((value, ValueType::Void));
        }

        if function == Sample {
            let (sampler, sampler_vt) = self.emit_expr(ctx, arguments[0])?;
            let (coords, _) = self.emit_expr(ctx, arguments[1])?;
            let ValueType::Sampler(_, scalar) = sampler_vt else {
                return Err(unsupported(format!(
                    "sample() expects a sampler, found {sampler_vt:?}"
                )));
            };
            let result_vt = ValueType::Vector(VectorSize::Quad, scalar);
            let result_type = self.value_type_id(result_vt)?;
            let id = self.id();
            match self.stage {
                Stage::Fragment => push_inst(
                    &mut ctx.body,
                    Op::ImageSampleImplicitLod,
                    &[result_type, id, sampler, coords],
                ),
                // Implicit derivatives only exist in fragment shaders.
                Stage::Vertex => {
                    let lod = self.const_f32(0.0);
                    push_inst(
                        &mut ctx.body,
                        Op::ImageSampleExplicitLod,
                        &[result_type, id, sampler, coords, misc::IMAGE_OPERAND_LOD, lod],
                    );
                }
            }
            return Ok((id, result_vt));
        }

        if function == Dot {
            let (a, _) = self.emit_expr(ctx, arguments[0])?;
            let (b, _) = self.emit_expr(ctx, arguments[1])?;
            let result_type = self.scalar_type(Primitive::Float);
            let id = self.id();
            push_inst(&mut ctx.body, Op::Dot, &[result_type, id, a, b]);
            return Ok((id, ValueType::Scalar(Primitive::Float)));
        }

        // The remainder map to GLSL.std.450 extended instructions.
        let args = arguments
            .iter()
            .map(|&a| self.emit_expr(ctx, a))
            .collect::<Result<Vec<_>, _>>()?;
        let first_vt = args[0].1;
        let scalar = first_vt.scalar();

        let (ext, result_vt) = match function {
            Min => (pick_ext(scalar, GlslExt::FMin, GlslExt::SMin, GlslExt::UMin)?, first_vt),
            Max => (pick_ext(scalar, GlslExt::FMax, GlslExt::SMax, GlslExt::UMax)?, first_vt),
            Clamp => (
                pick_ext(scalar, GlslExt::FClamp, GlslExt::SClamp, GlslExt::UClamp)?,
                first_vt,
            ),
            Cross => (GlslExt::Cross, ValueType::Vector(VectorSize::Tri, Primitive::Float)),
            Norm => (GlslExt::Normalize, first_vt),
            Abs => (GlslExt::FAbs, first_vt),
            Floor => (GlslExt::Floor, first_vt),
            Ceil => (GlslExt::Ceil, first_vt),
            Fract => (GlslExt::Fract, first_vt),
            Mix => (GlslExt::FMix, first_vt),
            Step => (GlslExt::Step, first_vt),
            SmoothStep => (GlslExt::SmoothStep, first_vt),
            Pow => (GlslExt::Pow, first_vt),
            Sqrt => (GlslExt::Sqrt, first_vt),
            Sin => (GlslExt::Sin, first_vt),
            Cos => (GlslExt::Cos, first_vt),
            Tan => (GlslExt::Tan, first_vt),
            Length => (GlslExt::Length, ValueType::Scalar(Primitive::Float)),
            Distance => (GlslExt::Distance, ValueType::Scalar(Primitive::Float)),
            Reflect => (GlslExt::Reflect, first_vt),
            SetVertexPosition | Sample | Dot => unreachable!("handled above"),
        };

        let result_type = self.value_type_id(result_vt)?;
        let id = self.id();
        let mut ops = vec![result_type, id, self.glsl_ext, ext as Word];
        ops.extend(args.iter().map(|(id, _)| *id));
        push_inst(&mut ctx.body, Op::ExtInst, &ops);
        Ok((id, result_vt))
    }

    fn emit_cast(
        &mut self,
        ctx: &mut FnCtx,
        ty: Handle<Type>,
        arguments: &[Handle<Expression>],
    ) -> Result<(Word, ValueType), BackendError> {
        let target = ValueType::of(self.module, ty);
        match target {
            ValueType::Scalar(to) => {
                if arguments.len() != 1 {
                    return Err(unsupported("scalar cast takes exactly one argument".into()));
                }
                let (value, vt) = self.emit_expr(ctx, arguments[0])?;
                let ValueType::Scalar(from) = vt else {
                    return Err(unsupported(format!("cast from {vt:?} to {to:?}")));
                };
                self.scalar_cast(ctx, value, from, to)
            }
            ValueType::Vector(size, scalar) => {
                let args = arguments
                    .iter()
                    .map(|&a| self.emit_expr(ctx, a))
                    .collect::<Result<Vec<_>, _>>()?;
                let result_type = self.vector_type(size, scalar);
                if args.len() == 1 {
                    if let (id, ValueType::Scalar(s)) = args[0] {
                        if s == scalar {
                            let splatted = self.splat(ctx, id, size, scalar)?;
                            return Ok((splatted, target));
                        }
                    }
                }
                let id = self.id();
                let mut ops = vec![result_type, id];
                ops.extend(args.iter().map(|(id, _)| *id));
                push_inst(&mut ctx.body, Op::CompositeConstruct, &ops);
                Ok((id, target))
            }
            ValueType::Matrix(columns) => {
                if arguments.len() != columns as usize {
                    return Err(unsupported(
                        "matrix constructors take one column vector per column".into(),
                    ));
                }
                let args = arguments
                    .iter()
                    .map(|&a| self.emit_expr(ctx, a).map(|(id, _)| id))
                    .collect::<Result<Vec<_>, _>>()?;
                let result_type = self.matrix_type(columns);
                let id = self.id();
                let mut ops = vec![result_type, id];
                ops.extend(&args);
                push_inst(&mut ctx.body, Op::CompositeConstruct, &ops);
                Ok((id, target))
            }
            other => Err(unsupported(format!("constructor for {other:?}"))),
        }
    }

    fn scalar_cast(
        &mut self,
        ctx: &mut FnCtx,
        value: Word,
        from: Primitive,
        to: Primitive,
    ) -> Result<(Word, ValueType), BackendError> {
        use Primitive::*;
        let vt = ValueType::Scalar(to);
        if from == to {
            return Ok((value, vt));
        }
        let result_type = self.scalar_type(to);
        let id = self.id();
        match (from, to) {
            (Float, Int) => {
                push_inst(&mut ctx.body, Op::ConvertFToS, &[result_type, id, value])
            }
            (Float, UInt) => {
                push_inst(&mut ctx.body, Op::ConvertFToU, &[result_type, id, value])
            }
            (Int, Float) => {
                push_inst(&mut ctx.body, Op::ConvertSToF, &[result_type, id, value])
            }
            (UInt, Float) => {
                push_inst(&mut ctx.body, Op::ConvertUToF, &[result_type, id, value])
            }
            (Int, UInt) | (UInt, Int) => {
                push_inst(&mut ctx.body, Op::Bitcast, &[result_type, id, value])
            }
            (Bool, _) => {
                let (one, zero) = match to {
                    Int => (self.const_i32(1), self.const_i32(0)),
                    UInt => (self.const_u32(1), self.const_u32(0)),
                    Float => (self.const_f32(1.0), self.const_f32(0.0)),
                    Bool => unreachable!("from == to handled above"),
                };
                push_inst(
                    &mut ctx.body,
                    Op::Select,
                    &[result_type, id, value, one, zero],
                );
            }
            (_, Bool) => {
                let zero = match from {
                    Int => self.const_i32(0),
                    UInt => self.const_u32(0),
                    Float => self.const_f32(0.0),
                    Bool => unreachable!("from == to handled above"),
                };
                let opcode = if from == Float {
                    Op::FOrdNotEqual
                } else {
                    Op::INotEqual
                };
                push_inst(&mut ctx.body, opcode, &[result_type, id, value, zero]);
            }
            (Int, Int) | (UInt, UInt) | (Float, Float) => {
                unreachable!("from == to handled above")
            }
        }
        Ok((id, vt))
    }
}

fn pick_ext(
    scalar: Option<Primitive>,
    float: GlslExt,
    int: GlslExt,
    uint: GlslExt,
) -> Result<GlslExt, BackendError> {
    match scalar {
        Some(Primitive::Float) => Ok(float),
        Some(Primitive::Int) => Ok(int),
        Some(Primitive::UInt) => Ok(uint),
        other => Err(unsupported(format!("builtin call on {other:?} operand"))),
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Collects every local variable declaration in a body, depth first.
fn collect_locals(block: &[Statement], out: &mut Vec<(String, Handle<Type>)>) {
    for stmt in block {
        match stmt {
            Statement::VariableDeclaration { name, ty, .. } => out.push((name.clone(), *ty)),
            Statement::Conditional { accept, reject, .. } => {
                collect_locals(accept, out);
                collect_locals(reject, out);
            }
            Statement::For { init, body, .. } => {
                if let Some(init) = init {
                    collect_locals(std::slice::from_ref(init.as_ref()), out);
                }
                collect_locals(body, out);
            }
            Statement::While { body, .. } | Statement::DoWhile { body, .. } => {
                collect_locals(body, out);
            }
            Statement::Sequence(block) => collect_locals(block, out),
            _ => {}
        }
    }
}
