//! Synthesizes small compute-core modules (the CLI demo and test fixtures).
//!
//! A built core is complete and self-contained: it imports the bridge's
//! `env` surface, owns and exports its linear memory, and seeds its frame
//! buffer through a data segment. Options also cover the deliberately broken
//! export shapes the binder must refuse.

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction,
    MemorySection, MemoryType, Module, TypeSection, ValType,
};

use crate::abi;

/// How the frame buffer locators are exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorShape {
    /// Immutable i32 globals holding the values directly.
    Globals,
    /// Nullary `() -> i32` functions returning the values.
    Accessors,
    /// Correctly typed accessor functions whose bodies trap; binding must
    /// surface the trap as a failure.
    TrappingAccessors,
    /// i64 globals; binding must refuse these.
    MistypedGlobals,
}

/// Seed bytes placed at the frame buffer offset by a data segment.
///
/// The segment is written at instantiation, so it must land inside the
/// initial memory (before any `grow_pages`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPattern {
    /// No data segment; memory stays zeroed.
    None,
    /// Alternating `0xAA` / `0x55` rows: a one-pixel checkerboard at depth 1.
    Checker { row_bytes: u32, rows: u32 },
    /// The same byte everywhere.
    Solid { value: u8, len: u32 },
}

/// Knobs for [`build_demo_core`].
///
/// The defaults produce a well-behaved core: one memory page, a checkerboard
/// frame seeded for the default 320x200 geometry, a `request_config` for it
/// (status code reported through `trace`), and a solid footer band drawn via
/// the imported `memset`.
#[derive(Debug, Clone, Copy)]
pub struct DemoCoreOptions {
    pub memory_pages: u32,
    pub fb_offset: u32,
    pub fb_capacity: u32,
    pub locator_shape: LocatorShape,
    pub export_memory: bool,
    pub export_start: bool,
    pub export_fb_offset: bool,
    pub export_fb_capacity: bool,
    /// Emit `unreachable` at the top of `start`, so calling it traps.
    pub trap_in_start: bool,
    /// `(wide, high, depth, zoom)` passed to `request_config` from `start`.
    pub requested_config: Option<(u32, u32, u32, u32)>,
    /// Times the request's status code is traced (a loop in the core).
    pub trace_repeat: u32,
    pub seed: SeedPattern,
    /// Pages grown at the top of `start`, before any other work.
    pub grow_pages: u32,
    /// `(offset relative to the frame buffer, value, len)` filled through the
    /// imported `memset` at the end of `start`.
    pub memset_fill: Option<(u32, u8, u32)>,
}

impl Default for DemoCoreOptions {
    fn default() -> Self {
        Self {
            memory_pages: 1,
            fb_offset: 1024,
            fb_capacity: 8192,
            locator_shape: LocatorShape::Globals,
            export_memory: true,
            export_start: true,
            export_fb_offset: true,
            export_fb_capacity: true,
            trap_in_start: false,
            requested_config: Some((320, 200, 1, 2)),
            trace_repeat: 1,
            seed: SeedPattern::Checker {
                row_bytes: 40,
                rows: 200,
            },
            // Solid band over the last 8 rows of the 320x200 frame.
            memset_fill: Some((7680, 0xFF, 320)),
            grow_pages: 0,
        }
    }
}

// Function index space: imports first, in this order, then defined functions.
const FUNC_TRACE: u32 = 0;
const FUNC_REQUEST_CONFIG: u32 = 1;
const FUNC_MEMSET: u32 = 2;
const FUNC_START: u32 = 3;
const FUNC_FB_OFFSET: u32 = 4;
const FUNC_FB_CAPACITY: u32 = 5;

/// Emits a complete core module for `options`.
pub fn build_demo_core(options: &DemoCoreOptions) -> Vec<u8> {
    let mut module = Module::new();

    let mut types = TypeSection::new();
    let ty_trace = types.len();
    types.ty().function([ValType::I32], []);
    let ty_request_config = types.len();
    types.ty().function([ValType::I32; 4], [ValType::I32]);
    let ty_memset = types.len();
    types
        .ty()
        .function([ValType::I32, ValType::I32, ValType::I32], [ValType::I32]);
    let ty_start = types.len();
    types.ty().function([], []);
    let ty_accessor = types.len();
    types.ty().function([], [ValType::I32]);
    module.section(&types);

    let mut imports = ImportSection::new();
    imports.import(
        abi::IMPORT_MODULE,
        abi::IMPORT_TRACE,
        EntityType::Function(ty_trace),
    );
    imports.import(
        abi::IMPORT_MODULE,
        abi::IMPORT_REQUEST_CONFIG,
        EntityType::Function(ty_request_config),
    );
    imports.import(
        abi::IMPORT_MODULE,
        abi::IMPORT_MEMSET,
        EntityType::Function(ty_memset),
    );
    module.section(&imports);

    let use_accessors = matches!(
        options.locator_shape,
        LocatorShape::Accessors | LocatorShape::TrappingAccessors
    );

    let mut funcs = FunctionSection::new();
    funcs.function(ty_start);
    if use_accessors {
        funcs.function(ty_accessor);
        funcs.function(ty_accessor);
    }
    module.section(&funcs);

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: u64::from(options.memory_pages),
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });
    module.section(&memories);

    if !use_accessors {
        let mut globals = GlobalSection::new();
        match options.locator_shape {
            LocatorShape::Globals => {
                for value in [options.fb_offset, options.fb_capacity] {
                    globals.global(
                        GlobalType {
                            val_type: ValType::I32,
                            mutable: false,
                            shared: false,
                        },
                        &ConstExpr::i32_const(value as i32),
                    );
                }
            }
            LocatorShape::MistypedGlobals => {
                for value in [options.fb_offset, options.fb_capacity] {
                    globals.global(
                        GlobalType {
                            val_type: ValType::I64,
                            mutable: false,
                            shared: false,
                        },
                        &ConstExpr::i64_const(i64::from(value)),
                    );
                }
            }
            LocatorShape::Accessors | LocatorShape::TrappingAccessors => unreachable!(),
        }
        module.section(&globals);
    }

    let mut exports = ExportSection::new();
    if options.export_memory {
        exports.export(abi::EXPORT_MEMORY, ExportKind::Memory, 0);
    }
    if options.export_start {
        exports.export(abi::EXPORT_START, ExportKind::Func, FUNC_START);
    }
    let (locator_kind, offset_idx, capacity_idx) = if use_accessors {
        (ExportKind::Func, FUNC_FB_OFFSET, FUNC_FB_CAPACITY)
    } else {
        (ExportKind::Global, 0, 1)
    };
    if options.export_fb_offset {
        exports.export(abi::EXPORT_FB_OFFSET, locator_kind, offset_idx);
    }
    if options.export_fb_capacity {
        exports.export(abi::EXPORT_FB_CAPACITY, locator_kind, capacity_idx);
    }
    module.section(&exports);

    let mut code = CodeSection::new();
    code.function(&start_body(options));
    if use_accessors {
        for value in [options.fb_offset, options.fb_capacity] {
            let mut accessor = Function::new([]);
            if options.locator_shape == LocatorShape::TrappingAccessors {
                accessor.instruction(&Instruction::Unreachable);
            } else {
                accessor.instruction(&Instruction::I32Const(value as i32));
            }
            accessor.instruction(&Instruction::End);
            code.function(&accessor);
        }
    }
    module.section(&code);

    let seed = seed_bytes(options.seed);
    if !seed.is_empty() {
        let mut data = DataSection::new();
        data.active(
            0,
            &ConstExpr::i32_const(options.fb_offset as i32),
            seed.iter().copied(),
        );
        module.section(&data);
    }

    module.finish()
}

/// `start` body: grow, request + trace, memset, in that order.
fn start_body(options: &DemoCoreOptions) -> Function {
    // Locals: 0 = request status code, 1 = trace loop counter.
    let mut start = Function::new([(2, ValType::I32)]);

    if options.trap_in_start {
        start.instruction(&Instruction::Unreachable);
    }

    if options.grow_pages > 0 {
        start.instruction(&Instruction::I32Const(options.grow_pages as i32));
        start.instruction(&Instruction::MemoryGrow(0));
        start.instruction(&Instruction::Drop);
    }

    if let Some((wide, high, depth, zoom)) = options.requested_config {
        for arg in [wide, high, depth, zoom] {
            start.instruction(&Instruction::I32Const(arg as i32));
        }
        start.instruction(&Instruction::Call(FUNC_REQUEST_CONFIG));
        start.instruction(&Instruction::LocalSet(0));

        if options.trace_repeat > 0 {
            start.instruction(&Instruction::I32Const(options.trace_repeat as i32));
            start.instruction(&Instruction::LocalSet(1));
            start.instruction(&Instruction::Block(BlockType::Empty));
            start.instruction(&Instruction::Loop(BlockType::Empty));
            start.instruction(&Instruction::LocalGet(1));
            start.instruction(&Instruction::I32Eqz);
            start.instruction(&Instruction::BrIf(1));
            start.instruction(&Instruction::LocalGet(0));
            start.instruction(&Instruction::Call(FUNC_TRACE));
            start.instruction(&Instruction::LocalGet(1));
            start.instruction(&Instruction::I32Const(1));
            start.instruction(&Instruction::I32Sub);
            start.instruction(&Instruction::LocalSet(1));
            start.instruction(&Instruction::Br(0));
            start.instruction(&Instruction::End);
            start.instruction(&Instruction::End);
        }
    }

    if let Some((rel_offset, value, len)) = options.memset_fill {
        start.instruction(&Instruction::I32Const(
            options.fb_offset.wrapping_add(rel_offset) as i32,
        ));
        start.instruction(&Instruction::I32Const(i32::from(value)));
        start.instruction(&Instruction::I32Const(len as i32));
        start.instruction(&Instruction::Call(FUNC_MEMSET));
        start.instruction(&Instruction::Drop);
    }

    start.instruction(&Instruction::End);
    start
}

fn seed_bytes(seed: SeedPattern) -> Vec<u8> {
    match seed {
        SeedPattern::None => Vec::new(),
        SeedPattern::Checker { row_bytes, rows } => {
            let mut out = Vec::with_capacity((row_bytes * rows) as usize);
            for row in 0..rows {
                let byte = if row % 2 == 0 { 0xAA } else { 0x55 };
                out.extend(std::iter::repeat(byte).take(row_bytes as usize));
            }
            out
        }
        SeedPattern::Solid { value, len } => vec![value; len as usize],
    }
}
