//! Resolves a core's frame buffer locator exports into a re-derivable window.

use thiserror::Error;
use wasmtime::{Extern, Instance, Memory, Store, Val};

use crate::abi;

/// Failed to resolve (or re-resolve) the frame buffer window from a core's
/// exports. Fatal to the display path; the bridge reports it and does not
/// retry on its own.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("core does not export a linear memory named `{0}`")]
    MissingMemory(&'static str),

    #[error("core export `{name}` is missing")]
    MissingExport { name: &'static str },

    #[error("core export `{name}` is neither an i32 global nor a `() -> i32` function")]
    WrongExportType { name: &'static str },

    #[error("core export `{name}` trapped when called: {message}")]
    AccessorTrapped { name: &'static str, message: String },

    #[error("core reports a frame buffer capacity of zero")]
    ZeroCapacity,

    #[error("frame buffer offset {offset} is beyond the current memory size {memory_len}")]
    OffsetOutOfBounds { offset: usize, memory_len: usize },
}

/// Location of the packed frame buffer inside the core's linear memory.
///
/// Only the offset and capacity are retained. The backing bytes are re-sliced
/// from the live memory on every use ([`FrameBufferWindow::slice_in`]), so a
/// window can never dangle into a detached buffer after the core grows its
/// memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBufferWindow {
    offset: u32,
    capacity: u32,
}

impl FrameBufferWindow {
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Allocated maximum in bytes; independent of (and at least) the active
    /// config's packed length.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Borrows the window's bytes out of the current memory contents.
    ///
    /// The usable window is clamped to the end of `mem`: a core may declare
    /// its eventual capacity before growing memory to cover it. An offset at
    /// or past the end of `mem` is an error.
    pub fn slice_in<'a>(&self, mem: &'a [u8]) -> Result<&'a [u8], BindError> {
        let offset = self.offset as usize;
        if offset >= mem.len() {
            return Err(BindError::OffsetOutOfBounds {
                offset,
                memory_len: mem.len(),
            });
        }
        let end = offset.saturating_add(self.capacity as usize).min(mem.len());
        Ok(&mem[offset..end])
    }
}

/// Resolves the core's memory and locator exports.
///
/// Each locator may be an immutable i32 global (the value is used directly)
/// or a nullary accessor function (called once per bind). The returned
/// window is only a descriptor; call [`FrameBufferWindow::slice_in`] against
/// the memory's current data to read frame bytes.
pub fn bind_window<T>(
    instance: &Instance,
    store: &mut Store<T>,
) -> Result<(Memory, FrameBufferWindow), BindError> {
    let memory = instance
        .get_memory(&mut *store, abi::EXPORT_MEMORY)
        .ok_or(BindError::MissingMemory(abi::EXPORT_MEMORY))?;

    let offset = resolve_locator(instance, store, abi::EXPORT_FB_OFFSET)?;
    let capacity = resolve_locator(instance, store, abi::EXPORT_FB_CAPACITY)?;
    if capacity == 0 {
        return Err(BindError::ZeroCapacity);
    }

    let window = FrameBufferWindow { offset, capacity };
    let memory_len = memory.data_size(&*store);
    if window.offset as usize >= memory_len {
        return Err(BindError::OffsetOutOfBounds {
            offset: window.offset as usize,
            memory_len,
        });
    }
    Ok((memory, window))
}

/// Reads one locator export. Wasm addresses are unsigned, so the raw i32 is
/// reinterpreted as `u32`.
fn resolve_locator<T>(
    instance: &Instance,
    store: &mut Store<T>,
    name: &'static str,
) -> Result<u32, BindError> {
    let export = instance
        .get_export(&mut *store, name)
        .ok_or(BindError::MissingExport { name })?;
    match export {
        Extern::Global(global) => match global.get(&mut *store) {
            Val::I32(value) => Ok(value as u32),
            _ => Err(BindError::WrongExportType { name }),
        },
        Extern::Func(func) => {
            let accessor = func
                .typed::<(), i32>(&*store)
                .map_err(|_| BindError::WrongExportType { name })?;
            let value = accessor
                .call(&mut *store, ())
                .map_err(|e| BindError::AccessorTrapped {
                    name,
                    message: e.to_string(),
                })?;
            Ok(value as u32)
        }
        _ => Err(BindError::WrongExportType { name }),
    }
}
