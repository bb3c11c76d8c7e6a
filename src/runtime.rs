//! The RPL runtime: one contiguous arena holding every region.
//!
//! Memory layout, low to high:
//!
//! ```text
//!   0            start of globals (name/value pairs, packed)
//!   globals      base of temporaries
//!   temporaries  allocation cursor; editor buffer sits just above
//!   ...          red zone (REDZONE bytes must stay free)
//!   stack_top    top of the data stack (slots grow down)
//!   stack_bottom bottom of the data stack, always equal to returns
//!   returns      top of the return stack (slots grow down)
//!   high_mem     end of usable memory (word aligned)
//! ```
//!
//! Everything below `temporaries` is byte aligned; slots above `stack_top`
//! are 4-byte words holding object offsets or the null sentinel. The
//! compacting collector walks `[globals, temporaries)` once, keeps objects
//! referenced from any slot, the code register or a registered safe
//! pointer, and rewrites those references in place.

use crate::keyboard::{Key, KeyFifo};
use crate::object::{self, ObjRef};
use crate::settings::Settings;
use crate::{leb128, CoreError, Result};

/// Bytes kept free between the temporaries and the stack top.
pub const REDZONE: usize = 8;

const SLOT: usize = 4;
const MIN_MEMORY: usize = 256;
const NULL_RAW: u32 = u32::MAX;

fn gc_trace_enabled() -> bool {
    std::env::var("RPL_GC_TRACE").is_ok()
}

/// Handle to a registered safe pointer. Strictly LIFO: release order must
/// mirror registration order.
#[derive(Debug, Clone, Copy)]
pub struct Safe(usize);

pub struct Runtime {
    mem: Vec<u8>,
    globals: usize,
    temporaries: usize,
    stack_top: usize,
    stack_bottom: usize,
    returns: usize,
    high_mem: usize,
    editing: usize,
    code: ObjRef,
    safe: Vec<u32>,
    error: Option<String>,
    pub settings: Settings,
    pub keys: KeyFifo,
}

impl Runtime {
    /// Bind the runtime to a fresh arena of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::with_memory(vec![0u8; size.max(MIN_MEMORY)])
    }

    /// Bind the runtime to a caller-provided arena.
    pub fn with_memory(memory: Vec<u8>) -> Self {
        let mut mem = memory;
        if mem.len() < MIN_MEMORY {
            mem.resize(MIN_MEMORY, 0);
        }
        let high_mem = mem.len() & !(SLOT - 1);
        Runtime {
            mem,
            globals: 0,
            temporaries: 0,
            stack_top: high_mem,
            stack_bottom: high_mem,
            returns: high_mem,
            high_mem,
            editing: 0,
            code: ObjRef::NULL,
            safe: Vec::new(),
            error: None,
            settings: Settings::default(),
            keys: KeyFifo::new(),
        }
    }

    // ------------------------------------------------------------------
    // Raw memory access
    // ------------------------------------------------------------------

    pub(crate) fn mem_from(&self, addr: usize) -> &[u8] {
        &self.mem[addr.min(self.mem.len())..]
    }

    pub fn slice(&self, addr: usize, len: usize) -> &[u8] {
        &self.mem[addr..addr + len]
    }

    fn write_bytes(&mut self, addr: usize, bytes: &[u8]) {
        self.mem[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    fn read_slot(&self, addr: usize) -> u32 {
        let b = &self.mem[addr..addr + SLOT];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn write_slot(&mut self, addr: usize, value: u32) {
        self.mem[addr..addr + SLOT].copy_from_slice(&value.to_le_bytes());
    }

    // ------------------------------------------------------------------
    // Error slot
    // ------------------------------------------------------------------

    /// Record the display message for `err` and hand it back, so failure
    /// sites can write `return Err(rt.report(...))`.
    pub fn report(&mut self, err: CoreError) -> CoreError {
        self.error = Some(err.to_string());
        err
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ------------------------------------------------------------------
    // Temporaries
    // ------------------------------------------------------------------

    /// Space left for temporaries, red zone and open editor excluded.
    pub fn available(&self) -> usize {
        self.stack_top
            .saturating_sub(self.temporaries + self.editing + REDZONE)
    }

    fn ensure(&mut self, size: usize) -> Result<()> {
        if self.available() < size {
            self.gc();
        }
        if self.available() < size {
            return Err(self.report(CoreError::OutOfMemory));
        }
        Ok(())
    }

    /// Allocate a new temporary with the given id and payload bytes.
    pub fn allocate(&mut self, id: object::Id, payload: &[u8]) -> Result<ObjRef> {
        let mut bytes = Vec::with_capacity(1 + payload.len());
        leb128::write(&mut bytes, id as u128);
        bytes.extend_from_slice(payload);
        self.allocate_raw(&bytes)
    }

    /// Allocate a temporary from fully-encoded object bytes.
    pub fn allocate_raw(&mut self, bytes: &[u8]) -> Result<ObjRef> {
        let total = bytes.len();
        self.ensure(total)?;
        if self.editing > 0 {
            // Keep the editor buffer immediately above the temporaries.
            let ed = self.temporaries;
            self.mem.copy_within(ed..ed + self.editing, ed + total);
        }
        let at = self.temporaries;
        self.write_bytes(at, bytes);
        self.temporaries += total;
        Ok(ObjRef::at(at))
    }

    /// Dispose of a temporary. Only the most recent allocation is
    /// reclaimed immediately; anything else becomes dead space for the
    /// next collection.
    pub fn dispose(&mut self, o: ObjRef) {
        if self.editing == 0 && object::skip(self, o).addr() == self.temporaries {
            self.temporaries = o.addr();
        }
    }

    pub fn temporaries_size(&self) -> usize {
        self.temporaries - self.globals
    }

    // ------------------------------------------------------------------
    // Data stack
    // ------------------------------------------------------------------

    pub fn depth(&self) -> usize {
        (self.stack_bottom - self.stack_top) / SLOT
    }

    pub fn push(&mut self, o: ObjRef) -> Result<()> {
        // The space check may collect; `o` is often a fresh temporary that
        // nothing else references yet, so root it for the duration.
        let handle = self.protect(o);
        let checked = self.ensure(SLOT);
        let o = self.protected(handle);
        self.release(handle);
        checked?;
        self.stack_top -= SLOT;
        self.write_slot(self.stack_top, o.0);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<ObjRef> {
        if self.stack_top >= self.stack_bottom {
            return Err(self.report(CoreError::TooFewArguments));
        }
        let o = ObjRef(self.read_slot(self.stack_top));
        self.stack_top += SLOT;
        Ok(o)
    }

    pub fn top(&mut self) -> Result<ObjRef> {
        if self.stack_top >= self.stack_bottom {
            return Err(self.report(CoreError::TooFewArguments));
        }
        Ok(ObjRef(self.read_slot(self.stack_top)))
    }

    pub fn set_top(&mut self, o: ObjRef) -> Result<()> {
        if self.stack_top >= self.stack_bottom {
            return Err(self.report(CoreError::TooFewArguments));
        }
        self.write_slot(self.stack_top, o.0);
        Ok(())
    }

    /// Slot `level` counted from the top of the stack.
    pub fn stack(&mut self, level: usize) -> Result<ObjRef> {
        if level >= self.depth() {
            return Err(self.report(CoreError::InsufficientStackDepth));
        }
        Ok(ObjRef(self.read_slot(self.stack_top + level * SLOT)))
    }

    pub fn set_stack(&mut self, level: usize, o: ObjRef) -> Result<()> {
        if level >= self.depth() {
            return Err(self.report(CoreError::InsufficientStackDepth));
        }
        self.write_slot(self.stack_top + level * SLOT, o.0);
        Ok(())
    }

    /// Non-reporting read of slot `level`; `None` past the stack depth.
    pub fn peek(&self, level: usize) -> Option<ObjRef> {
        if level >= self.depth() {
            return None;
        }
        Some(ObjRef(self.read_slot(self.stack_top + level * SLOT)))
    }

    pub fn clear_stack(&mut self) {
        self.stack_top = self.stack_bottom;
    }

    // ------------------------------------------------------------------
    // Return stack
    // ------------------------------------------------------------------

    pub fn code(&self) -> ObjRef {
        self.code
    }

    pub fn return_depth(&self) -> usize {
        (self.high_mem - self.returns) / SLOT
    }

    /// Enter `callee`: save the current code reference on the return stack
    /// and shift the data-stack window down one slot so the push lands in
    /// freed space.
    pub fn call(&mut self, callee: ObjRef) -> Result<()> {
        // As in push: the callee may be an unrooted temporary until it
        // lands in the code register.
        let handle = self.protect(callee);
        let checked = self.ensure(SLOT);
        let callee = self.protected(handle);
        self.release(handle);
        checked?;
        self.mem
            .copy_within(self.stack_top..self.stack_bottom, self.stack_top - SLOT);
        self.stack_top -= SLOT;
        self.stack_bottom -= SLOT;
        self.returns -= SLOT;
        self.write_slot(self.returns, self.code.0);
        self.code = callee;
        Ok(())
    }

    /// Return to the caller saved by [`Runtime::call`].
    pub fn ret(&mut self) -> Result<()> {
        if self.returns >= self.high_mem {
            return Err(self.report(CoreError::CannotReturn));
        }
        self.code = ObjRef(self.read_slot(self.returns));
        self.returns += SLOT;
        self.mem
            .copy_within(self.stack_top..self.stack_bottom, self.stack_top + SLOT);
        self.stack_top += SLOT;
        self.stack_bottom += SLOT;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Safe pointers
    // ------------------------------------------------------------------

    /// Register `o` as a collection root until released. Handles must be
    /// released in LIFO order.
    pub fn protect(&mut self, o: ObjRef) -> Safe {
        self.safe.push(o.0);
        Safe(self.safe.len() - 1)
    }

    pub fn release(&mut self, handle: Safe) {
        debug_assert_eq!(handle.0 + 1, self.safe.len(), "safe pointers are LIFO");
        self.safe.truncate(handle.0);
    }

    /// Current (collection-adjusted) value of a registered safe pointer.
    pub fn protected(&self, handle: Safe) -> ObjRef {
        ObjRef(self.safe[handle.0])
    }

    pub fn set_protected(&mut self, handle: Safe, o: ObjRef) {
        self.safe[handle.0] = o.0;
    }

    /// Run `f` with `o` protected, releasing the handle on the way out.
    pub fn with_protected<T>(
        &mut self,
        o: ObjRef,
        f: impl FnOnce(&mut Runtime, Safe) -> T,
    ) -> T {
        let handle = self.protect(o);
        let out = f(self, handle);
        self.release(handle);
        out
    }

    // ------------------------------------------------------------------
    // Garbage collection
    // ------------------------------------------------------------------

    fn any_ref_in(&self, first: usize, last: usize) -> bool {
        let in_range = |raw: u32| {
            raw != NULL_RAW && (raw as usize) >= first && (raw as usize) < last
        };
        let mut at = self.stack_top;
        while at < self.stack_bottom {
            if in_range(self.read_slot(at)) {
                return true;
            }
            at += SLOT;
        }
        let mut at = self.returns;
        while at < self.high_mem {
            if in_range(self.read_slot(at)) {
                return true;
            }
            at += SLOT;
        }
        if in_range(self.code.0) {
            return true;
        }
        self.safe.iter().any(|&raw| in_range(raw))
    }

    /// Rewrite every live reference inside `[first, last)` by `delta`.
    fn adjust_refs(&mut self, first: usize, last: usize, delta: isize) {
        let adjust = |raw: u32| -> u32 {
            if raw != NULL_RAW && (raw as usize) >= first && (raw as usize) < last {
                (raw as isize + delta) as u32
            } else {
                raw
            }
        };
        let mut at = self.stack_top;
        while at < self.stack_bottom {
            let v = self.read_slot(at);
            let n = adjust(v);
            if n != v {
                self.write_slot(at, n);
            }
            at += SLOT;
        }
        let mut at = self.returns;
        while at < self.high_mem {
            let v = self.read_slot(at);
            let n = adjust(v);
            if n != v {
                self.write_slot(at, n);
            }
            at += SLOT;
        }
        self.code = ObjRef(adjust(self.code.0));
        for raw in self.safe.iter_mut() {
            let n = adjust(*raw);
            *raw = n;
        }
    }

    fn move_range(&mut self, first: usize, last: usize, to: usize) {
        if to == first || last <= first {
            return;
        }
        self.mem.copy_within(first..last, to);
        self.adjust_refs(first, last, to as isize - first as isize);
    }

    /// Recycle unreachable temporaries. Returns the number of bytes
    /// reclaimed.
    ///
    /// Single pass in address order: every object referenced from a stack
    /// slot, a return slot, the code register or a safe pointer (including
    /// references into its interior) is compacted downward and those
    /// references are rewritten; everything else is dropped. Object order
    /// is preserved, so the heap stays one-pass walkable.
    pub fn gc(&mut self) -> usize {
        let first = self.globals;
        let last = self.temporaries;
        let trace = gc_trace_enabled();
        let mut free = first;
        let mut recycled = 0usize;
        let mut obj = first;
        while obj < last {
            let size = object::size(self, ObjRef::at(obj));
            let next = obj + size;
            if size == 0 || next > last {
                debug_assert!(false, "malformed object at {obj:#x}");
                break;
            }
            if self.any_ref_in(obj, next) {
                if trace {
                    eprintln!("[gc] keep {obj:#x}..{next:#x} -> {free:#x}");
                }
                self.move_range(obj, next, free);
                free += size;
            } else {
                if trace {
                    eprintln!("[gc] drop {obj:#x}..{next:#x} ({size} bytes)");
                }
                recycled += size;
            }
            obj = next;
        }
        if self.editing > 0 && recycled > 0 {
            // The command-line buffer rides just above the temporaries.
            let ed = self.temporaries;
            self.mem.copy_within(ed..ed + self.editing, ed - recycled);
        }
        self.temporaries -= recycled;
        if trace {
            eprintln!(
                "[gc] recycled {recycled} bytes, live {}, available {}",
                self.temporaries - self.globals,
                self.available()
            );
        }
        recycled
    }

    // ------------------------------------------------------------------
    // Globals
    // ------------------------------------------------------------------

    /// Find a binding in the globals region: entry range and value.
    fn find_global(&self, name: &str) -> Option<(usize, usize, ObjRef)> {
        let mut at = 0;
        while at < self.globals {
            let name_ref = ObjRef::at(at);
            let value_at = at + object::size(self, name_ref);
            let end = value_at + object::size(self, ObjRef::at(value_at));
            if object::id_of(self, name_ref) == object::Id::Symbol
                && crate::text::symbol_value(self, name_ref) == Some(name)
            {
                return Some((at, end, ObjRef::at(value_at)));
            }
            at = end;
        }
        None
    }

    /// Store a copy of `value` under `name`, replacing any previous
    /// binding. The temporaries region shifts up to make room; every live
    /// reference into it is rewritten.
    pub fn store_global(&mut self, name: &str, value: ObjRef) -> Result<()> {
        let handle = self.protect(value);
        self.purge_global(name);
        let value = self.protected(handle);

        let mut entry = Vec::new();
        leb128::write(&mut entry, object::Id::Symbol as u128);
        leb128::write(&mut entry, name.len() as u128);
        entry.extend_from_slice(name.as_bytes());
        let vsize = object::size(self, value);
        entry.extend_from_slice(self.slice(value.addr(), vsize));
        self.release(handle);

        let len = entry.len();
        self.ensure(len)?;
        let top = self.temporaries + self.editing;
        self.mem.copy_within(self.globals..top, self.globals + len);
        self.adjust_refs(self.globals, self.temporaries, len as isize);
        self.write_bytes(self.globals, &entry);
        self.globals += len;
        self.temporaries += len;
        Ok(())
    }

    /// Push-ready temporary copy of the value bound to `name`.
    pub fn recall_global(&mut self, name: &str) -> Result<ObjRef> {
        match self.find_global(name) {
            Some((_, _, value)) => {
                let size = object::size(self, value);
                let bytes = self.slice(value.addr(), size).to_vec();
                self.allocate_raw(&bytes)
            }
            None => Err(self.report(CoreError::UndefinedName(name.to_string()))),
        }
    }

    /// Remove a binding. Returns false when the name was not bound.
    pub fn purge_global(&mut self, name: &str) -> bool {
        let Some((start, end, _)) = self.find_global(name) else {
            return false;
        };
        let len = end - start;
        let top = self.temporaries + self.editing;
        self.mem.copy_within(end..top, start);
        self.adjust_refs(end, self.temporaries, -(len as isize));
        self.globals -= len;
        self.temporaries -= len;
        true
    }

    pub fn globals_size(&self) -> usize {
        self.globals
    }

    // ------------------------------------------------------------------
    // Editor buffer
    // ------------------------------------------------------------------

    pub fn edit_len(&self) -> usize {
        self.editing
    }

    pub fn edit_bytes(&self) -> &[u8] {
        &self.mem[self.temporaries..self.temporaries + self.editing]
    }

    /// Append text to the command-line buffer above the temporaries.
    pub fn edit_insert(&mut self, textual: &str) -> Result<()> {
        let bytes = textual.as_bytes();
        self.ensure(bytes.len())?;
        let at = self.temporaries + self.editing;
        self.write_bytes(at, bytes);
        self.editing += bytes.len();
        Ok(())
    }

    pub fn edit_clear(&mut self) {
        self.editing = 0;
    }

    /// Close the editor: wrap its content into a text object in place and
    /// advance the temporaries past it.
    ///
    /// The header is written where the buffer used to start and the bytes
    /// shift up to make room, so no extra copy of the content is needed.
    pub fn close_editor(&mut self) -> Result<ObjRef> {
        let stored = self.editing + 1; // trailing NUL for C-style readers
        let mut header = Vec::new();
        leb128::write(&mut header, object::Id::Text as u128);
        leb128::write(&mut header, stored as u128);
        self.ensure(header.len() + 1)?;

        let at = self.temporaries;
        self.mem
            .copy_within(at..at + self.editing, at + header.len());
        self.write_bytes(at, &header);
        self.mem[at + header.len() + self.editing] = 0;
        self.temporaries = at + header.len() + stored;
        self.editing = 0;
        Ok(ObjRef::at(at))
    }

    // ------------------------------------------------------------------
    // Interruption
    // ------------------------------------------------------------------

    /// True while the key queue has EXIT pending at its head. Non-blocking
    /// and non-consuming; the key loop owns the queue.
    pub fn interrupted(&self) -> bool {
        self.keys.peek() == Some(Key::Exit)
    }
}
