use crate::config::GcConfig;
use crate::object::{hash_string, GcRef, LString, Obj, ObjKind, UpvalueState};
use crate::table::Table;
use crate::trace::Trace;
use crate::value::Value;
use std::ptr::NonNull;

/// Owns every heap object this interpreter has allocated, plus the table of
/// interned strings. One `Heap` is created per interpreter session (the
/// REPL keeps the same one across lines, matching clox's single process
/// lifetime); it is threaded explicitly through the compiler and VM rather
/// than reached through a process-global, which is what lets more than one
/// `fax` interpreter exist in the same process.
pub struct Heap {
    objects: Option<NonNull<Obj>>,
    strings: Table,
    gray_stack: Vec<GcRef>,
    bytes_allocated: usize,
    next_gc: usize,
    config: GcConfig,
}

impl Heap {
    pub fn new(config: GcConfig) -> Self {
        let next_gc = config.initial_threshold;
        Heap { objects: None, strings: Table::new(), gray_stack: Vec::new(), bytes_allocated: 0, next_gc, config }
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    fn push_object(&mut self, kind: ObjKind) -> GcRef {
        let size = approx_size(&kind);
        let obj = Box::new(Obj::new(kind, self.objects));
        let ptr = NonNull::from(Box::leak(obj));
        self.objects = Some(ptr);
        self.bytes_allocated += size;
        GcRef::from_raw(ptr)
    }

    /// Allocate any heap object that is not a string. Strings always go
    /// through [`Heap::intern`] instead, so equal strings are always the
    /// same allocation.
    pub fn alloc(&mut self, kind: ObjKind) -> GcRef {
        debug_assert!(!matches!(kind, ObjKind::Str(_)), "use Heap::intern for strings");
        self.push_object(kind)
    }

    /// Look up or create the canonical allocation for `s`. Two calls with
    /// equal content always return the same `GcRef`, which is what lets the
    /// VM compare strings with pointer equality (`table.c`'s
    /// `tableFindString`).
    pub fn intern(&mut self, s: &str) -> GcRef {
        let hash = hash_string(s.as_bytes());
        if let Some(existing) = self.strings.find_string(s, hash) {
            return existing;
        }
        let r = self.push_object(ObjKind::Str(LString { chars: s.to_string(), hash }));
        // Interned strings are a weak set: keyed by themselves, valued nil,
        // so `remove_unmarked_keys` can prune them once nothing else
        // references them without the table itself keeping them alive.
        self.strings.set(r, Value::Nil);
        r
    }

    pub fn should_collect(&self) -> bool {
        self.config.stress || self.bytes_allocated > self.next_gc
    }

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(r) = value {
            self.mark_object(r);
        }
    }

    pub fn mark_object(&mut self, r: GcRef) {
        if r.is_marked() {
            return;
        }
        r.set_marked(true);
        if self.config.log {
            tracing::trace!(kind = r.kind().type_name(), "mark");
        }
        self.gray_stack.push(r);
    }

    pub fn mark_table(&mut self, table: &Table) {
        let entries: Vec<_> = table.iter().collect();
        for (key, value) in entries {
            self.mark_object(key);
            self.mark_value(value);
        }
    }

    fn blacken(&mut self, r: GcRef) {
        match r.kind() {
            ObjKind::Str(_) | ObjKind::Native(_) => {}
            ObjKind::Upvalue(u) => {
                if let UpvalueState::Closed(v) = u.state {
                    self.mark_value(v);
                }
            }
            ObjKind::Function(f) => {
                if let Some(name) = f.name {
                    self.mark_object(name);
                }
                let constants: Vec<Value> = f.chunk.constants.clone();
                for v in constants {
                    self.mark_value(v);
                }
            }
            ObjKind::Closure(c) => {
                self.mark_object(c.function);
                let upvalues = c.upvalues.clone();
                for u in upvalues {
                    self.mark_object(u);
                }
            }
            ObjKind::Class(c) => {
                self.mark_object(c.name);
                self.mark_table(&c.methods);
            }
            ObjKind::Instance(i) => {
                self.mark_object(i.klass);
                self.mark_table(&i.fields);
            }
            ObjKind::BoundMethod(b) => {
                self.mark_value(b.receiver);
                self.mark_object(b.method);
            }
        }
    }

    fn sweep(&mut self) {
        let mut prev: Option<GcRef> = None;
        let mut current = self.objects;
        while let Some(ptr) = current {
            let r = GcRef::from_raw(ptr);
            let next = r.next();
            if r.is_marked() {
                r.set_marked(false);
                prev = Some(r);
                current = next;
            } else {
                current = next;
                match prev {
                    Some(p) => p.set_next(next),
                    None => self.objects = next,
                }
                self.bytes_allocated = self.bytes_allocated.saturating_sub(approx_size(r.kind()));
                // SAFETY: `r` is unreachable from every root just traced,
                // and nothing else in this crate hands out a `GcRef` to an
                // object that isn't still linked into `self.objects`.
                unsafe {
                    drop(Box::from_raw(ptr.as_ptr()));
                }
            }
        }
    }

    /// Run one full mark-and-sweep cycle, rooted at whatever `roots`
    /// currently represents the live mutator (the VM mid-interpret, or the
    /// compiler mid-compile).
    pub fn collect_garbage(&mut self, roots: &dyn Trace) {
        let _span = tracing::trace_span!("gc_cycle", before = self.bytes_allocated).entered();
        self.gray_stack.clear();
        roots.mark_roots(self);
        while let Some(r) = self.gray_stack.pop() {
            self.blacken(r);
        }
        self.strings.remove_unmarked_keys();
        self.sweep();
        self.next_gc = self.bytes_allocated * self.config.heap_grow_factor;
        if self.next_gc < self.config.initial_threshold {
            self.next_gc = self.config.initial_threshold;
        }
        if self.config.log {
            tracing::debug!(after = self.bytes_allocated, next_gc = self.next_gc, "gc cycle complete");
        }
    }

    /// Free every remaining object unconditionally. Called once, when the
    /// interpreter session ends, rather than relying on a final mark cycle
    /// (there is nothing left to root a trace from at shutdown).
    pub fn free_all(&mut self) {
        let mut current = self.objects.take();
        while let Some(ptr) = current {
            let r = GcRef::from_raw(ptr);
            current = r.next();
            unsafe {
                drop(Box::from_raw(ptr.as_ptr()));
            }
        }
        self.bytes_allocated = 0;
        self.strings = Table::new();
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.free_all();
    }
}

fn approx_size(kind: &ObjKind) -> usize {
    use std::mem::size_of;
    size_of::<Obj>()
        + match kind {
            ObjKind::Str(s) => s.chars.len(),
            ObjKind::Function(f) => f.chunk.code.len() + f.chunk.constants.len() * size_of::<Value>(),
            ObjKind::Closure(c) => c.upvalues.len() * size_of::<GcRef>(),
            ObjKind::Class(c) => c.methods.len() * size_of::<Value>(),
            ObjKind::Instance(i) => i.fields.len() * size_of::<Value>(),
            _ => 0,
        }
}
