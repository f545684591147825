use crate::chunk::Chunk;
use crate::table::Table;
use crate::value::Value;
use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

/// Discriminant the sweep phase and the `AS_*`-style accessors switch on.
/// One-to-one with clox's `ObjType`.
pub enum ObjKind {
    Str(LString),
    Function(LFunction),
    Native(LNative),
    Closure(LClosure),
    Upvalue(LUpvalue),
    Class(LClass),
    Instance(LInstance),
    BoundMethod(LBoundMethod),
}

impl ObjKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjKind::Str(_) => "string",
            ObjKind::Function(_) => "function",
            ObjKind::Native(_) => "native function",
            ObjKind::Closure(_) => "closure",
            ObjKind::Upvalue(_) => "upvalue",
            ObjKind::Class(_) => "class",
            ObjKind::Instance(_) => "instance",
            ObjKind::BoundMethod(_) => "bound method",
        }
    }
}

impl fmt::Display for ObjKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjKind::Str(s) => write!(f, "{}", s.chars),
            ObjKind::Function(fun) => match &fun.name {
                Some(name) => write!(f, "<fn {}>", name.as_string().chars),
                None => write!(f, "<script>"),
            },
            ObjKind::Native(_) => write!(f, "<native fn>"),
            ObjKind::Closure(c) => write!(f, "{}", c.function.kind()),
            ObjKind::Upvalue(_) => write!(f, "upvalue"),
            ObjKind::Class(c) => write!(f, "{}", c.name.as_string().chars),
            ObjKind::Instance(i) => write!(f, "{} instance", i.klass.as_string().chars),
            ObjKind::BoundMethod(b) => write!(f, "{}", b.method.kind()),
        }
    }
}

pub struct LString {
    pub chars: String,
    pub hash: u32,
}

pub struct LFunction {
    pub arity: u8,
    pub upvalue_count: u8,
    pub chunk: Chunk,
    pub name: Option<GcRef>,
}

impl LFunction {
    pub fn new() -> Self {
        LFunction { arity: 0, upvalue_count: 0, chunk: Chunk::new(), name: None }
    }
}

impl Default for LFunction {
    fn default() -> Self {
        LFunction::new()
    }
}

pub type NativeFn = fn(&[Value]) -> Value;

pub struct LNative {
    pub function: NativeFn,
}

/// Where an upvalue's value currently lives. While the frame that declared
/// the captured local is still on the stack the upvalue stays `Open`,
/// tracking the stack slot by index rather than by raw pointer (a stack
/// index survives exactly as long as the slot does and needs no unsafe
/// aliasing to read, unlike clox's `Value*` into a never-reallocated
/// array). `closeUpvalues` turns it `Closed` by copying the value out.
pub enum UpvalueState {
    Open(usize),
    Closed(Value),
}

pub struct LUpvalue {
    pub state: UpvalueState,
}

pub struct LClosure {
    pub function: GcRef,
    pub upvalues: Vec<GcRef>,
}

pub struct LClass {
    pub name: GcRef,
    pub methods: Table,
}

impl LClass {
    pub fn new(name: GcRef) -> Self {
        LClass { name, methods: Table::new() }
    }
}

pub struct LInstance {
    pub klass: GcRef,
    pub fields: Table,
}

impl LInstance {
    pub fn new(klass: GcRef) -> Self {
        LInstance { klass, fields: Table::new() }
    }
}

pub struct LBoundMethod {
    pub receiver: Value,
    pub method: GcRef,
}

/// Header every heap object carries: whether the last mark phase reached
/// it, and the intrusive link into the heap's all-objects list used for
/// sweeping. Matches the common `Obj` struct embedded as the first field
/// of every object type in `object.h`.
pub struct ObjHeader {
    marked: Cell<bool>,
    next: Cell<Option<NonNull<Obj>>>,
}

pub struct Obj {
    header: ObjHeader,
    kind: ObjKind,
}

impl Obj {
    pub(crate) fn new(kind: ObjKind, next: Option<NonNull<Obj>>) -> Obj {
        Obj { header: ObjHeader { marked: Cell::new(false), next: Cell::new(next) }, kind }
    }
}

/// A handle to a heap-allocated object.
///
/// This is a raw, unchecked pointer by design: the collector is the only
/// thing that ever frees the object it points to, and it only does so when
/// nothing reachable from the roots still holds one of these. Dereferencing
/// a `GcRef` outlives a collection that actually reclaimed it is the one
/// safety invariant the rest of this crate has to uphold.
#[derive(Clone, Copy)]
pub struct GcRef(NonNull<Obj>);

impl GcRef {
    pub(crate) fn from_raw(ptr: NonNull<Obj>) -> Self {
        GcRef(ptr)
    }

    pub(crate) fn as_raw(&self) -> NonNull<Obj> {
        self.0
    }

    pub fn kind(&self) -> &ObjKind {
        unsafe { &self.0.as_ref().kind }
    }

    /// Mutable access to the pointee. Every call site holds the only live
    /// `GcRef` it is mutating through at that moment, mirroring clox's
    /// `AS_INSTANCE(value)->fields` writes through a bare pointer.
    #[allow(clippy::mut_from_ref)]
    pub fn kind_mut(&self) -> &mut ObjKind {
        unsafe { &mut (*self.0.as_ptr()).kind }
    }

    pub fn same_object(&self, other: &GcRef) -> bool {
        self.0 == other.0
    }

    pub fn is_marked(&self) -> bool {
        unsafe { self.0.as_ref().header.marked.get() }
    }

    pub fn set_marked(&self, marked: bool) {
        unsafe { self.0.as_ref().header.marked.set(marked) }
    }

    pub(crate) fn next(&self) -> Option<NonNull<Obj>> {
        unsafe { self.0.as_ref().header.next.get() }
    }

    pub(crate) fn set_next(&self, next: Option<NonNull<Obj>>) {
        unsafe { self.0.as_ref().header.next.set(next) }
    }

    pub fn as_string(&self) -> &LString {
        match self.kind() {
            ObjKind::Str(s) => s,
            other => panic!("expected string, found {}", other.type_name()),
        }
    }

    pub fn as_function(&self) -> &LFunction {
        match self.kind() {
            ObjKind::Function(f) => f,
            other => panic!("expected function, found {}", other.type_name()),
        }
    }

    pub fn as_native(&self) -> &LNative {
        match self.kind() {
            ObjKind::Native(n) => n,
            other => panic!("expected native function, found {}", other.type_name()),
        }
    }

    pub fn as_closure(&self) -> &LClosure {
        match self.kind() {
            ObjKind::Closure(c) => c,
            other => panic!("expected closure, found {}", other.type_name()),
        }
    }

    pub fn as_class(&self) -> &LClass {
        match self.kind() {
            ObjKind::Class(c) => c,
            other => panic!("expected class, found {}", other.type_name()),
        }
    }

    pub fn as_instance(&self) -> &LInstance {
        match self.kind() {
            ObjKind::Instance(i) => i,
            other => panic!("expected instance, found {}", other.type_name()),
        }
    }

    pub fn as_bound_method(&self) -> &LBoundMethod {
        match self.kind() {
            ObjKind::BoundMethod(b) => b,
            other => panic!("expected bound method, found {}", other.type_name()),
        }
    }

    pub fn as_upvalue(&self) -> &LUpvalue {
        match self.kind() {
            ObjKind::Upvalue(u) => u,
            other => panic!("expected upvalue, found {}", other.type_name()),
        }
    }
}

impl PartialEq for GcRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcRef({:p}: {})", self.0.as_ptr(), self.kind().type_name())
    }
}

/// FNV-1a, matching the `hashString` clox uses for every `ObjString`.
pub fn hash_string(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
