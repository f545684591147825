use crate::heap::Heap;

/// Something that can hand the collector its set of GC roots.
///
/// `Vm` and the compiler's function-under-construction chain are the two
/// implementors: whichever one is "live" at the moment a collection is
/// triggered marks its own roots, then `Heap::collect_garbage` traces
/// everything reachable from them and sweeps the rest. Neither the VM nor
/// the compiler owns the heap itself (both take `&mut Heap` as an explicit
/// argument), so this trait is the seam between "what counts as reachable"
/// and "how reachability is computed" that `object.h`'s `markCompilerRoots`
/// and `vm.h`'s `markRoots` play in clox.
pub trait Trace {
    fn mark_roots(&self, heap: &mut Heap);
}
