//! Heap objects, string interning and the tracing garbage collector shared
//! by the compiler and the virtual machine, plus the `Value`/bytecode
//! representation every other crate in this workspace builds on.

mod chunk;
mod config;
mod heap;
mod object;
mod opcode;
mod table;
mod trace;
mod value;

pub use chunk::Chunk;
pub use config::GcConfig;
pub use heap::Heap;
pub use object::{
    hash_string, GcRef, LBoundMethod, LClass, LClosure, LFunction, LInstance, LNative, LString, LUpvalue, NativeFn,
    ObjKind, UpvalueState,
};
pub use opcode::OpCode;
pub use table::Table;
pub use trace::Trace;
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    struct NoRoots;
    impl Trace for NoRoots {
        fn mark_roots(&self, _heap: &mut Heap) {}
    }

    #[test]
    fn interning_deduplicates_equal_strings() {
        let mut heap = Heap::new(GcConfig::default());
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        assert!(a.same_object(&b));
        let c = heap.intern("world");
        assert!(!a.same_object(&c));
    }

    #[test]
    fn unreferenced_object_is_collected() {
        let mut heap = Heap::new(GcConfig::default());
        let a = heap.intern("temporary");
        assert!(a.is_marked() == false);
        let before = heap.bytes_allocated();
        heap.collect_garbage(&NoRoots);
        assert!(heap.bytes_allocated() < before);
    }

    #[test]
    fn rooted_string_survives_collection() {
        let mut heap = Heap::new(GcConfig::default());
        let a = heap.intern("kept");

        struct Keep(GcRef);
        impl Trace for Keep {
            fn mark_roots(&self, heap: &mut Heap) {
                heap.mark_object(self.0);
            }
        }

        heap.collect_garbage(&Keep(a));
        // still interned after a cycle that rooted it
        let b = heap.intern("kept");
        assert!(a.same_object(&b));
    }

    #[test]
    fn table_handles_deletion_and_tombstones() {
        let mut heap = Heap::new(GcConfig::default());
        let key_a = heap.intern("a");
        let key_b = heap.intern("b");
        let mut table = Table::new();
        table.set(key_a, Value::Number(1.0));
        table.set(key_b, Value::Number(2.0));
        assert!(table.delete(key_a));
        assert!(table.get(key_a).is_none());
        assert_eq!(table.get(key_b), Some(Value::Number(2.0)));
        // re-inserting after a tombstone must still find the right slot
        table.set(key_a, Value::Number(3.0));
        assert_eq!(table.get(key_a), Some(Value::Number(3.0)));
    }

    #[test]
    fn table_grows_past_initial_capacity() {
        let mut heap = Heap::new(GcConfig::default());
        let mut table = Table::new();
        let mut keys = Vec::new();
        for i in 0..64 {
            let key = heap.intern(&format!("key{i}"));
            table.set(key, Value::Number(i as f64));
            keys.push(key);
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(table.get(*key), Some(Value::Number(i as f64)));
        }
    }
}
