use crate::object::GcRef;
use crate::value::Value;

const MAX_LOAD: f64 = 0.75;

struct Entry {
    key: Option<GcRef>,
    value: Value,
}

/// Open-addressed hash table with linear probing and tombstone deletion,
/// used both for the interpreter's interned-string set and for every
/// globals/fields/methods map a running program builds. One-to-one with
/// `table.c`: a deleted entry's key becomes `None` but its value becomes
/// `Bool(true)` rather than `Nil`, which is how `find_entry` tells a
/// tombstone (keep probing) apart from a truly empty slot (stop probing).
#[derive(Default)]
pub struct Table {
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    pub fn new() -> Self {
        Table { count: 0, entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Keys are compared by heap identity, not content: every key handed to
    /// a `Table` is an interned string, so two keys with equal content are
    /// always the same allocation already.
    fn find_entry_index(entries: &[Entry], capacity: usize, key: GcRef) -> usize {
        let mask = capacity - 1;
        let mut index = key.as_string().hash as usize & mask;
        let mut tombstone = None;
        loop {
            let entry = &entries[index];
            match entry.key {
                None => {
                    if matches!(entry.value, Value::Nil) {
                        return tombstone.unwrap_or(index);
                    } else if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Some(k) if k.same_object(&key) => return index,
                Some(_) => {}
            }
            index = (index + 1) & mask;
        }
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let mut entries: Vec<Entry> = (0..capacity).map(|_| Entry { key: None, value: Value::Nil }).collect();
        let mut count = 0;
        for entry in &self.entries {
            if let Some(key) = entry.key {
                let idx = Table::find_entry_index(&entries, capacity, key);
                entries[idx].key = Some(key);
                entries[idx].value = entry.value;
                count += 1;
            }
        }
        self.entries = entries;
        self.count = count;
    }

    pub fn get(&self, key: GcRef) -> Option<Value> {
        if self.count == 0 {
            return None;
        }
        let idx = Table::find_entry_index(&self.entries, self.capacity(), key);
        self.entries[idx].key.map(|_| self.entries[idx].value)
    }

    /// Inserts or overwrites `key`. Returns `true` if `key` was not already
    /// present (clox's `tableSet` return value, used by `OP_SET_GLOBAL` to
    /// detect and reject assignment to an undeclared global).
    pub fn set(&mut self, key: GcRef, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
            let new_capacity = grow_capacity(self.capacity());
            self.adjust_capacity(new_capacity);
        }
        let idx = Table::find_entry_index(&self.entries, self.capacity(), key);
        let is_new_key = self.entries[idx].key.is_none();
        if is_new_key && matches!(self.entries[idx].value, Value::Nil) {
            self.count += 1;
        }
        self.entries[idx].key = Some(key);
        self.entries[idx].value = value;
        is_new_key
    }

    pub fn delete(&mut self, key: GcRef) -> bool {
        if self.count == 0 {
            return false;
        }
        let idx = Table::find_entry_index(&self.entries, self.capacity(), key);
        if self.entries[idx].key.is_none() {
            return false;
        }
        self.entries[idx].key = None;
        self.entries[idx].value = Value::Bool(true);
        true
    }

    pub fn add_all(&mut self, from: &Table) {
        for entry in &from.entries {
            if let Some(key) = entry.key {
                self.set(key, entry.value);
            }
        }
    }

    /// Content-based lookup, used only by the interner: finding out whether
    /// a string with this text already exists is the one place a `Table`
    /// can't yet have a `GcRef` key to compare by identity.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<GcRef> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.capacity();
        let mask = capacity - 1;
        let mut index = hash as usize & mask;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None => {
                    if matches!(entry.value, Value::Nil) {
                        return None;
                    }
                }
                Some(key) => {
                    let s = key.as_string();
                    if s.hash == hash && s.chars == chars {
                        return Some(key);
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    /// Drop every entry whose key didn't survive the last mark phase.
    /// Used only on the interner's table: the string set holds weak
    /// references, so a string with no other referrers is reclaimed and
    /// must also disappear from here (`tableRemoveWhite`).
    pub fn remove_unmarked_keys(&mut self) {
        let dead: Vec<GcRef> = self.entries.iter().filter_map(|e| e.key).filter(|k| !k.is_marked()).collect();
        for key in dead {
            self.delete(key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (GcRef, Value)> + '_ {
        self.entries.iter().filter_map(|e| e.key.map(|k| (k, e.value)))
    }
}

fn grow_capacity(capacity: usize) -> usize {
    if capacity < 8 {
        8
    } else {
        capacity * 2
    }
}
