use crate::opcode::OpCode;
use crate::value::Value;

/// A compiled function body: a flat instruction stream, a parallel
/// per-instruction line table for error reporting, and that function's
/// constant pool. One-to-one with clox's `Chunk` in `chunk.h`.
#[derive(Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    lines: Vec<u32>,
    pub constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk::default()
    }

    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op.into(), line);
    }

    /// Line a given instruction offset was emitted from, for runtime error
    /// reporting (clox's `function->chunk.lines[instruction]`).
    pub fn line_at(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// Append a value to the constant pool and return its index, or `None`
    /// if the pool is already full. Chunks only ever address constants
    /// with a single `u8` operand, so a chunk holding more than 256
    /// constants has to be rejected by the caller (spec's "Too many
    /// constants in one chunk" boundary case) rather than by the chunk
    /// itself, which has no diagnostic machinery of its own.
    pub fn add_constant(&mut self, value: Value) -> Option<u8> {
        if self.constants.len() >= u8::MAX as usize + 1 {
            return None;
        }
        self.constants.push(value);
        Some((self.constants.len() - 1) as u8)
    }

    pub fn constant(&self, index: u8) -> Value {
        self.constants[index as usize]
    }
}
