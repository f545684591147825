use fax_gc::Value;
use std::time::Instant;

/// `clock()`, the one native `original_source/src/vm.c` registers. Returns
/// seconds elapsed since the process started, matching clox's
/// `(double)clock() / CLOCKS_PER_SEC`; `std::time::Instant` is the Rust
/// equivalent of a monotonic process clock, avoided only because it can't
/// be read before first use without a static, so the static is seeded from
/// it lazily on first call instead.
pub fn clock_native(_args: &[Value]) -> Value {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(Instant::now);
    Value::Number(start.elapsed().as_secs_f64())
}
