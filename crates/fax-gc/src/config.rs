/// Tuning knobs for the collector, generalized from the compile-time
/// `#define`s in `common.h` (`DEBUG_STRESS_GC`, `DEBUG_LOG_GC`) into runtime
/// configuration so a single `fax` binary can toggle them via flags instead
/// of being rebuilt.
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Bytes allocated before the first automatic collection. clox hardcodes
    /// this to `1024 * 1024` in `initVM`.
    pub initial_threshold: usize,
    /// Multiplier applied to `bytes_allocated` after each cycle to compute
    /// the next threshold (clox's `GC_HEAP_GROW_FACTOR`, value 2).
    pub heap_grow_factor: usize,
    /// Collect before every allocation, regardless of threshold. Mirrors
    /// `DEBUG_STRESS_GC`; used by the test suite to force collections at
    /// otherwise-unreachable points and by `fax --gc-stress`.
    pub stress: bool,
    /// Emit a `tracing` event for every collection cycle and every
    /// mark/sweep of an individual object. Mirrors `DEBUG_LOG_GC`.
    pub log: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            initial_threshold: 1024 * 1024,
            heap_grow_factor: 2,
            stress: false,
            log: false,
        }
    }
}
