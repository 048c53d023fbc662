//! CPU section parser.

use selftest_core::CpuRecord;

use crate::field::FieldSource;

/// Builds a CPU record; both formats use the `CPU_*` field names.
pub fn parse(source: &impl FieldSource) -> CpuRecord {
    CpuRecord {
        model: source.extract("CPU_MODEL"),
        vendor: source.extract("CPU_VENDOR"),
        cores: source.extract_numeric("CPU_CORES"),
        threads: source.extract_numeric("CPU_THREADS"),
        current_speed: source.extract("CPU_CURRENT_SPEED"),
        max_speed: source.extract("CPU_MAX_SPEED"),
        cache_l1: source.extract("CPU_CACHE_L1"),
        cache_l2: source.extract("CPU_CACHE_L2"),
        cache_l3: source.extract("CPU_CACHE_L3"),
        features: source.extract("CPU_FEATURES"),
    }
}
