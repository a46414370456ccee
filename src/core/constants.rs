// ============================================================================
// spark-sim - Constants
// Flag constants for node kinds and node states
// ============================================================================

// =============================================================================
// NODE KIND FLAGS
// =============================================================================

/// Source node (simulated input or reactive value, no computation)
pub const INPUT: u32 = 1 << 0;

/// Node is a derived value (lazy, cached computation)
pub const DERIVED: u32 = 1 << 1;

/// Node is an output binding (flush root, rendered value)
pub const OUTPUT: u32 = 1 << 2;

/// Node is driven by the virtual clock (flush root)
pub const TIMER: u32 = 1 << 3;

/// Mask covering every kind bit
pub const KIND_MASK: u32 = INPUT | DERIVED | OUTPUT | TIMER;

// =============================================================================
// NODE STATE FLAGS
// =============================================================================

/// Node is clean (cached value is valid)
pub const CLEAN: u32 = 1 << 10;

/// Node is dirty (must recompute before its value can be read)
pub const DIRTY: u32 = 1 << 11;

/// Node's compute function is currently on the evaluation stack
pub const EVALUATING: u32 = 1 << 12;

/// Last computation failed; the error is cached until the next invalidation
pub const FAILED: u32 = 1 << 13;

/// Sink participates in flush (outputs and timers only)
pub const ACTIVE: u32 = 1 << 14;

// =============================================================================
// STATUS MASK (for clearing status bits)
// =============================================================================

/// Mask to clear the status bits (CLEAN, DIRTY)
pub const STATUS_MASK: u32 = !(DIRTY | CLEAN);

// =============================================================================
// TIMING
// =============================================================================

/// Virtual clock value at session start, in milliseconds
pub const CLOCK_START_MS: u64 = 0;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_distinct() {
        let all_flags = [INPUT, DERIVED, OUTPUT, TIMER, CLEAN, DIRTY, EVALUATING, FAILED, ACTIVE];

        for (i, &a) in all_flags.iter().enumerate() {
            for (j, &b) in all_flags.iter().enumerate() {
                if i != j {
                    assert_eq!(a & b, 0, "Flags at index {} and {} overlap: {:b} & {:b}", i, j, a, b);
                }
            }
        }
    }

    #[test]
    fn status_mask_keeps_kind_and_failure_bits() {
        let flags = OUTPUT | DIRTY | FAILED | ACTIVE;
        let cleared = flags & STATUS_MASK;

        assert_eq!(cleared & DIRTY, 0);
        assert_ne!(cleared & OUTPUT, 0);
        assert_ne!(cleared & FAILED, 0);
        assert_ne!(cleared & ACTIVE, 0);
    }

    #[test]
    fn kind_mask_covers_only_kinds() {
        assert_eq!(KIND_MASK & (CLEAN | DIRTY | EVALUATING | FAILED | ACTIVE), 0);
        assert_eq!((DERIVED | DIRTY) & KIND_MASK, DERIVED);
    }
}
