// ============================================================================
// spark-sim - Primitives Module
// Node handles, the input proxy and the virtual clock
// ============================================================================

pub mod clock;
pub mod input;
pub mod reactive;

pub use clock::{ElapseReport, TimerCatchUp, VirtualClock};
pub use input::{InputBatch, InputProxy, InputState};
pub use reactive::{NodeHandle, Output, Reactive, ReactiveVal, Readable, Timer};
