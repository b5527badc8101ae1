//! Signal-processing stages used inside a pipeline.
//!
//! Stage order inside a pipeline is fixed:
//!
//! ```text
//! capture → FilterBank (peaking stages in frequency order)
//!         → SpectrumTap (read-only analysis)
//!         → master gain
//!         → Limiter
//!         → output sink
//! ```
//!
//! All stages process interleaved f32 blocks in place; none of them spawn
//! threads. The pipeline task drives them once per processing block.

mod filter_bank;
mod limiter;
mod spectrum;

pub use filter_bank::FilterBank;
pub use limiter::Limiter;
pub use spectrum::SpectrumTap;
