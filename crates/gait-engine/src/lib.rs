//! # Gait-Engine
//!
//! Phase-indexed access, statistics and validation over gait-cycle tables.
//!
//! ## Query Pipeline
//!
//! 1. **Index** - rows per (subject, task) pair, built once per engine
//! 2. **Reshape** - pair rows cut into `(cycle, phase, feature)` arrays
//! 3. **Cache** - reshaped arrays and derived results memoised per query
//! 4. **Statistics** - mean/std patterns, ROM, summaries, correlations
//! 5. **Validation** - per-cycle validity and outlier cycles
//!
//! ## Example
//!
//! ```
//! use gait_core::RawTable;
//! use gait_engine::GaitEngine;
//!
//! let mut builder = RawTable::builder(["hip_flexion_angle_ipsi_rad"]);
//! for p in 0..150 {
//!     let x = 2.0 * std::f64::consts::PI * p as f64 / 150.0;
//!     builder.push_row("SUB01", "walk", p as f64, &[0.5 * x.sin()])?;
//! }
//! let engine = GaitEngine::new(builder.build())?;
//!
//! let cycles = engine.get_cycles("SUB01", "walk", None)?.expect("one cycle");
//! assert_eq!(cycles.shape(), (1, 150, 1));
//! assert_eq!(engine.validate_cycles("SUB01", "walk")?, [true]);
//! # Ok::<(), gait_core::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod cycles;
pub mod engine;
pub mod filter;
pub mod index;
pub mod stats;
pub mod validation;

pub use cache::{CacheKey, CacheStats, QueryCache, QueryKind};
pub use config::*;
pub use cycles::*;
pub use engine::GaitEngine;
pub use index::*;
pub use stats::*;
pub use validation::*;
