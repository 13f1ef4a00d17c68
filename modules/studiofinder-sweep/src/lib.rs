pub mod backup;
pub mod batch;
pub mod buffer;
pub mod enrichment;
pub mod filter;
pub mod grid;
pub mod keywords;
pub mod ledger;
pub mod normalize;
pub mod notify;
pub mod overlap;
pub mod regions;
pub mod stats;
pub mod sweep;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use batch::{BatchOutcome, BatchRunner};
pub use sweep::{resolve_tab_title, HardStop, Phase, Sweep, SweepOutcome};
pub use traits::{EmailFinder, PlacesApi, Row, TabularStore};
