pub mod cycles;
pub mod normalize;
pub mod relax;
pub mod split;

pub use cycles::{CycleRemoval, has_cycle, remove_cycles, strongly_connected_components};
pub use normalize::{NormalizeOptions, NormalizeReport, normalize, normalize_with};
pub use relax::relax;
pub use split::{SplitMode, split, split2, split4};
