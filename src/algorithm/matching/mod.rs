//! Almost-exact matching on covariate sets
//!
//! This module implements DAME and FLAME. Units are matched exactly on all
//! covariates first; each following round drops the covariate set judged
//! least useful and matches the remaining units on what is left. It includes:
//!
//! 1. Covariate sets and the lattice of sets eligible to be dropped
//! 2. The exact-match grouper behind a backend trait
//! 3. The drop-selection oracle (fixed weights or outcome models)
//! 4. The stopping criteria and the stepping session driving the rounds
//! 5. Treatment-effect estimates over the resulting groups

pub mod covariate_set;
pub mod estimate;
pub mod frontier;
pub mod grouping;
pub mod lattice;
pub mod matcher;
pub mod oracle;
pub mod session;
pub mod stopping;
pub mod types;

// Re-export key types
pub use covariate_set::CovariateSet;
pub use estimate::{ate, att, cate_of_group, cate_of_unit, groups_of, main_group};
pub use frontier::{Candidate, Frontier, Phase};
pub use grouping::{Grouping, GroupingBackend, HashGrouper, RowGroup, exact_match_flags};
pub use lattice::{Lattice, generate_new_active_sets};
pub use matcher::Matcher;
pub use oracle::{Decision, DropOracle, Selection, balancing_factor, predictive_error};
pub use session::{MatchingSession, Step};
pub use stopping::{LoopState, PeCheck, StopKind, StopReason, evaluate};
pub use types::{MatchGroup, MatchingResult, RoundRecord};
