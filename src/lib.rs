//! # mucalc-rs: explicit-state mu-calculus model checking
//!
//! **`mucalc-rs`** decides, for every state of a finite labelled transition system (LTS),
//! whether it satisfies a modal mu-calculus formula.
//! State sets are bit sets over the state space, and fixpoints are computed by plain iteration.
//!
//! ## Key Features
//!
//! - **Flattened formulas**: A parsed [`Formula`][crate::formula::Formula] is flattened into a preorder [`Graph`][crate::graph::Graph] arena. Every node knows its descendant range and its free variables.
//! - **Two fixpoint algorithms**: [Emerson-Lei][crate::checker::Algorithm::EmersonLei], which exploits binder alternation to keep inner approximations across re-entries, and a [naive][crate::checker::Algorithm::Naive] dependency-tracked one. Both compute identical sets.
//! - **Parallel branches**: Both sides of `&&`/`||` may be evaluated on different threads, bounded by a shared [admission budget][crate::pool::WorkerPool].
//!
//! ## Basic Usage
//!
//! ```rust
//! use mucalc_rs::checker::{check, Options};
//! use mucalc_rs::labels::LabelTable;
//! use mucalc_rs::lts::Lts;
//! use mucalc_rs::parser::parse;
//!
//! let mut labels = LabelTable::new();
//! let lts = Lts::from_str_with("des (0,1,2)\n(0,\"a\",1)\n", &mut labels).unwrap();
//!
//! // Can an `a`-step eventually be taken?
//! let formula = parse("mu X. X || <a>true").unwrap();
//! let report = check(&lts, &mut labels, &formula, &Options::default()).unwrap();
//!
//! assert_eq!(report.states.iter().collect::<Vec<_>>(), vec![0]);
//! assert!(report.initial_holds);
//! assert_eq!(report.stats.lfp_iterations(), 2);
//! ```
//!
//! ## Core Components
//!
//! - **[`lts`]**: Reading `.aut` files into per-label transition arrays.
//! - **[`parser`]**: The textual formula syntax.
//! - **[`graph`]**: Formula flattening, variable aliasing and dependency analysis.
//! - **[`checker`]**: The evaluator and both fixpoint algorithms.

pub mod bitset;
pub mod checker;
pub mod formula;
pub mod graph;
pub mod labels;
pub mod lts;
pub mod parser;
pub mod pool;
