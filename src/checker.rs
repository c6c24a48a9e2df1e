//! Fixpoint evaluation of a formula graph over an LTS.
//!
//! Every node is evaluated to the set of states satisfying it:
//!
//! - `false`/`true` are the shared constant sets;
//! - `&&`/`||` combine both children pointwise. The two children are
//!   evaluated through [`WorkerPool::fork_join`], so they run on different
//!   threads when a worker slot is available;
//! - `<a>f` holds in `s` if some `a`-edge from `s` reaches a state satisfying
//!   `f`; `[a]f` holds if every `a`-edge does (vacuously, when there is none);
//! - `mu X. f` / `nu X. f` iterate `X := f` from all-false / all-true until
//!   the approximation stops changing.
//!
//! Nested binders are handled by one of two [`Algorithm`]s. Both compute the
//! same sets, they differ only in how much work is redone:
//!
//! - **Emerson-Lei**: when a binder is entered from a binder of the opposite
//!   kind, every open binder of its own kind in its subtree (itself included)
//!   restarts from its identity. Others keep their approximation across
//!   re-entries.
//! - **Naive**: after every round of a binder `X`, all descendant binders
//!   depending on `X` restart from their identity.
//!
//! In both, closed nodes (no free variables) become valid after their first
//! evaluation and are never recomputed.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, log_enabled, trace, Level};

use crate::bitset::StateSet;
use crate::formula::{Formula, Kind};
use crate::graph::{Graph, NodeId, Op, Slot};
use crate::labels::{Label, LabelTable};
use crate::lts::Lts;
use crate::pool::{PoolError, WorkerPool};

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum Algorithm {
    #[default]
    EmersonLei,
    Naive,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emerson-lei" | "emersonlei" | "el" => Ok(Algorithm::EmersonLei),
            "naive" => Ok(Algorithm::Naive),
            other => Err(format!("unknown algorithm '{}' (expected 'emerson-lei' or 'naive')", other)),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::EmersonLei => write!(f, "emerson-lei"),
            Algorithm::Naive => write!(f, "naive"),
        }
    }
}

/// Error type for [`check`].
#[derive(Debug)]
pub enum CheckError {
    /// The formula has a variable outside the scope of any binder.
    Unbound(String),
    /// The worker pool could not be built.
    Pool(PoolError),
}

impl From<PoolError> for CheckError {
    fn from(e: PoolError) -> Self {
        CheckError::Pool(e)
    }
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckError::Unbound(x) => write!(f, "variable '{}' is not bound", x),
            CheckError::Pool(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckError::Pool(e) => Some(e),
            _ => None,
        }
    }
}

/// Run configuration.
#[derive(Debug, Copy, Clone)]
pub struct Options {
    pub algorithm: Algorithm,
    /// Upper bound on concurrently evaluating workers.
    pub threads: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            threads: 1,
        }
    }
}

/// Evaluation counters of one worker.
///
/// A spawned worker counts into its own `Stats` and adds them to its
/// parent's when it finishes.
#[derive(Debug, Default)]
pub struct Stats {
    evals: [AtomicUsize; Kind::COUNT],
    lfp_iterations: AtomicUsize,
    gfp_iterations: AtomicUsize,
}

impl Stats {
    fn record_eval(&self, kind: Kind) {
        self.evals[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn record_iteration(&self, kind: Kind) {
        let counter = if kind == Kind::Mu {
            &self.lfp_iterations
        } else {
            &self.gfp_iterations
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of visits of nodes of the given kind.
    pub fn evals(&self, kind: Kind) -> usize {
        self.evals[kind.index()].load(Ordering::Relaxed)
    }

    /// Rounds of least fixpoint iteration.
    pub fn lfp_iterations(&self) -> usize {
        self.lfp_iterations.load(Ordering::Relaxed)
    }

    /// Rounds of greatest fixpoint iteration.
    pub fn gfp_iterations(&self) -> usize {
        self.gfp_iterations.load(Ordering::Relaxed)
    }

    /// Adds all counters of `self` to `parent`.
    pub fn merge_into(&self, parent: &Stats) {
        for (mine, theirs) in self.evals.iter().zip(&parent.evals) {
            theirs.fetch_add(mine.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        parent.lfp_iterations.fetch_add(self.lfp_iterations(), Ordering::Relaxed);
        parent.gfp_iterations.fetch_add(self.gfp_iterations(), Ordering::Relaxed);
    }
}

/// Evaluation context: the formula graph, the LTS it is checked against,
/// the invalidation policy, and the workers available for `&&`/`||` branches.
pub struct Checker<'a> {
    graph: &'a Graph,
    lts: &'a Lts,
    labels: &'a LabelTable,
    algorithm: Algorithm,
    pool: &'a WorkerPool,
}

impl<'a> Checker<'a> {
    pub fn new(
        graph: &'a Graph,
        lts: &'a Lts,
        labels: &'a LabelTable,
        algorithm: Algorithm,
        pool: &'a WorkerPool,
    ) -> Self {
        assert_eq!(graph.num_states(), lts.num_states(), "graph and LTS disagree on the state count");
        Self {
            graph,
            lts,
            labels,
            algorithm,
            pool,
        }
    }

    /// Evaluates the whole graph. Afterwards, the root holds the set of
    /// states satisfying the formula.
    pub fn evaluate(&self) -> Stats {
        let stats = Stats::default();
        self.pool.install(|| self.eval(&stats, self.graph.root()));
        stats
    }

    fn eval(&self, worker: &Stats, id: NodeId) {
        let node = self.graph.node(id);
        worker.record_eval(node.kind());
        if node.is_valid() {
            return;
        }

        match node.op {
            // Constants read the shared sets directly.
            Op::False | Op::True => {}
            Op::Var { .. } => unreachable!("variable node {} is never invalid", id),
            Op::And(l, r) | Op::Or(l, r) => self.eval_binary(worker, id, l, r),
            Op::Diamond { label, body } => self.eval_modal(worker, id, label, body, false),
            Op::Box { label, body } => self.eval_modal(worker, id, label, body, true),
            Op::Mu { slot, body } | Op::Nu { slot, body } => self.eval_fixpoint(worker, id, slot, body),
        }

        if log_enabled!(Level::Debug) {
            debug!("{}", self.graph.display(id, self.labels));
        }
        if log_enabled!(Level::Trace) {
            trace!("states: {:?}", self.graph.read(id, |s| s.iter().collect::<Vec<_>>()));
        }

        if !node.is_open() {
            node.mark_valid();
        }
    }

    fn eval_binary(&self, worker: &Stats, id: NodeId, l: NodeId, r: NodeId) {
        let (child, ()) = self.pool.fork_join(
            || {
                let stats = Stats::default();
                self.eval(&stats, l);
                stats
            },
            || self.eval(worker, r),
        );
        child.merge_into(worker);

        let conjunction = self.graph.node(id).kind() == Kind::And;
        let mut out = self.graph.write(id);
        self.graph.read(l, |a| out.copy_from(a));
        self.graph.read(r, |b| {
            if conjunction {
                out.and_assign(b)
            } else {
                out.or_assign(b)
            }
        });
    }

    fn eval_modal(&self, worker: &Stats, id: NodeId, label: Label, body: NodeId, universal: bool) {
        self.eval(worker, body);

        let mut out = self.graph.write(id);
        out.reset(universal);
        self.graph.read(body, |child| {
            for t in self.lts.transitions_for(label) {
                // An edge into the child set witnesses `<a>`; one outside it refutes `[a]`.
                if universal != child.contains(t.target) {
                    out.set(t.source, !universal);
                }
            }
        });
    }

    fn eval_fixpoint(&self, worker: &Stats, id: NodeId, slot: Slot, body: NodeId) {
        let kind = self.graph.node(id).kind();

        if self.algorithm == Algorithm::EmersonLei && self.graph.node(id).surrounding == Some(kind.dual()) {
            for (i, child) in self.graph.subtree(id) {
                if child.kind() == kind && child.is_open() {
                    self.graph.reset_binder(i);
                }
            }
        }

        loop {
            worker.record_iteration(kind);
            self.eval(worker, body);

            let done = if self.graph.same_storage(id, body) {
                true
            } else {
                let mut approx = self.graph.write(id);
                let stable = self.graph.read(body, |value| {
                    let stable = *approx == *value;
                    if !stable {
                        approx.copy_from(value);
                    }
                    stable
                });
                stable
            };

            if self.algorithm == Algorithm::Naive {
                for (i, child) in self.graph.descendants(id) {
                    if child.kind().is_binder() && child.depends_on(slot) {
                        self.graph.reset_binder(i);
                    }
                }
            }

            if done {
                break;
            }
        }
    }
}

/// Outcome of checking one formula.
#[derive(Debug)]
pub struct Report {
    /// States satisfying the formula.
    pub states: StateSet,
    pub initial_holds: bool,
    pub stats: Stats,
}

impl Report {
    pub fn num_satisfying(&self) -> usize {
        self.states.count()
    }

    /// Formats the report in the tool's output format.
    pub fn display(&self, print_states: bool, print_stats: bool) -> DisplayReport<'_> {
        DisplayReport {
            report: self,
            print_states,
            print_stats,
        }
    }

    /// Renders the report in the tool's output format.
    pub fn render(&self, print_states: bool, print_stats: bool) -> String {
        self.display(print_states, print_stats).to_string()
    }
}

pub struct DisplayReport<'a> {
    report: &'a Report,
    print_states: bool,
    print_stats: bool,
}

impl Display for DisplayReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let report = self.report;
        if self.print_states {
            for s in report.states.iter() {
                writeln!(f, "{}", s)?;
            }
        }
        if self.print_stats {
            for kind in Kind::ALL {
                writeln!(f, "evalcount_{} = {}", kind.name(), report.stats.evals(kind))?;
            }
            writeln!(f, "lfp_iterations = {}", report.stats.lfp_iterations())?;
            writeln!(f, "gfp_iterations = {}", report.stats.gfp_iterations())?;
        }
        writeln!(f, "nr_of_satisfying_states = {}", report.num_satisfying())?;
        writeln!(f, "initial_state_satisfies_f = {}", report.initial_holds as u8)?;
        Ok(())
    }
}

/// Checks `formula` against `lts`. The formula graph lives only for the
/// duration of this call.
///
/// Fails if `formula` has a free variable or `options.threads` is zero.
pub fn check(lts: &Lts, labels: &mut LabelTable, formula: &Formula, options: &Options) -> Result<Report, CheckError> {
    if let Some(x) = formula.first_unbound() {
        return Err(CheckError::Unbound(x.to_string()));
    }
    let pool = WorkerPool::new(options.threads)?;
    let graph = Graph::build(formula, labels, lts.num_states());
    info!(
        "checking {} nodes against {} states with {} on {} thread(s)",
        graph.len(),
        lts.num_states(),
        options.algorithm,
        pool.capacity()
    );

    let checker = Checker::new(&graph, lts, labels, options.algorithm, &pool);
    let stats = checker.evaluate();

    let states = graph.value(graph.root());
    let initial_holds = states.contains(lts.initial_state());
    info!(
        "{} satisfying states, initial state {}",
        states.count(),
        if initial_holds { "satisfies" } else { "violates" }
    );

    Ok(Report {
        states,
        initial_holds,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::parser::parse;

    /// 0 -a-> 1 -a-> 2 -b-> 0, 2 -a-> 2
    fn cycle() -> (Lts, LabelTable) {
        let mut labels = LabelTable::new();
        let lts = Lts::from_edges(0, 3, [(0, "a", 1), (1, "a", 2), (2, "b", 0), (2, "a", 2)], &mut labels);
        (lts, labels)
    }

    fn run(lts: &Lts, labels: &mut LabelTable, src: &str, algorithm: Algorithm, threads: usize) -> Report {
        let options = Options { algorithm, threads };
        check(lts, labels, &parse(src).unwrap(), &options).unwrap()
    }

    fn states(report: &Report) -> Vec<usize> {
        report.states.iter().collect()
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("emerson-lei".parse(), Ok(Algorithm::EmersonLei));
        assert_eq!("EmersonLei".parse(), Ok(Algorithm::EmersonLei));
        assert_eq!("naive".parse(), Ok(Algorithm::Naive));
        assert!("fast".parse::<Algorithm>().is_err());
        assert_eq!(Algorithm::Naive.to_string(), "naive");
    }

    #[test]
    fn test_constants() {
        let (lts, mut labels) = cycle();
        let r = run(&lts, &mut labels, "true", Algorithm::EmersonLei, 1);
        assert_eq!(states(&r), vec![0, 1, 2]);
        let r = run(&lts, &mut labels, "false", Algorithm::EmersonLei, 1);
        assert!(r.states.is_empty());
        assert!(!r.initial_holds);
    }

    #[test]
    fn test_modalities() {
        let (lts, mut labels) = cycle();
        let r = run(&lts, &mut labels, "<b>true", Algorithm::EmersonLei, 1);
        assert_eq!(states(&r), vec![2]);
        let r = run(&lts, &mut labels, "[b]false", Algorithm::EmersonLei, 1);
        assert_eq!(states(&r), vec![0, 1]);
        // Label not occurring in the LTS.
        let r = run(&lts, &mut labels, "[c]false && <c>true || true", Algorithm::EmersonLei, 1);
        assert_eq!(states(&r), vec![0, 1, 2]);
        let r = run(&lts, &mut labels, "<c>true", Algorithm::EmersonLei, 1);
        assert!(r.states.is_empty());
    }

    #[test]
    fn test_reachability() {
        let (lts, mut labels) = cycle();
        // Can reach a b-step: every state can.
        let r = run(&lts, &mut labels, "mu X. <b>true || <a>X", Algorithm::EmersonLei, 1);
        assert_eq!(states(&r), vec![0, 1, 2]);
        // Infinite a-path: 2 loops on a; 0 and 1 reach it.
        let r = run(&lts, &mut labels, "nu X. <a>X", Algorithm::EmersonLei, 1);
        assert_eq!(states(&r), vec![0, 1, 2]);
        // No infinite a-path: none, every state reaches the a-loop at 2.
        let r = run(&lts, &mut labels, "mu X. [a]X", Algorithm::EmersonLei, 1);
        assert!(r.states.is_empty());
        // Eventually a b-step is enabled, along every path.
        let r = run(&lts, &mut labels, "mu X. <b>true || ([a]X && <a>true)", Algorithm::EmersonLei, 1);
        assert_eq!(states(&r), vec![0, 1, 2]);
    }

    #[test]
    fn test_trivial_fixpoints() {
        let (lts, mut labels) = cycle();
        let r = run(&lts, &mut labels, "mu X. X", Algorithm::EmersonLei, 1);
        assert!(r.states.is_empty());
        assert_eq!(r.stats.lfp_iterations(), 1);
        let r = run(&lts, &mut labels, "nu X. X", Algorithm::Naive, 1);
        assert_eq!(states(&r), vec![0, 1, 2]);
        assert_eq!(r.stats.gfp_iterations(), 1);
    }

    #[test]
    fn test_alternation_both_algorithms() {
        let (lts, mut labels) = cycle();
        // Infinitely often b.
        let src = "nu X. mu Y. <b>X || <a>Y";
        let el = run(&lts, &mut labels, src, Algorithm::EmersonLei, 1);
        let naive = run(&lts, &mut labels, src, Algorithm::Naive, 1);
        assert_eq!(states(&el), vec![0, 1, 2]);
        assert_eq!(el.states, naive.states);
        assert_eq!(el.initial_holds, naive.initial_holds);
    }

    #[test]
    fn test_closed_subformula_evaluated_once() {
        let (lts, mut labels) = cycle();
        // `<b>true` is closed: evaluated once, then only revisited as valid.
        let r = run(&lts, &mut labels, "mu X. <b>true || <a>X", Algorithm::EmersonLei, 1);
        let rounds = r.stats.lfp_iterations();
        assert!(rounds >= 2);
        assert_eq!(r.stats.evals(Kind::Diamond), 2 * rounds);
        assert_eq!(r.stats.evals(Kind::True), 1);
        assert_eq!(r.stats.evals(Kind::Var), rounds);
    }

    #[test]
    fn test_stats_merge() {
        let parent = Stats::default();
        let child = Stats::default();
        child.record_eval(Kind::And);
        child.record_eval(Kind::And);
        child.record_iteration(Kind::Nu);
        parent.record_eval(Kind::And);
        child.merge_into(&parent);
        assert_eq!(parent.evals(Kind::And), 3);
        assert_eq!(parent.gfp_iterations(), 1);
        assert_eq!(parent.lfp_iterations(), 0);
    }

    #[test]
    fn test_render() {
        let (lts, mut labels) = cycle();
        let r = run(&lts, &mut labels, "<b>true", Algorithm::EmersonLei, 1);
        assert_eq!(r.render(true, false), "2\nnr_of_satisfying_states = 1\ninitial_state_satisfies_f = 0\n");
        let full = r.render(false, true);
        assert!(full.starts_with("evalcount_false = 0\nevalcount_true = 1\n"));
        assert!(full.contains("evalcount_diamond = 1\n"));
        assert!(full.contains("lfp_iterations = 0\ngfp_iterations = 0\n"));
    }

    #[test]
    fn test_zero_threads() {
        let (lts, mut labels) = cycle();
        let options = Options {
            threads: 0,
            ..Options::default()
        };
        let err = check(&lts, &mut labels, &Formula::True, &options).unwrap_err();
        assert!(matches!(err, CheckError::Pool(PoolError::NoThreads)));
    }

    #[test]
    fn test_unbound_variable_rejected() {
        let (lts, mut labels) = cycle();
        let formula = Formula::diamond("a", Formula::var("X"));
        let err = check(&lts, &mut labels, &formula, &Options::default()).unwrap_err();
        assert!(matches!(&err, CheckError::Unbound(x) if x == "X"));
        assert_eq!(err.to_string(), "variable 'X' is not bound");

        // Bound in one branch only.
        let formula = Formula::mu("X", Formula::var("X")).or(Formula::var("X"));
        let err = check(&lts, &mut labels, &formula, &Options::default()).unwrap_err();
        assert!(matches!(err, CheckError::Unbound(_)));
    }
}
