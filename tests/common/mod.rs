//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt::Write;

use mucalc_rs::checker::{check, Algorithm, Options, Report};
use mucalc_rs::formula::Formula;
use mucalc_rs::labels::LabelTable;
use mucalc_rs::lts::Lts;
use mucalc_rs::parser::parse;

/// Deterministic pseudo-random `.aut` text: `num_states` states, up to
/// `fanout` edges per state over labels `a`, `b`, `c`, grouped by source.
pub fn random_aut(num_states: usize, fanout: usize, seed: u64) -> String {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };

    let mut edges = Vec::new();
    for s in 0..num_states {
        for _ in 0..next() % (fanout + 1) {
            let label = ["a", "b", "c"][next() % 3];
            edges.push((s, label, next() % num_states));
        }
    }

    let mut out = String::new();
    writeln!(out, "des (0,{},{})", edges.len(), num_states).unwrap();
    for (s, l, t) in edges {
        writeln!(out, "({},\"{}\",{})", s, l, t).unwrap();
    }
    out
}

pub fn load(aut: &str) -> (Lts, LabelTable) {
    let mut labels = LabelTable::new();
    let lts = Lts::from_str_with(aut, &mut labels).unwrap();
    (lts, labels)
}

pub fn run(lts: &Lts, labels: &mut LabelTable, src: &str, algorithm: Algorithm, threads: usize) -> Report {
    let formula = parse(src).unwrap();
    check(lts, labels, &formula, &Options { algorithm, threads }).unwrap()
}

pub fn states(report: &Report) -> Vec<usize> {
    report.states.iter().collect()
}

/// Textbook semantics: every fixpoint is recomputed from scratch, with
/// variables looked up in an explicit environment.
pub fn reference(lts: &Lts, labels: &LabelTable, formula: &Formula) -> Vec<usize> {
    let values = reference_eval(lts, labels, formula, &mut HashMap::new());
    (0..lts.num_states()).filter(|&s| values[s]).collect()
}

fn reference_eval(lts: &Lts, labels: &LabelTable, f: &Formula, env: &mut HashMap<String, Vec<bool>>) -> Vec<bool> {
    let n = lts.num_states();
    match f {
        Formula::False => vec![false; n],
        Formula::True => vec![true; n],
        Formula::Var(x) => env[x].clone(),
        Formula::And(l, r) => {
            let l = reference_eval(lts, labels, l, env);
            let r = reference_eval(lts, labels, r, env);
            l.iter().zip(&r).map(|(a, b)| *a && *b).collect()
        }
        Formula::Or(l, r) => {
            let l = reference_eval(lts, labels, l, env);
            let r = reference_eval(lts, labels, r, env);
            l.iter().zip(&r).map(|(a, b)| *a || *b).collect()
        }
        Formula::Diamond(a, body) | Formula::Box(a, body) => {
            let universal = matches!(f, Formula::Box(..));
            let child = reference_eval(lts, labels, body, env);
            let mut out = vec![universal; n];
            if let Some(label) = labels.get(a) {
                for t in lts.transitions_for(label) {
                    if universal && !child[t.target] {
                        out[t.source] = false;
                    }
                    if !universal && child[t.target] {
                        out[t.source] = true;
                    }
                }
            }
            out
        }
        Formula::Mu(x, body) | Formula::Nu(x, body) => {
            let mut approx = vec![matches!(f, Formula::Nu(..)); n];
            let saved = env.remove(x);
            loop {
                env.insert(x.clone(), approx.clone());
                let next = reference_eval(lts, labels, body, env);
                if next == approx {
                    break;
                }
                approx = next;
            }
            env.remove(x);
            if let Some(saved) = saved {
                env.insert(x.clone(), saved);
            }
            approx
        }
    }
}

/// Formulas mixing alternation-free and alternating nesting.
pub const FORMULAS: &[&str] = &[
    "mu X. <b>true || <a>X",
    "nu X. [a]X && <a>true",
    "nu X. mu Y. (<a>X && <b>true) || <a>Y || <c>Y",
    "mu X. nu Y. ([a]Y && <b>X) || [c]false",
    "nu X. mu Y. nu Z. (<a>X || <b>Y || [c]Z) && (<a>true || Z)",
    "mu X. <a>X || nu Y. (<b>Y && mu Z. (<c>Z || <a>Y))",
    "nu X. [a]X && mu Y. (<b>true || ([c]Y && <c>true))",
    "nu X. (mu Y. [b]Y && [c]Y) && [a]X",
    "mu X. (nu X. <a>X && <b>true) || <c>X",
    "nu X. mu Y. (nu Z. <a>Z && [b]X) || <c>Y || (mu W. <b>W || [a]Y && <a>true)",
];
