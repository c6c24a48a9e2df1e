//! Both fixpoint algorithms and all thread counts must agree with each other
//! and with a from-scratch reference evaluation.

mod common;

use mucalc_rs::checker::Algorithm;
use mucalc_rs::formula::Kind;
use mucalc_rs::parser::parse;

use common::{load, random_aut, reference, run, states, FORMULAS};

#[test]
fn algorithms_agree_with_reference() {
    for seed in 0..8 {
        let aut = random_aut(20, 3, seed);
        let (lts, mut labels) = load(&aut);
        for src in FORMULAS {
            let formula = parse(src).unwrap();
            let el = run(&lts, &mut labels, src, Algorithm::EmersonLei, 1);
            let naive = run(&lts, &mut labels, src, Algorithm::Naive, 1);
            let expected = reference(&lts, &labels, &formula);

            assert_eq!(states(&el), expected, "emerson-lei, seed {}: {}", seed, src);
            assert_eq!(states(&naive), expected, "naive, seed {}: {}", seed, src);
            assert_eq!(el.initial_holds, naive.initial_holds);
        }
    }
}

#[test]
fn greatest_fixpoint_restarts_inside_least() {
    // 1 -b-> 1, 1 -a-> 1, 2 -c-> 1: in round two of X, Z must restart from
    // all-true to discover that state 1 has an infinite a-path inside X.
    let aut = "des (0,3,3)\n(1,\"b\",1)\n(1,\"a\",1)\n(2,\"c\",1)\n";
    let (lts, mut labels) = load(aut);
    let src = "mu X. <b>true || <c>nu Z. (X && <a>Z)";
    for algorithm in [Algorithm::EmersonLei, Algorithm::Naive] {
        let report = run(&lts, &mut labels, src, algorithm, 1);
        assert_eq!(states(&report), vec![1, 2], "{}", algorithm);
    }
}

#[test]
fn emerson_lei_saves_iterations_on_same_kind_nesting() {
    // Inner Y only grows while X grows, so it need not restart.
    let aut = random_aut(40, 3, 42);
    let (lts, mut labels) = load(&aut);
    let src = "mu X. <c>true || <a>X || mu Y. <b>X || <b>Y";
    let el = run(&lts, &mut labels, src, Algorithm::EmersonLei, 1);
    let naive = run(&lts, &mut labels, src, Algorithm::Naive, 1);
    assert_eq!(el.states, naive.states);
    assert!(el.stats.lfp_iterations() <= naive.stats.lfp_iterations());
}

#[test]
fn thread_count_does_not_change_results() {
    for seed in 0..4 {
        let aut = random_aut(50, 4, 1000 + seed);
        let (lts, mut labels) = load(&aut);
        for src in FORMULAS {
            for algorithm in [Algorithm::EmersonLei, Algorithm::Naive] {
                let base = run(&lts, &mut labels, src, algorithm, 1);
                for threads in [2, 4] {
                    let other = run(&lts, &mut labels, src, algorithm, threads);
                    assert_eq!(base.states, other.states, "{} threads: {}", threads, src);
                    assert_eq!(base.initial_holds, other.initial_holds);
                    for kind in Kind::ALL {
                        assert_eq!(
                            base.stats.evals(kind),
                            other.stats.evals(kind),
                            "evalcount_{} with {} threads: {}",
                            kind,
                            threads,
                            src
                        );
                    }
                    assert_eq!(base.stats.lfp_iterations(), other.stats.lfp_iterations());
                    assert_eq!(base.stats.gfp_iterations(), other.stats.gfp_iterations());
                }
            }
        }
    }
}

#[test]
fn more_threads_than_branches() {
    let (lts, mut labels) = load("des (0,2,2)\n(0,\"a\",1)\n(1,\"b\",0)\n");
    let report = run(&lts, &mut labels, "<a>true && <b>true || [a]false", Algorithm::EmersonLei, 16);
    assert_eq!(states(&report), vec![1]);
}
