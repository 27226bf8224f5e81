//! End-to-end scenarios exercising the public solver interface.
use std::cell::Cell;
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;

use kitesat::{LitValue, SolveResult, Solver};
use kitesat_formula::{lit, lits, Lit};

/// Clauses of a pigeon hole instance with one pigeon more than holes.
fn pigeon_hole(holes: usize) -> Vec<Vec<Lit>> {
    let pigeons = holes + 1;
    let var = |pigeon: usize, hole: usize| {
        Lit::from_index(pigeon * holes + hole, false)
    };

    let mut clauses = vec![];
    for pigeon in 0..pigeons {
        clauses.push((0..holes).map(|hole| var(pigeon, hole)).collect());
    }
    for hole in 0..holes {
        for a in 0..pigeons {
            for b in 0..a {
                clauses.push(vec![!var(a, hole), !var(b, hole)]);
            }
        }
    }
    clauses
}

#[test]
fn unit_propagation_chain() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1]);
    solver.add_clause(&lits![-1, 2]);
    solver.add_clause(&lits![-2, 3]);

    assert_eq!(solver.solve(), SolveResult::Sat);
    assert_eq!(solver.get_lit_value(lit!(1)), LitValue::Satisfied);
    assert_eq!(solver.get_lit_value(lit!(2)), LitValue::Satisfied);
    assert_eq!(solver.get_lit_value(lit!(3)), LitValue::Satisfied);
}

#[test]
fn two_variable_contradiction() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2]);
    solver.add_clause(&lits![1, -2]);
    solver.add_clause(&lits![-1, 2]);
    solver.add_clause(&lits![-1, -2]);

    assert_eq!(solver.solve(), SolveResult::Unsat);
}

#[test]
fn assumption_core() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2]);
    solver.add_clause(&lits![-1, 2]);

    assert_eq!(
        solver.solve_with(&lits![-2, 3], None, None),
        SolveResult::Unsat
    );

    assert!(solver.is_assumption_required(0));
    assert!(!solver.is_assumption_required(1));
    assert!(!solver.is_error());
}

#[test]
fn assumption_core_of_contradicting_pair() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2]);

    assert_eq!(
        solver.solve_with(&lits![3, -3], None, None),
        SolveResult::Unsat
    );

    assert!(solver.is_assumption_required(0));
    assert!(solver.is_assumption_required(1));
}

#[test]
fn assumption_against_unit_clause() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1]);

    assert_eq!(
        solver.solve_with(&lits![-1, 2], None, None),
        SolveResult::Unsat
    );

    assert!(solver.is_assumption_required(0));
    assert!(!solver.is_assumption_required(1));

    // Without the failing assumption the instance is satisfiable again.
    assert_eq!(solver.solve_with(&lits![2], None, None), SolveResult::Sat);
}

#[test]
fn core_query_without_unsat_is_an_error() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1]);

    assert_eq!(solver.solve(), SolveResult::Sat);
    assert!(!solver.is_assumption_required(0));
    assert!(solver.is_error());

    // The error is permanent.
    assert_eq!(solver.solve(), SolveResult::AssumptionRequiredError);
}

#[test]
fn polarity_fix_once() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2]);

    solver.fix_polarity(lit!(-1), true);

    assert_eq!(solver.solve(), SolveResult::Sat);
    assert_eq!(solver.get_lit_value(lit!(1)), LitValue::Unsatisfied);
    assert_eq!(solver.get_lit_value(lit!(2)), LitValue::Satisfied);

    // The one-shot polarity is consumed, the next query decides freely.
    assert_eq!(solver.solve(), SolveResult::Sat);
    assert!(
        solver.get_lit_value(lit!(1)) == LitValue::Satisfied
            || solver.get_lit_value(lit!(2)) == LitValue::Satisfied
    );
}

#[test]
fn sticky_polarity_until_cleared() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2]);

    solver.fix_polarity(lit!(-1), false);

    for _ in 0..2 {
        assert_eq!(solver.solve(), SolveResult::Sat);
        assert_eq!(solver.get_lit_value(lit!(1)), LitValue::Unsatisfied);
    }

    solver.clear_user_polarity(lit!(1).var());
    assert_eq!(solver.solve(), SolveResult::Sat);
}

#[test]
fn conflict_budget() {
    let mut solver = Solver::new();
    for clause in pigeon_hole(6) {
        solver.add_clause(&clause);
    }

    assert_eq!(
        solver.solve_with(&[], None, Some(1)),
        SolveResult::ConflictOut
    );

    // The query can be resumed without a budget.
    assert_eq!(solver.solve(), SolveResult::Unsat);
}

#[test]
fn reuse_trail_statistic() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2, 3]);

    assert_eq!(solver.solve_with(&lits![1, 2], None, None), SolveResult::Sat);

    let saved_before = solver.get_assump_reuse_levels_saved();
    assert_eq!(
        solver.solve_with(&lits![1, 2, -3], None, None),
        SolveResult::Sat
    );

    assert!(solver.get_assump_reuse_levels_saved() >= saved_before + 2);
    assert_eq!(solver.get_lit_value(lit!(3)), LitValue::Unsatisfied);
}

#[test]
fn empty_clause_is_permanent() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1]);
    solver.add_clause(&[]);

    assert_eq!(solver.solve(), SolveResult::Unsat);

    solver.add_clause(&lits![2]);
    assert_eq!(solver.solve(), SolveResult::Unsat);
    assert!(!solver.is_error());
}

#[test]
fn tautologies_and_duplicates() {
    let mut solver = Solver::new();

    solver.add_clause(&lits![1, -1, 2]);
    assert_eq!(solver.get_active_clauses(), 0);

    solver.add_clause(&lits![3, 3, 4, 4, 5]);
    assert_eq!(solver.get_active_clauses(), 1);

    assert_eq!(solver.solve(), SolveResult::Sat);
}

#[test]
fn zero_terminated_int_clauses() {
    let mut solver = Solver::new();

    solver.add_clause_ints(&[1, 2, 0, 7, 8]);
    solver.add_clause_ints(&[-1]);
    solver.add_clause_ints(&[-2, 3, 0]);

    assert_eq!(solver.solve(), SolveResult::Sat);
    assert_eq!(solver.get_lit_value(lit!(2)), LitValue::Satisfied);
    assert_eq!(solver.get_lit_value(lit!(3)), LitValue::Satisfied);
    // Variable 7 was never part of a clause.
    assert_eq!(solver.get_lit_value(lit!(7)), LitValue::DontCare);
}

#[test]
fn unit_added_between_queries() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2]);

    assert_eq!(solver.solve(), SolveResult::Sat);

    solver.add_clause(&lits![-1]);
    solver.add_clause(&lits![-2, 3]);

    assert_eq!(solver.solve(), SolveResult::Sat);
    assert_eq!(solver.get_lit_value(lit!(1)), LitValue::Unsatisfied);
    assert_eq!(solver.get_lit_value(lit!(2)), LitValue::Satisfied);
    assert_eq!(solver.get_lit_value(lit!(3)), LitValue::Satisfied);
}

#[test]
fn unknown_parameter_is_a_permanent_error() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1]);

    solver.set_param("/no/such/param", 1.0);

    assert!(solver.is_error());
    assert!(!solver.status_explanation().is_empty());
    assert_eq!(solver.solve(), SolveResult::ParamError);
}

#[test]
fn parameter_modes_and_values() {
    let mut solver = Solver::new();

    solver.set_param("/mode/value", 3.0);
    solver.set_param("/restarts/numeric/init", 200.0);
    solver.set_param("/decision/polarity/flip_factor", 64.0);

    for clause in pigeon_hole(4) {
        solver.add_clause(&clause);
    }

    assert!(!solver.is_error());
    assert_eq!(solver.solve(), SolveResult::Unsat);
}

#[test]
fn stop_callback_interrupts_and_resumes() {
    let mut solver = Solver::new();
    for clause in pigeon_hole(5) {
        solver.add_clause(&clause);
    }

    let stops = Rc::new(Cell::new(1u32));
    let stops_in_callback = stops.clone();
    solver.set_cb_stop_now(move || {
        if stops_in_callback.get() > 0 {
            stops_in_callback.set(stops_in_callback.get() - 1);
            true
        } else {
            false
        }
    });

    assert_eq!(solver.solve(), SolveResult::UserInterrupt);
    assert!(!solver.is_error());

    // The interrupt is recoverable, the next query runs to completion.
    assert_eq!(solver.solve(), SolveResult::Unsat);
}

#[test]
fn interrupt_now_is_recoverable() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2]);

    solver.interrupt_now();
    assert_eq!(solver.solve(), SolveResult::UserInterrupt);
    assert_eq!(solver.solve(), SolveResult::Sat);
}

#[test]
fn learnt_clause_callback_sees_clauses() {
    let mut solver = Solver::new();
    for clause in pigeon_hole(4) {
        solver.add_clause(&clause);
    }

    let learnt = Rc::new(Cell::new(0usize));
    let learnt_in_callback = learnt.clone();
    solver.set_cb_new_learnt_cls(move |_clause| {
        learnt_in_callback.set(learnt_in_callback.get() + 1);
        false
    });

    assert_eq!(solver.solve(), SolveResult::Unsat);
    assert!(learnt.get() > 0);
}

#[test]
fn drat_text_output_ends_with_empty_clause() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1, 2]);
    solver.add_clause(&lits![1, -2]);
    solver.add_clause(&lits![-1, 2]);
    solver.add_clause(&lits![-1, -2]);

    let mut file = tempfile::tempfile().unwrap();
    solver.dump_drat(file.try_clone().unwrap(), false, true);

    assert_eq!(solver.solve(), SolveResult::Unsat);
    drop(solver);

    let mut proof = String::new();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.read_to_string(&mut proof).unwrap();

    assert!(!proof.is_empty());
    assert!(proof.lines().all(|line| line.ends_with(" 0") || line == "0"));
    let last = proof.lines().last().unwrap();
    assert_eq!(last.trim(), "0");
}

#[test]
fn statistics_are_monotone() {
    let mut solver = Solver::new();
    for clause in pigeon_hole(5) {
        solver.add_clause(&clause);
    }

    assert_eq!(solver.get_solve_invocations(), 0);
    assert_eq!(solver.solve(), SolveResult::Unsat);

    assert_eq!(solver.get_solve_invocations(), 1);
    assert!(solver.get_conflicts_number() > 0);
    assert!(solver.get_propagations() > 0);
    assert!(solver.get_backtracks() > 0);
    assert!(solver.get_active_clauses() > 0);
}

#[test]
fn model_and_levels() {
    let mut solver = Solver::new();
    solver.add_clause(&lits![1]);
    solver.add_clause(&lits![2, 3]);

    assert_eq!(solver.solve(), SolveResult::Sat);

    assert_eq!(solver.get_lit_dec_level(lit!(1)), Some(0));
    let model = solver.get_model();
    assert_eq!(model.len(), 3);
    assert_eq!(model[0], LitValue::Satisfied);
    assert!(model[1] != LitValue::DontCare || model[2] != LitValue::DontCare);
}
