//! Randomized incremental solving with assumptions and unsat cores.
use proptest::{bool, prelude::*};

use kitesat::{LitValue, SolveResult, Solver};
use kitesat_formula::test::{conditional_pigeon_hole, sat_formula};
use kitesat_formula::Lit;

proptest! {
    /// Iteratively shrink an unsat core of a conditional pigeon hole instance.
    #[test]
    fn pigeon_hole_unsat_assumption_core(
        (enable_row, columns, formula) in conditional_pigeon_hole(1..5usize, 1..5usize),
        chain in bool::ANY,
    ) {
        let mut solver = Solver::new();
        solver.add_formula(&formula);

        if chain {
            for (&a, &b) in enable_row.iter().zip(enable_row.iter().skip(1)) {
                solver.add_clause(&[!a, b]);
            }
        }

        prop_assert_eq!(solver.solve(), SolveResult::Sat);

        let mut candidates: Vec<Lit> = enable_row.clone();
        let mut core: Vec<Lit> = vec![];

        loop {
            let result = solver.solve_with(&candidates, None, None);
            if candidates.len() == enable_row.len() {
                prop_assert_eq!(result, SolveResult::Unsat);
            }

            match result {
                SolveResult::Sat => {
                    // The dropped assumption was necessary.
                    break;
                }
                SolveResult::Unsat => {
                    let in_core: Vec<Lit> = candidates
                        .iter()
                        .enumerate()
                        .filter(|&(index, _)| solver.is_assumption_required(index))
                        .map(|(_, &lit)| lit)
                        .collect();
                    prop_assert!(!solver.is_error());
                    prop_assert!(!in_core.is_empty());

                    core = in_core;
                    if core.len() == candidates.len() {
                        break;
                    }
                    candidates = core.clone();
                }
                other => prop_assert!(false, "unexpected result {:?}", other),
            }
        }

        prop_assert!(!core.is_empty());
        // The core is itself unsatisfiable together with the formula.
        prop_assert_eq!(solver.solve_with(&core, None, None), SolveResult::Unsat);

        if chain {
            // With the implication chain, assuming the last row literal is enough.
            prop_assert_eq!(
                solver.solve_with(&enable_row[enable_row.len() - 1..], None, None),
                SolveResult::Unsat
            );
        }
    }

    /// Models under assumptions satisfy both the formula and the assumptions.
    #[test]
    fn sat_under_assumptions(
        formula in sat_formula(4..20usize, 10..80usize, 0.05..0.2, 0.9..1.0),
    ) {
        let mut solver = Solver::new();
        solver.add_formula(&formula);

        prop_assert_eq!(solver.solve(), SolveResult::Sat);

        // Assume the current values of a few variables; re-solving stays satisfiable.
        let assumptions: Vec<Lit> = (0..formula.var_count().min(3))
            .map(|index| {
                let lit = Lit::from_index(index, false);
                match solver.get_lit_value(lit) {
                    LitValue::Unsatisfied => !lit,
                    _ => lit,
                }
            })
            .collect();

        prop_assert_eq!(solver.solve_with(&assumptions, None, None), SolveResult::Sat);

        for &lit in assumptions.iter() {
            prop_assert_eq!(solver.get_lit_value(lit), LitValue::Satisfied);
        }

        for clause in formula.iter() {
            prop_assert!(clause
                .iter()
                .any(|&lit| solver.get_lit_value(lit) == LitValue::Satisfied));
        }
    }
}
