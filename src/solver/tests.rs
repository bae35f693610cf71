use crate::basic_types::Literal;
use crate::basic_types::WeightedLiteral;
use crate::solver::CardinalSolver;

fn solver_with_literals(n: u32) -> (CardinalSolver, Vec<Literal>) {
    let mut solver = CardinalSolver::new();
    let literals = (0..n).map(|_| solver.new_literal()).collect();
    (solver, literals)
}

fn wlit(weight: u32, literal: Literal) -> WeightedLiteral {
    WeightedLiteral::new(weight, literal)
}

/// Open a decision level, assign the literal, and run the extension watch
/// dispatch to fixpoint.
fn decide(solver: &mut CardinalSolver, literal: Literal) {
    solver.push();
    solver.core_mut().increase_decision_level();
    solver.core_mut().enqueue_decision_literal(literal);
    solver.propagate_pending();
}

/// Enqueue without propagating, to stack up several decisions first.
fn decide_silently(solver: &mut CardinalSolver, literal: Literal) {
    solver.push();
    solver.core_mut().increase_decision_level();
    solver.core_mut().enqueue_decision_literal(literal);
}

fn check_watch_invariants(solver: &CardinalSolver) {
    assert!(solver.validate_well_formed());
    for position in 0..solver.num_constraints() {
        let index = solver.constraints[position];
        assert!(
            solver.validate_watched_constraint(index),
            "watch invariant violated for {}",
            solver.get_constraint(index)
        );
    }
}

// ----------------------
// cardinality propagation

#[test]
fn cardinality_watch_replacement_then_fanout() {
    let (mut solver, lits) = solver_with_literals(4);
    let index = solver
        .add_at_least(None, lits.clone(), 2, false)
        .unwrap()
        .unwrap();

    // watches sit on the first k + 1 = 3 positions
    check_watch_invariants(&solver);

    // one false literal: the tail literal is pulled in, nothing propagates
    decide(&mut solver, !lits[0]);
    assert!(!solver.core().inconsistent());
    assert!(lits[1..]
        .iter()
        .all(|&literal| solver.core().value(literal).is_none()));
    check_watch_invariants(&solver);

    // a second false literal forces the remaining two
    decide(&mut solver, !lits[1]);
    assert_eq!(solver.core().value(lits[2]), Some(true));
    assert_eq!(solver.core().value(lits[3]), Some(true));
    assert!(!solver.core().inconsistent());
    let _ = index;
}

#[test]
fn cardinality_with_one_slack_propagates_on_first_false() {
    let (mut solver, lits) = solver_with_literals(4);
    let _ = solver
        .add_at_least(None, lits.clone(), 3, false)
        .unwrap()
        .unwrap();

    decide(&mut solver, !lits[0]);
    for &literal in &lits[1..] {
        assert_eq!(solver.core().value(literal), Some(true));
    }
}

#[test]
fn cardinality_with_bound_equal_to_size_is_forced_at_once() {
    let (mut solver, lits) = solver_with_literals(3);
    let _ = solver.add_at_least(None, lits.clone(), 3, false).unwrap();
    for &literal in &lits {
        assert_eq!(solver.core().value(literal), Some(true));
    }
}

#[test]
fn reified_cardinality_activates_on_the_reifier() {
    let (mut solver, lits) = solver_with_literals(4);
    let reifier = lits[3];
    let body = lits[..3].to_vec();
    let index = solver
        .add_at_least(Some(reifier), body.clone(), 2, false)
        .unwrap()
        .unwrap();
    assert!(solver
        .core()
        .is_external(reifier.get_propositional_variable()));

    // while the reifier is unassigned nothing happens
    decide(&mut solver, !body[0]);
    assert!(solver.core().value(body[1]).is_none());

    // a true reifier activates the body: with one false literal the other
    // two are forced
    decide(&mut solver, reifier);
    assert_eq!(solver.core().value(body[1]), Some(true));
    assert_eq!(solver.core().value(body[2]), Some(true));
    let _ = index;
}

#[test]
fn negated_reifier_enforces_the_negated_body() {
    let (mut solver, lits) = solver_with_literals(3);
    let reifier = lits[2];
    // reifier == (l0 + l1 >= 2); a false reifier means at most one holds
    let _ = solver
        .add_at_least(Some(reifier), lits[..2].to_vec(), 2, false)
        .unwrap()
        .unwrap();

    decide(&mut solver, !reifier);
    decide(&mut solver, lits[0]);
    // ~l0 + ~l1 >= 1 now forces ~l1
    assert_eq!(solver.core().value(lits[1]), Some(false));
}

// ----------------------
// pseudo-Boolean propagation (watched prefix)

#[test]
fn pb_initial_watch_prefix_exceeds_the_bound() {
    let (mut solver, lits) = solver_with_literals(5);
    let terms = vec![
        wlit(5, lits[0]),
        wlit(4, lits[1]),
        wlit(3, lits[2]),
        wlit(2, lits[3]),
        wlit(1, lits[4]),
    ];
    let index = solver.add_pb_ge(None, terms, 7, false).unwrap().unwrap();

    let pseudo_boolean = solver.get_constraint(index).as_pseudo_boolean();
    assert_eq!(pseudo_boolean.num_watch(), 2);
    assert_eq!(pseudo_boolean.slack(), 9);
    check_watch_invariants(&solver);
}

#[test]
fn pb_pulls_tail_watches_and_propagates_heavy_literals() {
    let (mut solver, lits) = solver_with_literals(5);
    let terms = vec![
        wlit(5, lits[0]),
        wlit(4, lits[1]),
        wlit(3, lits[2]),
        wlit(2, lits[3]),
        wlit(1, lits[4]),
    ];
    let index = solver.add_pb_ge(None, terms, 7, false).unwrap().unwrap();

    // 5*l0 false: the remaining weight is 4+3+2+1 = 10, but without l1 only
    // 6 < 7 remains, so l1 is forced
    decide(&mut solver, !lits[0]);
    assert!(!solver.core().inconsistent());
    assert_eq!(solver.core().value(lits[1]), Some(true));
    {
        let pseudo_boolean = solver.get_constraint(index).as_pseudo_boolean();
        assert_eq!(pseudo_boolean.slack(), 10);
        assert_eq!(pseudo_boolean.num_watch(), 4);
    }
    check_watch_invariants(&solver);

    // the reason for l1 is the falseness of l0
    let mut antecedents = vec![];
    solver.get_antecedents(lits[1], index, &mut antecedents);
    assert_eq!(antecedents, vec![!lits[0]]);
}

#[test]
fn pb_conflict_when_remaining_weight_cannot_reach_the_bound() {
    let (mut solver, lits) = solver_with_literals(5);
    let terms = vec![
        wlit(5, lits[0]),
        wlit(4, lits[1]),
        wlit(3, lits[2]),
        wlit(2, lits[3]),
        wlit(1, lits[4]),
    ];
    let _ = solver.add_pb_ge(None, terms, 7, false).unwrap().unwrap();

    // with both heavy literals false only 3 + 2 + 1 = 6 < 7 remains
    decide_silently(&mut solver, !lits[0]);
    decide_silently(&mut solver, !lits[1]);
    solver.propagate_pending();

    assert!(solver.core().inconsistent());
    assert!(solver.statistics().num_conflicts > 0);
}

#[test]
fn pb_tight_slack_forces_every_watched_literal() {
    let (mut solver, lits) = solver_with_literals(3);
    let terms = vec![wlit(3, lits[0]), wlit(2, lits[1]), wlit(2, lits[2])];
    // the weight sum is exactly the bound
    let _ = solver.add_pb_ge(None, terms, 7, false).unwrap().unwrap();
    for &literal in &lits {
        assert_eq!(solver.core().value(literal), Some(true));
    }
}

#[test]
fn pb_with_unit_weights_degrades_to_cardinality() {
    let (mut solver, lits) = solver_with_literals(3);
    let terms = vec![wlit(1, lits[0]), wlit(1, lits[1]), wlit(1, lits[2])];
    let index = solver.add_pb_ge(None, terms, 2, false).unwrap().unwrap();
    assert!(solver.get_constraint(index).is_cardinality());
}

#[test]
fn pb_with_unit_bound_becomes_a_clause() {
    let (mut solver, lits) = solver_with_literals(3);
    let terms = vec![wlit(3, lits[0]), wlit(2, lits[1]), wlit(1, lits[2])];
    let index = solver.add_pb_ge(None, terms, 1, false).unwrap();
    assert!(index.is_none());
    assert_eq!(solver.num_constraints(), 0);
}

// ----------------------
// parity propagation

#[test]
fn parity_forces_the_last_unassigned_literal() {
    let (mut solver, lits) = solver_with_literals(3);
    let _ = solver.add_xor(None, lits.clone(), false).unwrap().unwrap();

    decide(&mut solver, lits[0]);
    decide(&mut solver, lits[1]);
    // l0 xor l1 xor l2 must be odd: with two true literals l2 is true
    assert_eq!(solver.core().value(lits[2]), Some(true));
}

#[test]
fn false_reifier_flips_the_forced_parity() {
    let (mut solver, lits) = solver_with_literals(4);
    let reifier = lits[3];
    let _ = solver
        .add_xor(Some(reifier), lits[..3].to_vec(), false)
        .unwrap()
        .unwrap();

    decide(&mut solver, !reifier);
    decide(&mut solver, lits[0]);
    decide(&mut solver, lits[1]);
    // the even form is enforced: l2 must be false
    assert_eq!(solver.core().value(lits[2]), Some(false));
}

#[test]
fn parity_conflict_lands_on_the_deepest_literal() {
    let (mut solver, lits) = solver_with_literals(3);
    let _ = solver.add_xor(None, lits.clone(), false).unwrap().unwrap();

    decide(&mut solver, lits[0]);
    decide_silently(&mut solver, lits[1]);
    decide_silently(&mut solver, !lits[2]);
    solver.propagate_pending();
    // 1 xor 1 xor 0 is even: conflict
    assert!(solver.core().inconsistent());
}

#[test]
fn parity_resolution_cancels_chained_variables() {
    let (mut solver, lits) = solver_with_literals(5);
    let _ = solver
        .add_xor(None, lits[..3].to_vec(), false)
        .unwrap()
        .unwrap();
    let _ = solver
        .add_xor(None, lits[2..].to_vec(), false)
        .unwrap()
        .unwrap();

    decide(&mut solver, lits[0]);
    decide(&mut solver, lits[1]);
    // the first parity constraint forces l2
    assert_eq!(solver.core().value(lits[2]), Some(true));
    decide(&mut solver, lits[3]);
    // the second forces l4 through l2
    assert_eq!(solver.core().value(lits[4]), Some(true));

    let trail_top = solver.core().assignments().num_trail_entries() - 1;
    let justification = solver
        .core()
        .assignments()
        .get_variable_justification(lits[4].get_propositional_variable());
    let mut antecedents = vec![];
    solver.get_xor_antecedents(lits[4], trail_top - 1, justification, &mut antecedents);
    antecedents.sort_by_key(|literal| literal.to_u32());
    // l2 occurs once in each chain link and cancels out
    assert_eq!(antecedents, vec![lits[0], lits[1], lits[3]]);
}

// ----------------------
// conflict resolution

#[test]
fn cutting_planes_resolution_learns_the_shared_demand() {
    let (mut solver, lits) = solver_with_literals(3);
    let (x, a, b) = (lits[0], lits[1], lits[2]);
    let _ = solver.add_at_least(None, vec![x, a, b], 2, false).unwrap();
    let _ = solver.add_at_least(None, vec![!x, a, b], 2, false).unwrap();

    // deciding ~a forces x and b through the first constraint and ~x
    // through the second: conflict
    decide(&mut solver, !a);
    assert!(solver.core().inconsistent());

    let resolution = solver.resolve_conflict().expect("a lemma is produced");
    // adding the two constraints cancels x against ~x and, after the cut,
    // demands a + b >= 2; the asserting lemma is the unit a
    assert_eq!(resolution.lemma, vec![a]);
    assert_eq!(resolution.backjump_level, 0);
    let learned = resolution.learned_constraint.expect("a constraint is learned");
    {
        let constraint = solver.get_constraint(learned);
        assert!(constraint.is_learned());
        let cardinality = constraint.as_cardinality();
        assert_eq!(cardinality.k(), 2);
        let mut learned_literals = cardinality.literals().to_vec();
        learned_literals.sort_by_key(|literal| literal.to_u32());
        assert_eq!(learned_literals, vec![a, b]);
        assert_eq!(constraint.glue(), 1);
    }

    // after the backjump the reinit queue activates the learned constraint,
    // which forces both of its literals
    solver.pop(1);
    solver.core_mut().backjump(0);
    solver.pop_reinit();
    assert_eq!(solver.core().value(a), Some(true));
    assert_eq!(solver.core().value(b), Some(true));
}

#[test]
fn resolution_falls_back_on_a_root_conflict() {
    let (mut solver, lits) = solver_with_literals(2);
    let (x, y) = (lits[0], lits[1]);
    let _ = solver.add_at_least(None, vec![x, y], 2, false).unwrap();
    assert_eq!(solver.core().value(x), Some(true));
    let _ = solver.add_at_least(None, vec![!x, !y], 2, false).unwrap();
    assert!(solver.core().inconsistent());

    assert!(solver.resolve_conflict().is_none());
    // mark cleanup leaves the trail marks empty
    for variable in solver.core().assignments().get_propositional_variables() {
        assert!(!solver.core().is_marked(variable));
    }
}

#[test]
fn coefficients_beyond_the_32_bit_range_latch_overflow() {
    let (mut solver, lits) = solver_with_literals(1);
    solver.resolver.bound = u32::MAX;
    let near_limit = i32::MAX as u32;
    solver.inc_coeff(lits[0], near_limit);
    assert!(!solver.resolver.overflow);
    solver.inc_coeff(lits[0], near_limit);
    assert!(solver.resolver.overflow, "2^32 exceeds the coefficient range");
}

#[test]
fn coefficients_are_clipped_to_the_bound() {
    let (mut solver, lits) = solver_with_literals(1);
    solver.resolver.bound = 10;
    solver.inc_coeff(!lits[0], 25);
    assert_eq!(
        solver.resolver.coeffs[lits[0].get_propositional_variable()],
        -10
    );
    assert!(!solver.resolver.overflow);
}

#[test]
fn bound_increments_outside_u32_latch_overflow() {
    let (mut solver, _) = solver_with_literals(1);
    solver.resolver.bound = u32::MAX - 1;
    solver.inc_bound(10);
    assert!(solver.resolver.overflow);
}

#[test]
fn cut_divides_by_the_gcd_and_rounds_the_bound_up() {
    let (mut solver, lits) = solver_with_literals(2);
    solver.resolver.bound = 12;
    solver.inc_coeff(lits[0], 6);
    solver.inc_coeff(lits[1], 9);

    solver.cut();
    // gcd(6, 9) = 3: coefficients 2 and 3, bound ceil(12/3) = 4
    assert_eq!(
        solver.resolver.coeffs[lits[0].get_propositional_variable()],
        2
    );
    assert_eq!(
        solver.resolver.coeffs[lits[1].get_propositional_variable()],
        3
    );
    assert_eq!(solver.resolver.bound, 4);
    assert_eq!(solver.statistics.num_cuts, 1);

    // the coefficients are now coprime: no further division
    solver.cut();
    assert_eq!(solver.statistics.num_cuts, 1);
    assert_eq!(solver.resolver.bound, 4);
}

// ----------------------
// simplification

#[test]
fn satisfied_constraints_are_removed_at_the_root() {
    let (mut solver, lits) = solver_with_literals(3);
    let terms = vec![wlit(2, lits[0]), wlit(1, lits[1]), wlit(1, lits[2])];
    let _ = solver.add_pb_ge(None, terms, 2, false).unwrap().unwrap();

    solver.core_mut().enqueue_decision_literal(lits[0]);
    solver.simplify();
    assert_eq!(solver.num_constraints(), 0);
    assert!(!solver.core().inconsistent());
}

#[test]
fn refuted_body_forces_the_reifier_false() {
    let (mut solver, lits) = solver_with_literals(4);
    let reifier = lits[3];
    let terms = vec![wlit(2, lits[0]), wlit(2, lits[1]), wlit(1, lits[2])];
    let _ = solver
        .add_pb_ge(Some(reifier), terms, 4, false)
        .unwrap()
        .unwrap();

    solver.core_mut().enqueue_decision_literal(!lits[0]);
    solver.core_mut().enqueue_decision_literal(!lits[1]);
    solver.core_mut().enqueue_decision_literal(!lits[2]);
    solver.simplify();
    assert!(!solver.core().inconsistent());
    assert_eq!(solver.core().value(reifier), Some(false));
    assert_eq!(solver.num_constraints(), 0);
}

#[test]
fn refuted_constraints_conflict_at_the_root() {
    let (mut solver, lits) = solver_with_literals(5);
    let terms = vec![
        wlit(5, lits[0]),
        wlit(4, lits[1]),
        wlit(3, lits[2]),
        wlit(2, lits[3]),
        wlit(1, lits[4]),
    ];
    let _ = solver.add_pb_ge(None, terms, 7, false).unwrap().unwrap();

    solver.core_mut().enqueue_decision_literal(!lits[0]);
    solver.core_mut().enqueue_decision_literal(!lits[1]);
    solver.simplify();
    assert!(solver.core().inconsistent());
}

#[test]
fn assigned_literals_are_stripped_and_the_bound_reduced() {
    let (mut solver, lits) = solver_with_literals(4);
    let terms = vec![
        wlit(3, lits[0]),
        wlit(2, lits[1]),
        wlit(2, lits[2]),
        wlit(1, lits[3]),
    ];
    let index = solver.add_pb_ge(None, terms, 5, false).unwrap().unwrap();

    solver.core_mut().enqueue_decision_literal(lits[0]);
    solver.simplify();
    // 3*l0 is true: the constraint becomes 2*l1 + 2*l2 + l3 >= 2
    let constraint = solver.get_constraint(index);
    assert!(!constraint.is_removed());
    let pseudo_boolean = constraint.as_pseudo_boolean();
    assert_eq!(pseudo_boolean.k(), 2);
    assert_eq!(pseudo_boolean.size(), 3);
    assert!(pseudo_boolean
        .literals()
        .iter()
        .all(|literal| *literal != lits[0]));
}

#[test]
fn simplify_is_idempotent_at_the_root() {
    let (mut solver, lits) = solver_with_literals(5);
    let _ = solver
        .add_at_least(None, lits[..4].to_vec(), 2, false)
        .unwrap();
    let terms = vec![wlit(3, lits[1]), wlit(2, lits[2]), wlit(1, lits[4])];
    let _ = solver.add_pb_ge(None, terms, 4, false).unwrap();
    solver.core_mut().enqueue_decision_literal(!lits[2]);

    solver.simplify();
    let first = format!("{solver}");
    solver.simplify();
    let second = format!("{solver}");
    assert_eq!(first, second);
}

#[test]
fn unused_definitions_are_dropped() {
    let (mut solver, lits) = solver_with_literals(4);
    let reifier = lits[3];
    let _ = solver
        .add_at_least(Some(reifier), lits[..3].to_vec(), 2, false)
        .unwrap()
        .unwrap();

    solver.simplify();
    // the reifier occurs nowhere but in its own definition
    assert_eq!(solver.num_constraints(), 0);
}

#[test]
fn pure_literals_are_assigned() {
    let (mut solver, lits) = solver_with_literals(4);
    let _ = solver
        .add_at_least(None, lits[..3].to_vec(), 2, false)
        .unwrap()
        .unwrap();
    let _ = solver
        .add_at_least(None, vec![lits[0], lits[1], lits[3]], 2, false)
        .unwrap()
        .unwrap();

    solver.simplify();
    // ~l2 occurs nowhere: l2 is pure and gets assigned
    assert_eq!(solver.core().value(lits[2]), Some(true));
    assert!(!solver.core().inconsistent());
}

// ----------------------
// subsumption

#[test]
fn tighter_cardinality_subsumes_the_wider_one() {
    let (mut solver, lits) = solver_with_literals(4);
    let subsumer = solver
        .add_at_least(None, lits[..3].to_vec(), 2, false)
        .unwrap()
        .unwrap();
    let subsumed = solver
        .add_at_least(None, lits.clone(), 2, false)
        .unwrap()
        .unwrap();

    solver.simplify();
    assert!(!solver.get_constraint(subsumer).is_removed());
    // the subsumed slot has been swept
    assert_eq!(solver.num_constraints(), 1);
    let _ = subsumed;
}

#[test]
fn cardinality_subsumes_clauses_and_binaries() {
    let (mut solver, lits) = solver_with_literals(5);
    let _ = solver
        .add_at_least(None, lits[..3].to_vec(), 2, false)
        .unwrap()
        .unwrap();
    // a clause over a superset of the literals
    let clause = solver
        .core_mut()
        .mk_clause(vec![lits[0], lits[1], lits[2], lits[3]], false)
        .unwrap()
        .unwrap();
    // a binary clause over two of the literals
    let _ = solver.core_mut().mk_clause(vec![lits[0], lits[1]], false);
    assert_eq!(solver.core().watch_list().num_non_learned_binary(lits[0]), 1);

    solver.simplify();
    assert!(solver.core().clause_database().get_clause(clause).is_removed());
    assert_eq!(solver.core().watch_list().num_non_learned_binary(lits[0]), 0);
    assert!(solver.statistics().num_clause_subsumes > 0);
    assert!(solver.statistics().num_bin_subsumes > 0);
}

#[test]
fn pointwise_dominated_pb_is_subsumed() {
    let (mut solver, lits) = solver_with_literals(4);
    let subsumer_terms = vec![wlit(2, lits[0]), wlit(3, lits[1])];
    let subsumer = solver
        .add_pb_ge(None, subsumer_terms, 3, false)
        .unwrap()
        .unwrap();
    let subsumed_terms = vec![wlit(2, lits[0]), wlit(3, lits[1]), wlit(2, lits[2])];
    let _ = solver
        .add_pb_ge(None, subsumed_terms, 3, false)
        .unwrap()
        .unwrap();

    solver.simplify();
    assert_eq!(solver.num_constraints(), 1);
    assert!(!solver.get_constraint(subsumer).is_removed());
    assert!(solver.statistics().num_pb_subsumes > 0);
}

// ----------------------
// equivalent-literal substitution

#[test]
fn root_substitution_recompiles_to_a_weighted_form() {
    let (mut solver, lits) = solver_with_literals(3);
    let _ = solver
        .add_at_least(None, lits.clone(), 2, false)
        .unwrap()
        .unwrap();

    // l1 == l0: the cardinality constraint becomes 2*l0 + l2 >= 2
    assert!(solver.set_root(lits[1], lits[0]));
    solver.flush_roots();

    assert_eq!(solver.num_constraints(), 1);
    let index = solver.constraints[0];
    let constraint = solver.get_constraint(index);
    assert!(constraint.is_pseudo_boolean());
    let pseudo_boolean = constraint.as_pseudo_boolean();
    assert_eq!(pseudo_boolean.k(), 2);
    let mut terms = pseudo_boolean.terms().to_vec();
    terms.sort_by_key(|term| term.literal.to_u32());
    assert_eq!(terms, vec![wlit(2, lits[0]), wlit(1, lits[2])]);

    // behaviourally the constraint is equivalent to l0
    decide(&mut solver, !lits[2]);
    assert_eq!(solver.core().value(lits[0]), Some(true));
}

#[test]
fn equalised_weights_promote_to_a_scaled_cardinality() {
    let (mut solver, lits) = solver_with_literals(4);
    let _ = solver
        .add_at_least(None, lits.clone(), 2, false)
        .unwrap()
        .unwrap();

    // l1 == l0 and l3 == l2: the merged form is 2*l0 + 2*l2 >= 2, which is
    // the cardinality l0 + l2 >= 1, i.e. a plain clause
    assert!(solver.set_root(lits[1], lits[0]));
    assert!(solver.set_root(lits[3], lits[2]));
    solver.flush_roots();

    assert_eq!(solver.num_constraints(), 0);
    assert_eq!(
        solver.core().watch_list().num_non_learned_binary(lits[0]),
        1
    );
}

#[test]
fn complementary_duplicates_cancel_against_the_bound() {
    let (mut solver, lits) = solver_with_literals(4);
    let _ = solver
        .add_at_least(None, vec![lits[0], lits[1], lits[2], lits[3]], 2, false)
        .unwrap()
        .unwrap();

    // l1 == ~l0: the pair contributes exactly one, leaving l2 + l3 >= 1
    assert!(solver.set_root(lits[1], !lits[0]));
    solver.flush_roots();

    // k = 1 unreified: the constraint was handed to the core as a clause
    assert_eq!(solver.num_constraints(), 0);
    assert_eq!(
        solver.core().watch_list().num_non_learned_binary(lits[2]),
        1
    );
}

#[test]
fn reifier_pulled_into_its_own_body_splits_the_definition() {
    let (mut solver, lits) = solver_with_literals(4);
    let reifier = lits[3];
    let _ = solver
        .add_at_least(Some(reifier), lits[..3].to_vec(), 2, false)
        .unwrap()
        .unwrap();

    // l2 == reifier: the definition becomes self-referential
    assert!(solver.set_root(lits[2], reifier));
    solver.flush_roots();

    // the reified definition is decomposed into unreified halves
    assert!(solver
        .constraints
        .iter()
        .all(|&index| solver.get_constraint(index).reifier().is_none()));
    check_watch_invariants(&solver);
}

// ----------------------
// garbage collection

#[test]
fn gc_drops_the_worse_half_by_glue_psm_size() {
    let (mut solver, lits) = solver_with_literals(6);
    let _ = solver
        .add_at_least(None, lits[..3].to_vec(), 2, false)
        .unwrap()
        .unwrap();
    let good = solver
        .add_at_least(None, lits[1..4].to_vec(), 2, true)
        .unwrap()
        .unwrap();
    let poor = solver
        .add_at_least(None, lits[2..6].to_vec(), 2, true)
        .unwrap()
        .unwrap();
    solver.arena.get_mut(good).set_glue(2);
    solver.arena.get_mut(poor).set_glue(7);

    solver.gc();
    assert_eq!(solver.num_learned(), 1);
    assert!(!solver.get_constraint(good).is_removed());
}

#[test]
fn psm_counts_agreement_with_saved_phases() {
    let (mut solver, lits) = solver_with_literals(3);
    let index = solver
        .add_at_least(None, lits.clone(), 2, true)
        .unwrap()
        .unwrap();
    solver
        .core_mut()
        .assignments_mut()
        .set_saved_phase(lits[0].get_propositional_variable(), true);
    solver
        .core_mut()
        .assignments_mut()
        .set_saved_phase(lits[1].get_propositional_variable(), false);

    solver.update_psm(index);
    assert_eq!(solver.get_constraint(index).psm(), 1);
}

// ----------------------
// restored interface surface

#[test]
fn mutex_cliques_are_recognised() {
    let (mut solver, lits) = solver_with_literals(4);
    let negated: Vec<Literal> = lits[..3].iter().map(|&literal| !literal).collect();
    // at most one of l0, l1, l2
    let _ = solver.add_at_least(None, negated, 2, false).unwrap().unwrap();

    let mut candidates = lits.clone();
    let mut mutexes = vec![];
    solver.find_mutexes(&mut candidates, &mut mutexes);

    assert_eq!(mutexes.len(), 1);
    let mut mutex = mutexes.pop().unwrap();
    mutex.sort_by_key(|literal| literal.to_u32());
    assert_eq!(mutex, lits[..3].to_vec());
    assert_eq!(candidates, vec![lits[3]]);
}

#[test]
fn extended_binary_recognises_tight_cardinalities() {
    let (mut solver, lits) = solver_with_literals(3);
    let index = solver
        .add_at_least(None, lits.clone(), 2, false)
        .unwrap()
        .unwrap();
    let mut out = vec![];
    assert!(solver.is_extended_binary(index, &mut out));
    assert_eq!(out.len(), 3);

    let (mut solver, lits) = solver_with_literals(4);
    let index = solver
        .add_at_least(None, lits.clone(), 2, false)
        .unwrap()
        .unwrap();
    assert!(!solver.is_extended_binary(index, &mut out));
}

#[test]
fn copied_solvers_rebuild_the_problem_constraints() {
    let (mut solver, lits) = solver_with_literals(6);
    let _ = solver
        .add_at_least(None, lits[..3].to_vec(), 2, false)
        .unwrap();
    let _ = solver
        .add_pb_ge(
            None,
            vec![wlit(3, lits[2]), wlit(2, lits[3]), wlit(2, lits[4])],
            4,
            false,
        )
        .unwrap();
    let _ = solver.add_xor(None, lits[3..].to_vec(), false).unwrap();
    // learned constraints are not carried over
    let _ = solver
        .add_at_least(None, lits[1..4].to_vec(), 2, true)
        .unwrap();

    let copy = solver.copy().unwrap();
    assert_eq!(copy.num_constraints(), solver.num_constraints());
    assert_eq!(copy.num_learned(), 0);
    let original = format!("{solver}");
    let copied = format!("{copy}");
    for line in copied.lines() {
        assert!(original.contains(line), "{line} not in original");
    }
}

#[test]
fn rewards_reflect_remaining_slack() {
    let (mut solver, lits) = solver_with_literals(3);
    let index = solver
        .add_at_least(None, lits.clone(), 2, false)
        .unwrap()
        .unwrap();
    // two of three still needed, slack 3: a partial reward
    let reward = solver.get_reward(index, |_| 1.0);
    assert!(reward > 0.0 && reward < 3.0);

    decide(&mut solver, lits[0]);
    decide(&mut solver, lits[1]);
    // satisfied: no reward
    assert_eq!(solver.get_reward(index, |_| 1.0), 0.0);
}

#[test]
fn blocked_literals_respect_the_marked_weight() {
    let (mut solver, lits) = solver_with_literals(3);
    let index = solver
        .add_at_least(None, lits.clone(), 2, false)
        .unwrap()
        .unwrap();
    // every negated body literal marked: the resolvent weight reaches k
    assert!(solver.is_blocked(!lits[0], index, |literal| literal.is_negative()));
    assert!(!solver.is_blocked(!lits[0], index, |_| false));
}

// ----------------------
// lemma soundness helpers

#[test]
fn resolver_state_round_trips_through_the_reference_inequality() {
    let (mut solver, lits) = solver_with_literals(2);
    solver.resolver.bound = 3;
    solver.inc_coeff(lits[0], 2);
    solver.inc_coeff(!lits[1], 1);

    let mut inequality = crate::solver::Inequality::default();
    solver.active_to_inequality(&mut inequality);
    assert_eq!(inequality.k, 3);
    assert_eq!(inequality.lits.len(), 2);
    assert!(inequality.lits.contains(&lits[0]));
    assert!(inequality.lits.contains(&!lits[1]));

    // both inequality literals false: 2 + 1 < 3 certifies the conflict
    solver.core_mut().enqueue_decision_literal(!lits[0]);
    solver.core_mut().enqueue_decision_literal(lits[1]);
    assert!(solver.validate_conflict(&[lits[0], !lits[1]], &inequality));
    // the running inequality itself is conflicting under this assignment
    assert!(solver.validate_lemma());
}

#[test]
fn cardinality_antecedents_are_the_false_tail() {
    let (mut solver, lits) = solver_with_literals(4);
    let index = solver
        .add_at_least(None, lits.clone(), 3, false)
        .unwrap()
        .unwrap();

    decide(&mut solver, !lits[0]);
    assert_eq!(solver.core().value(lits[1]), Some(true));

    let mut antecedents = vec![];
    solver.get_antecedents(lits[1], index, &mut antecedents);
    assert_eq!(antecedents, vec![!lits[0]]);
}

#[test]
fn learned_lemma_literals_are_false_with_one_asserting() {
    let (mut solver, lits) = solver_with_literals(4);
    let (x, a, b, d) = (lits[0], lits[1], lits[2], lits[3]);
    let _ = solver
        .add_at_least(None, vec![x, a, b, d], 2, false)
        .unwrap();
    let _ = solver
        .add_at_least(None, vec![!x, a, b, d], 2, false)
        .unwrap();

    // ~d leaves slack; ~b forces x and a through the first constraint and
    // ~x through the second: conflict at level two
    decide(&mut solver, !d);
    assert!(!solver.core().inconsistent());
    decide(&mut solver, !b);
    assert!(solver.core().inconsistent());

    let resolution = solver.resolve_conflict().expect("a lemma is produced");
    for &literal in &resolution.lemma {
        assert_eq!(solver.core().value(literal), Some(false));
    }
    let conflict_level = solver.core().decision_level();
    let at_conflict_level = resolution
        .lemma
        .iter()
        .filter(|&&literal| solver.core().lvl(literal) == conflict_level)
        .count();
    assert_eq!(at_conflict_level, 1);
    assert_eq!(solver.core().lvl(resolution.lemma[0]), conflict_level);
    assert_eq!(resolution.backjump_level, 1);
}
