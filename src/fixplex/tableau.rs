use log::trace;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use crate::cardinal_assert_moderate;
use crate::cardinal_assert_simple;
use crate::fixplex::numeral;
use crate::fixplex::Interval;

pub type Var = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feasibility {
    Feasible,
    Infeasible,
    Unknown,
}

#[derive(Clone, Debug)]
struct VarInfo {
    range: Interval,
    value: u64,
    is_base: bool,
    base_row: usize,
}

impl Default for VarInfo {
    fn default() -> Self {
        VarInfo {
            range: Interval::free(),
            value: 0,
            is_base: false,
            base_row: 0,
        }
    }
}

#[derive(Clone, Debug)]
struct Row {
    base: Var,
    base_coeff: u64,
    /// All terms, the base variable included.
    terms: Vec<(u64, Var)>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FixplexStatistics {
    pub num_pivots: u64,
    pub num_infeasible: u64,
    pub num_checks: u64,
}

/// The tableau. Every row is solved for its base variable, whose coefficient
/// is odd (invertible modulo `2^64`); a base variable occurs in no other
/// row. Values always satisfy every row; `make_feasible` pivots until the
/// values also satisfy the variable bounds, or reports an infeasible row.
#[derive(Debug)]
pub struct Fixplex {
    vars: Vec<VarInfo>,
    rows: Vec<Option<Row>>,
    /// Row occurrences per variable.
    columns: Vec<Vec<usize>>,
    to_patch: Vec<Var>,
    rng: SmallRng,
    max_iterations: usize,
    blands_rule_threshold: usize,
    infeasible_row: Option<usize>,
    statistics: FixplexStatistics,
}

impl Default for Fixplex {
    fn default() -> Self {
        Fixplex {
            vars: vec![],
            rows: vec![],
            columns: vec![],
            to_patch: vec![],
            rng: SmallRng::seed_from_u64(0),
            max_iterations: 10_000,
            blands_rule_threshold: 1_000,
            infeasible_row: None,
            statistics: FixplexStatistics::default(),
        }
    }
}

impl Fixplex {
    pub fn new() -> Fixplex {
        Fixplex::default()
    }

    pub fn set_max_iterations(&mut self, n: usize) {
        self.max_iterations = n;
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn statistics(&self) -> FixplexStatistics {
        self.statistics
    }

    fn ensure_var(&mut self, var: Var) {
        while self.vars.len() <= var as usize {
            self.vars.push(VarInfo::default());
            self.columns.push(vec![]);
        }
    }

    pub fn set_bounds(&mut self, var: Var, lo: u64, hi: u64) {
        self.ensure_var(var);
        self.vars[var as usize].range = Interval::new(lo, hi);
        if !self.in_bounds(var) {
            self.add_patch(var);
        }
    }

    pub fn unset_bounds(&mut self, var: Var) {
        self.ensure_var(var);
        self.vars[var as usize].range = Interval::free();
    }

    pub fn lo(&self, var: Var) -> u64 {
        self.vars[var as usize].range.lo
    }

    pub fn hi(&self, var: Var) -> u64 {
        self.vars[var as usize].range.hi
    }

    pub fn value(&self, var: Var) -> u64 {
        self.vars[var as usize].value
    }

    fn in_bounds(&self, var: Var) -> bool {
        let info = &self.vars[var as usize];
        info.range.contains(info.value)
    }

    fn add_patch(&mut self, var: Var) {
        if !self.to_patch.contains(&var) {
            self.to_patch.push(var);
        }
    }

    /// Add the equality `sum coeffs_i * vars_i = 0` solved for `base`, whose
    /// coefficient must be odd. Base variables of existing rows occurring
    /// among the terms are eliminated first (Gauss-Jordan), and the new base
    /// is eliminated from the rest of the tableau, so that every base
    /// variable occurs in exactly one row.
    pub fn add_row(&mut self, base: Var, vars: &[Var], coeffs: &[u64]) -> usize {
        cardinal_assert_simple!(vars.len() == coeffs.len());
        let mut terms: Vec<(u64, Var)> = vars
            .iter()
            .copied()
            .zip(coeffs.iter().copied())
            .map(|(var, coeff)| (coeff, var))
            .filter(|&(coeff, _)| coeff != 0)
            .collect();
        for &(_, var) in &terms {
            self.ensure_var(var);
        }

        // eliminate existing base variables from the incoming terms
        loop {
            let Some(position) = terms.iter().position(|&(_, var)| {
                var != base && self.vars[var as usize].is_base
            }) else {
                break;
            };
            let (coeff, var) = terms[position];
            let row_id = self.vars[var as usize].base_row;
            let row = self.rows[row_id].clone().expect("base rows are live");
            let multiplier = coeff.wrapping_mul(numeral::mul_inverse(row.base_coeff));
            terms = combine(&terms, &row.terms, multiplier);
        }

        let base_coeff = terms
            .iter()
            .find(|&&(_, var)| var == base)
            .map(|&(coeff, _)| coeff)
            .expect("the base variable must occur in the row");
        cardinal_assert_simple!(base_coeff % 2 == 1);
        cardinal_assert_simple!(!self.vars[base as usize].is_base);

        let row_id = self.rows.len();
        for &(_, var) in &terms {
            self.columns[var as usize].push(row_id);
        }
        self.rows.push(Some(Row {
            base,
            base_coeff,
            terms,
        }));
        self.vars[base as usize].is_base = true;
        self.vars[base as usize].base_row = row_id;

        // eliminate the new base from every other row
        let occurrences: Vec<usize> = self.columns[base as usize]
            .iter()
            .copied()
            .filter(|&other| other != row_id)
            .collect();
        for other_id in occurrences {
            let Some(other) = self.rows[other_id].clone() else {
                continue;
            };
            let Some(&(coeff, _)) = other.terms.iter().find(|&&(_, var)| var == base) else {
                continue;
            };
            let base_row = self.rows[row_id].clone().expect("just inserted");
            let multiplier = coeff.wrapping_mul(numeral::mul_inverse(base_row.base_coeff));
            let combined = combine(&other.terms, &base_row.terms, multiplier);
            self.replace_row_terms(other_id, other.base, combined);
        }

        self.solve_for_base(row_id);
        row_id
    }

    fn replace_row_terms(&mut self, row_id: usize, base: Var, terms: Vec<(u64, Var)>) {
        let old = self.rows[row_id].take().expect("row is live");
        for &(_, var) in &old.terms {
            self.columns[var as usize].retain(|&other| other != row_id);
        }
        let base_coeff = terms
            .iter()
            .find(|&&(_, var)| var == base)
            .map(|&(coeff, _)| coeff)
            .expect("elimination never removes the base");
        for &(_, var) in &terms {
            self.columns[var as usize].push(row_id);
        }
        self.rows[row_id] = Some(Row {
            base,
            base_coeff,
            terms,
        });
    }

    pub fn del_row(&mut self, base: Var) {
        if !self.vars[base as usize].is_base {
            return;
        }
        let row_id = self.vars[base as usize].base_row;
        let Some(row) = self.rows[row_id].take() else {
            return;
        };
        for &(_, var) in &row.terms {
            self.columns[var as usize].retain(|&other| other != row_id);
        }
        self.vars[base as usize].is_base = false;
    }

    /// Recompute the base value of a row so the row sums to zero.
    fn solve_for_base(&mut self, row_id: usize) {
        let Some(row) = &self.rows[row_id] else {
            return;
        };
        let mut sum: u64 = 0;
        for &(coeff, var) in &row.terms {
            if var != row.base {
                sum = sum.wrapping_add(coeff.wrapping_mul(self.vars[var as usize].value));
            }
        }
        let base = row.base;
        let inverse = numeral::mul_inverse(row.base_coeff);
        self.vars[base as usize].value = 0u64.wrapping_sub(sum).wrapping_mul(inverse);
        if !self.in_bounds(base) {
            self.add_patch(base);
        }
    }

    fn row_sum(&self, row: &Row) -> u64 {
        row.terms.iter().fold(0u64, |sum, &(coeff, var)| {
            sum.wrapping_add(coeff.wrapping_mul(self.vars[var as usize].value))
        })
    }

    /// Every row sums to zero under the current values and base bookkeeping
    /// is consistent.
    pub fn well_formed(&self) -> bool {
        self.rows.iter().flatten().all(|row| {
            self.row_sum(row) == 0
                && self.vars[row.base as usize].is_base
                && row.terms.iter().any(|&(_, var)| var == row.base)
        })
    }

    /// Decide feasibility of the current system: tighten the variable
    /// bounds through the rows first, then pivot towards a value assignment
    /// within bounds.
    pub fn check(&mut self) -> Feasibility {
        if self.propagate_bounds() == Feasibility::Infeasible {
            return Feasibility::Infeasible;
        }
        self.make_feasible()
    }

    /// Pivot until every value lies within its bounds. Returns `Unknown`
    /// when the iteration budget runs out or progress stalls without an
    /// infeasibility certificate.
    pub fn make_feasible(&mut self) -> Feasibility {
        self.statistics.num_checks += 1;
        self.infeasible_row = None;
        let mut num_repeated = 0usize;
        let mut bland = false;

        for iteration in 0..self.max_iterations {
            let Some(violated) = self.select_violated_var() else {
                cardinal_assert_moderate!(self.well_formed());
                return Feasibility::Feasible;
            };
            trace!("patching v{violated} at iteration {iteration}");

            if !self.vars[violated as usize].is_base {
                // a non-base value can move freely; dependent bases follow
                self.update_value(violated, self.vars[violated as usize].range.lo);
                continue;
            }

            let row_id = self.vars[violated as usize].base_row;
            match self.make_var_feasible(violated, row_id, bland) {
                Feasibility::Feasible => {
                    num_repeated += 1;
                    if num_repeated > self.blands_rule_threshold {
                        bland = true;
                    }
                }
                Feasibility::Infeasible => {
                    self.statistics.num_infeasible += 1;
                    self.infeasible_row = Some(row_id);
                    return Feasibility::Infeasible;
                }
                Feasibility::Unknown => return Feasibility::Unknown,
            }
        }
        Feasibility::Unknown
    }

    fn select_violated_var(&mut self) -> Option<Var> {
        while let Some(var) = self.to_patch.pop() {
            if !self.in_bounds(var) {
                return Some(var);
            }
        }
        // sweep for violations the patch queue missed
        (0..self.vars.len() as Var).find(|&var| !self.in_bounds(var))
    }

    /// Try to move the out-of-bounds base variable `violated` to its lower
    /// bound by pivoting against an odd-coefficient non-base variable of its
    /// row.
    fn make_var_feasible(&mut self, violated: Var, row_id: usize, bland: bool) -> Feasibility {
        let row = self.rows[row_id].clone().expect("base rows are live");
        let target = self.vars[violated as usize].range.lo;
        let delta = target.wrapping_sub(self.vars[violated as usize].value);

        let candidates: Vec<(u64, Var)> = row
            .terms
            .iter()
            .copied()
            .filter(|&(coeff, var)| var != violated && coeff % 2 == 1)
            .collect();

        if candidates.is_empty() {
            return self.no_pivot_outcome(&row, violated);
        }

        let (pivot_coeff, pivot_var) = if bland {
            // Bland's rule: the smallest variable index, to break cycles
            *candidates
                .iter()
                .min_by_key(|&&(_, var)| var)
                .expect("candidates are non-empty")
        } else {
            candidates[self.rng.gen_range(0..candidates.len())]
        };

        // moving the base by delta requires the pivot column to absorb
        // base_coeff * delta
        let compensation = 0u64
            .wrapping_sub(row.base_coeff.wrapping_mul(delta))
            .wrapping_mul(numeral::mul_inverse(pivot_coeff));
        self.vars[violated as usize].value = target;
        let pivot_value = self.vars[pivot_var as usize].value.wrapping_add(compensation);
        self.vars[pivot_var as usize].value = pivot_value;
        self.pivot(violated, pivot_var, pivot_coeff, row_id);

        // rows other than this one that mention the pivot column must be
        // re-solved for their bases
        let occurrences: Vec<usize> = self.columns[pivot_var as usize]
            .iter()
            .copied()
            .filter(|&other| other != row_id)
            .collect();
        for other_id in occurrences {
            self.solve_for_base(other_id);
        }
        if !self.in_bounds(pivot_var) {
            self.add_patch(pivot_var);
        }
        Feasibility::Feasible
    }

    /// No invertible pivot column: when the remaining columns are fixed the
    /// row is a unit equation in the base variable (whose coefficient is
    /// odd, hence invertible), which either pins the base inside its bounds
    /// or certifies infeasibility.
    fn no_pivot_outcome(&mut self, row: &Row, violated: Var) -> Feasibility {
        let all_fixed = row.terms.iter().all(|&(_, var)| {
            var == violated || {
                let range = self.vars[var as usize].range;
                !range.is_free() && range.width() == 1
            }
        });
        if !all_fixed {
            return Feasibility::Unknown;
        }
        let mut rhs: u64 = 0;
        for &(coeff, var) in &row.terms {
            if var != violated {
                rhs = rhs.wrapping_add(coeff.wrapping_mul(self.vars[var as usize].range.lo));
            }
        }
        let rhs = 0u64.wrapping_sub(rhs);
        // base_coeff * x = rhs (mod 2^64) has the unique solution
        // x = rhs * base_coeff^-1
        let solution = rhs.wrapping_mul(numeral::mul_inverse(row.base_coeff));
        if self.vars[violated as usize].range.contains(solution) {
            self.update_value(violated, solution);
            Feasibility::Feasible
        } else {
            Feasibility::Infeasible
        }
    }

    fn pivot(&mut self, old_base: Var, new_base: Var, new_base_coeff: u64, row_id: usize) {
        self.statistics.num_pivots += 1;
        self.vars[old_base as usize].is_base = false;
        self.vars[new_base as usize].is_base = true;
        self.vars[new_base as usize].base_row = row_id;
        let row = self.rows[row_id].as_mut().expect("base rows are live");
        row.base = new_base;
        row.base_coeff = new_base_coeff;
    }

    /// Assign a value to a non-base variable and re-solve the dependent
    /// rows.
    fn update_value(&mut self, var: Var, new_value: u64) {
        self.vars[var as usize].value = new_value;
        let occurrences: Vec<usize> = self.columns[var as usize].to_vec();
        for row_id in occurrences {
            let is_own_base = self.rows[row_id]
                .as_ref()
                .is_some_and(|row| row.base == var);
            if !is_own_base {
                self.solve_for_base(row_id);
            }
        }
    }

    pub fn get_infeasible_row(&self) -> Option<Vec<(u64, Var)>> {
        self.infeasible_row
            .and_then(|row_id| self.rows[row_id].as_ref())
            .map(|row| row.terms.clone())
    }

    /// Interval propagation: for every row and every odd-coefficient
    /// variable in it, the variable is confined to the inverse image of the
    /// negated sum of the other terms. Returns `Infeasible` when a bound
    /// becomes empty.
    pub fn propagate_bounds(&mut self) -> Feasibility {
        for row_id in 0..self.rows.len() {
            let Some(row) = self.rows[row_id].clone() else {
                continue;
            };
            for &(coeff, var) in &row.terms {
                if coeff % 2 == 0 {
                    continue;
                }
                let mut sum = Interval::new(0, 1);
                for &(other_coeff, other_var) in &row.terms {
                    if other_var == var {
                        continue;
                    }
                    let scaled = self.vars[other_var as usize].range.scale(other_coeff);
                    sum = sum.add(&scaled);
                    if sum.is_free() {
                        break;
                    }
                }
                if sum.is_free() {
                    continue;
                }
                let image = sum.neg().scale_by_inverse(coeff);
                let tightened = self.vars[var as usize].range.intersect(&image);
                if tightened.is_empty() {
                    self.infeasible_row = Some(row_id);
                    return Feasibility::Infeasible;
                }
                self.vars[var as usize].range = tightened;
                if !self.in_bounds(var) {
                    self.add_patch(var);
                }
            }
        }
        Feasibility::Feasible
    }

    pub fn reset(&mut self) {
        self.vars.clear();
        self.rows.clear();
        self.columns.clear();
        self.to_patch.clear();
        self.infeasible_row = None;
    }
}

/// `left - multiplier * right`, merging equal variables and dropping zero
/// coefficients.
fn combine(left: &[(u64, Var)], right: &[(u64, Var)], multiplier: u64) -> Vec<(u64, Var)> {
    let mut result: Vec<(u64, Var)> = left.to_vec();
    for &(coeff, var) in right {
        let subtracted = 0u64.wrapping_sub(multiplier.wrapping_mul(coeff));
        if let Some(position) = result.iter().position(|&(_, other)| other == var) {
            let merged = result[position].0.wrapping_add(subtracted);
            if merged == 0 {
                let _ = result.swap_remove(position);
            } else {
                result[position].0 = merged;
            }
        } else if subtracted != 0 {
            result.push((subtracted, var));
        }
    }
    result
}

impl Interval {
    /// Multiply by the inverse of an odd coefficient: the preimage of the
    /// arc under multiplication, over-approximated as an arc.
    fn scale_by_inverse(&self, coeff: u64) -> Interval {
        cardinal_assert_simple!(coeff % 2 == 1);
        if coeff == 1 {
            return *self;
        }
        if self.is_empty() || self.is_free() {
            return *self;
        }
        // the preimage of a short arc under multiplication by an odd unit is
        // scattered; only the single-point case maps back precisely
        if self.width() == 1 {
            let inverse = numeral::mul_inverse(coeff);
            let point = self.lo.wrapping_mul(inverse);
            return Interval::new(point, point.wrapping_add(1));
        }
        Interval::free()
    }
}

impl std::fmt::Display for Fixplex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.rows.iter().flatten() {
            for (position, (coeff, var)) in row.terms.iter().enumerate() {
                if position > 0 {
                    write!(f, " + ")?;
                }
                write!(f, "{coeff}*v{var}")?;
            }
            writeln!(f, " = 0 (base v{})", row.base)?;
        }
        for (var, info) in self.vars.iter().enumerate() {
            writeln!(f, "v{var} := {} {}", info.value, info.range)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_rows_are_solved_for_their_base() {
        let mut fixplex = Fixplex::new();
        // x + 2y + 3z = 0, base x
        let _ = fixplex.add_row(0, &[0, 1, 2], &[1, 2, 3]);
        assert!(fixplex.well_formed());
        assert_eq!(fixplex.value(0), 0);
    }

    #[test]
    fn feasible_system_is_recognised() {
        let mut fixplex = Fixplex::new();
        // x = y + z  (x - y - z = 0)
        let minus_one = 0u64.wrapping_sub(1);
        let _ = fixplex.add_row(0, &[0, 1, 2], &[1, minus_one, minus_one]);
        fixplex.set_bounds(1, 2, 4); // y in {2, 3}
        fixplex.set_bounds(2, 5, 6); // z = 5
        fixplex.set_bounds(0, 7, 9); // x in {7, 8}

        assert_eq!(fixplex.make_feasible(), Feasibility::Feasible);
        assert!(fixplex.well_formed());
        let x = fixplex.value(0);
        let y = fixplex.value(1);
        let z = fixplex.value(2);
        assert_eq!(x, y.wrapping_add(z));
        assert!((7..9).contains(&x));
    }

    #[test]
    fn contradictory_fixed_rows_are_infeasible() {
        let mut fixplex = Fixplex::new();
        // x - y = 0 with x = 1, y = 2
        let minus_one = 0u64.wrapping_sub(1);
        let _ = fixplex.add_row(0, &[0, 1], &[1, minus_one]);
        fixplex.set_bounds(0, 1, 2);
        fixplex.set_bounds(1, 2, 3);

        assert_eq!(fixplex.check(), Feasibility::Infeasible);
        assert!(fixplex.get_infeasible_row().is_some());
    }

    #[test]
    fn pinned_rows_with_no_solution_in_range_are_infeasible() {
        let mut fixplex = Fixplex::new();
        // x + 2y = 0 with y fixed at 5 forces x = -10
        let _ = fixplex.add_row(0, &[0, 1], &[1, 2]);
        fixplex.set_bounds(0, 3, 4); // x = 3
        fixplex.set_bounds(1, 5, 6); // y = 5
        assert_eq!(fixplex.make_feasible(), Feasibility::Infeasible);
    }

    #[test]
    fn bounds_propagate_through_rows() {
        let mut fixplex = Fixplex::new();
        // x - y = 0: x and y are equal
        let minus_one = 0u64.wrapping_sub(1);
        let _ = fixplex.add_row(0, &[0, 1], &[1, minus_one]);
        fixplex.set_bounds(1, 10, 11); // y = 10

        assert_eq!(fixplex.propagate_bounds(), Feasibility::Feasible);
        assert!(fixplex.lo(0) == 10 && fixplex.hi(0) == 11);
    }

    #[test]
    fn wrapping_equalities_are_satisfiable() {
        let mut fixplex = Fixplex::new();
        // x + y = 0 (mod 2^64), y fixed at 1: x must be 2^64 - 1
        let _ = fixplex.add_row(0, &[0, 1], &[1, 1]);
        fixplex.set_bounds(1, 1, 2);
        fixplex.set_bounds(0, u64::MAX - 3, 0); // upper arc

        assert_eq!(fixplex.make_feasible(), Feasibility::Feasible);
        assert_eq!(fixplex.value(0), u64::MAX);
    }
}
