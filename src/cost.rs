//! Multi-component cost structure.
//!
//! A [`Cost`] aggregates the contributions of every registered cost
//! component, split into *violations* (hard components, feasibility) and
//! *objective* (soft components). The scalar `total` folds the two together
//! through [`HARD_WEIGHT`], chosen large enough that any feasibility
//! improvement dominates any objective change.
//!
//! Comparisons follow the weighted value when both operands carry one, and
//! the total otherwise. A component-wise lexicographic regime is available
//! through [`Cost::cmp_hierarchical`].

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Index, Sub, SubAssign};

/// Multiplies the violations in the scalar total. Any realistic objective
/// value must stay below this constant for the lexicographic reading of
/// `total` to hold.
pub const HARD_WEIGHT: f64 = 1000.0;

/// Aggregated cost of a solution or of a move (as a delta).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cost {
    /// `HARD_WEIGHT * violations + objective`.
    pub total: f64,
    /// Sum of the hard components.
    pub violations: f64,
    /// Sum of the soft components.
    pub objective: f64,
    /// Raw contribution of each registered cost component, in registration
    /// order.
    pub components: Vec<f64>,
    /// Externally weighted combination, set when a weight vector was
    /// supplied to the cost function. When present on both operands it
    /// drives every comparison.
    pub weighted: Option<f64>,
}

impl Cost {
    /// A zero cost with `n` zeroed components.
    pub fn zero(n: usize) -> Self {
        Cost {
            total: 0.0,
            violations: 0.0,
            objective: 0.0,
            components: vec![0.0; n],
            weighted: None,
        }
    }

    /// Assembles a cost from its violation/objective parts, computing the
    /// total.
    pub fn new(violations: f64, objective: f64, components: Vec<f64>) -> Self {
        Cost {
            total: HARD_WEIGHT * violations + objective,
            violations,
            objective,
            components,
            weighted: None,
        }
    }

    /// Attaches a weighted value, switching comparisons to the weighted
    /// regime.
    pub fn with_weighted(mut self, weighted: f64) -> Self {
        self.weighted = Some(weighted);
        self
    }

    pub fn is_weighted(&self) -> bool {
        self.weighted.is_some()
    }

    /// The value used in scalar comparisons: `weighted` when present,
    /// `total` otherwise.
    pub fn value(&self) -> f64 {
        self.weighted.unwrap_or(self.total)
    }

    /// Number of tracked components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component-wise lexicographic comparison: the first differing index
    /// decides. Components missing on either side compare as equal.
    pub fn cmp_hierarchical(&self, other: &Cost) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.partial_cmp(b) {
                Some(Ordering::Equal) | None => continue,
                Some(ord) => return ord,
            }
        }
        Ordering::Equal
    }
}

impl AddAssign<&Cost> for Cost {
    fn add_assign(&mut self, other: &Cost) {
        self.total += other.total;
        self.violations += other.violations;
        self.objective += other.objective;
        if self.components.len() < other.components.len() {
            self.components.resize(other.components.len(), 0.0);
        }
        for (i, c) in other.components.iter().enumerate() {
            self.components[i] += c;
        }
        self.weighted = match (self.weighted, other.weighted) {
            (Some(a), Some(b)) => Some(a + b),
            _ => None,
        };
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, other: Cost) {
        *self += &other;
    }
}

impl Add for Cost {
    type Output = Cost;
    fn add(mut self, other: Cost) -> Cost {
        self += &other;
        self
    }
}

impl SubAssign<&Cost> for Cost {
    fn sub_assign(&mut self, other: &Cost) {
        self.total -= other.total;
        self.violations -= other.violations;
        self.objective -= other.objective;
        if self.components.len() < other.components.len() {
            self.components.resize(other.components.len(), 0.0);
        }
        for (i, c) in other.components.iter().enumerate() {
            self.components[i] -= c;
        }
        self.weighted = match (self.weighted, other.weighted) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        };
    }
}

impl SubAssign for Cost {
    fn sub_assign(&mut self, other: Cost) {
        *self -= &other;
    }
}

impl Sub for Cost {
    type Output = Cost;
    fn sub(mut self, other: Cost) -> Cost {
        self -= &other;
        self
    }
}

impl Index<usize> for Cost {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        &self.components[i]
    }
}

impl PartialEq for Cost {
    fn eq(&self, other: &Cost) -> bool {
        match (self.weighted, other.weighted) {
            (Some(a), Some(b)) => a == b,
            _ => self.total == other.total,
        }
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Cost) -> Option<Ordering> {
        match (self.weighted, other.weighted) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => self.total.partial_cmp(&other.total),
        }
    }
}

impl PartialEq<f64> for Cost {
    fn eq(&self, other: &f64) -> bool {
        self.value() == *other
    }
}

impl PartialOrd<f64> for Cost {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.value().partial_cmp(other)
    }
}

impl PartialEq<Cost> for f64 {
    fn eq(&self, other: &Cost) -> bool {
        *self == other.value()
    }
}

impl PartialOrd<Cost> for f64 {
    fn partial_cmp(&self, other: &Cost) -> Option<Ordering> {
        self.partial_cmp(&other.value())
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (viol: {}, obj: {}, comps: {{",
            self.total, self.violations, self.objective
        )?;
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "}})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_total_invariant() {
        let c = Cost::new(2.0, 7.0, vec![2.0, 7.0]);
        assert_eq!(c.total, HARD_WEIGHT * 2.0 + 7.0);
        assert_eq!(c.violations, 2.0);
        assert_eq!(c.objective, 7.0);
    }

    #[test]
    fn test_add_extends_components() {
        let mut a = Cost::new(0.0, 1.0, vec![1.0]);
        let b = Cost::new(1.0, 2.0, vec![1.0, 2.0, 3.0]);
        a += &b;
        assert_eq!(a.components, vec![2.0, 2.0, 3.0]);
        assert_eq!(a.violations, 1.0);
        assert_eq!(a.objective, 3.0);
        assert_eq!(a.total, HARD_WEIGHT + 3.0);
    }

    #[test]
    fn test_sub_roundtrip() {
        let a = Cost::new(3.0, 5.0, vec![3.0, 5.0]);
        let b = Cost::new(1.0, 2.0, vec![1.0, 2.0]);
        let d = a.clone() - b.clone();
        let back = d + b;
        assert_eq!(back.total, a.total);
        assert_eq!(back.components, a.components);
    }

    #[test]
    fn test_comparison_uses_total_by_default() {
        let a = Cost::new(0.0, 5.0, vec![5.0]);
        let b = Cost::new(0.0, 7.0, vec![7.0]);
        assert!(a < b);
        assert!(b > a);
        assert!(a != b);
    }

    #[test]
    fn test_comparison_prefers_weighted_when_both_carry_it() {
        // Weighted order is the reverse of the total order here.
        let a = Cost::new(0.0, 5.0, vec![5.0]).with_weighted(10.0);
        let b = Cost::new(0.0, 7.0, vec![7.0]).with_weighted(3.0);
        assert!(b < a);

        // One-sided weighting falls back to totals.
        let c = Cost::new(0.0, 5.0, vec![5.0]).with_weighted(10.0);
        let d = Cost::new(0.0, 7.0, vec![7.0]);
        assert!(c < d);
    }

    #[test]
    fn test_scalar_comparison() {
        let a = Cost::new(0.0, -3.0, vec![-3.0]);
        assert!(a < 0.0);
        assert!(a <= 0.0);
        assert!(0.0 > a);
        let w = Cost::new(0.0, -3.0, vec![-3.0]).with_weighted(4.0);
        assert!(w > 0.0);
    }

    #[test]
    fn test_hierarchical_first_differing_index_decides() {
        let a = Cost::new(0.0, 0.0, vec![1.0, 9.0, 0.0]);
        let b = Cost::new(0.0, 0.0, vec![1.0, 2.0, 100.0]);
        assert_eq!(a.cmp_hierarchical(&b), Ordering::Greater);
        assert_eq!(b.cmp_hierarchical(&a), Ordering::Less);
        assert_eq!(a.cmp_hierarchical(&a), Ordering::Equal);
    }

    #[test]
    fn test_display_format() {
        let c = Cost::new(1.0, 2.0, vec![1.0, 2.0]);
        assert_eq!(format!("{c}"), "1002 (viol: 1, obj: 2, comps: {1, 2})");
    }

    #[test]
    fn test_violations_dominate_objective() {
        // One violation outweighs any objective below HARD_WEIGHT.
        let feasible = Cost::new(0.0, 999.0, vec![0.0, 999.0]);
        let infeasible = Cost::new(1.0, 0.0, vec![1.0, 0.0]);
        assert!(feasible < infeasible);
    }

    proptest! {
        #[test]
        fn prop_total_invariant_after_sum(
            v1 in -100.0f64..100.0, o1 in -100.0f64..100.0,
            v2 in -100.0f64..100.0, o2 in -100.0f64..100.0,
        ) {
            let a = Cost::new(v1, o1, vec![v1, o1]);
            let b = Cost::new(v2, o2, vec![v2, o2]);
            let s = a + b;
            prop_assert!((s.total - (HARD_WEIGHT * s.violations + s.objective)).abs() < 1e-9);
        }

        #[test]
        fn prop_component_count_is_max_of_operands(n1 in 0usize..6, n2 in 0usize..6) {
            let a = Cost::new(0.0, 0.0, vec![1.0; n1]);
            let b = Cost::new(0.0, 0.0, vec![1.0; n2]);
            let s = a + b;
            prop_assert_eq!(s.len(), n1.max(n2));
        }
    }
}
