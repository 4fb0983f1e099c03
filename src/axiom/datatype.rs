//! Feature restrictions and their opaque comparison.
//!
//! A restriction `(feature op value)` behaves like an atomic concept during
//! saturation. The only concrete-domain reasoning performed is deciding
//! whether one restriction on a feature entails another on the same feature,
//! under a dense-order reading of the comparison operators.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::AxiomError;

use super::Feature;

/// Comparison operator of a feature restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    /// Whether `ordering` (the value compared against the bound) satisfies this operator.
    fn admits(self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// Literal value of a feature restriction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Literal {
    fn kind(&self) -> &'static str {
        match self {
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::Bool(_) => "bool",
        }
    }

    /// Compare two literals; `None` when they are not comparable.
    pub fn compare(&self, other: &Literal) -> Option<Ordering> {
        match (self, other) {
            (Literal::Int(a), Literal::Int(b)) => Some(a.cmp(b)),
            (Literal::Int(a), Literal::Float(b)) => cmp_int_float(*a, *b),
            (Literal::Float(a), Literal::Int(b)) => cmp_int_float(*b, *a).map(Ordering::reverse),
            (Literal::Float(a), Literal::Float(b)) => a.partial_cmp(b),
            (Literal::Str(a), Literal::Str(b)) => Some(a.cmp(b)),
            (Literal::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Exact `i64` against `f64`; casting the integer would round above 2^53.
fn cmp_int_float(int: i64, float: f64) -> Option<Ordering> {
    // 2^63, the first float past i64::MAX.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if float.is_nan() {
        return None;
    }
    if float >= LIMIT {
        return Some(Ordering::Less);
    }
    if float < -LIMIT {
        return Some(Ordering::Greater);
    }
    let whole = float.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(float - whole)),
        unequal => Some(unequal),
    }
}

// Floats are compared by bit pattern so restrictions can be interned.
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::Str(a), Literal::Str(b)) => a == b,
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Int(v) => v.hash(state),
            Literal::Float(v) => v.to_bits().hash(state),
            Literal::Str(v) => v.hash(state),
            Literal::Bool(v) => v.hash(state),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Str(v) => write!(f, "{v:?}"),
            Literal::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// A feature restriction `(feature op value)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Datatype {
    pub feature: Feature,
    pub operator: Operator,
    pub value: Literal,
}

impl Datatype {
    pub fn new(feature: Feature, operator: Operator, value: Literal) -> Self {
        Self {
            feature,
            operator,
            value,
        }
    }

    /// Whether every value satisfying `self` also satisfies `other`.
    ///
    /// Restrictions on different features never entail each other. Comparing
    /// incompatible literal kinds (or NaN) on the same feature is an error.
    pub fn entails(&self, other: &Datatype) -> Result<bool, AxiomError> {
        if self.feature != other.feature {
            return Ok(false);
        }
        let ordering =
            self.value
                .compare(&other.value)
                .ok_or_else(|| AxiomError::DatatypeMismatch {
                    feature: self.feature.get(),
                    left: format!("{} {}", self.value.kind(), self.value),
                    right: format!("{} {}", other.value.kind(), other.value),
                })?;

        use Operator::*;
        let entailed = match (self.operator, other.operator) {
            // A single admitted value: check it directly against the other bound.
            (Eq, op) => op.admits(ordering),
            (Lt, Lt | Le) | (Le, Le) => ordering != Ordering::Greater,
            (Le, Lt) => ordering == Ordering::Less,
            (Gt, Gt | Ge) | (Ge, Ge) => ordering != Ordering::Less,
            (Ge, Gt) => ordering == Ordering::Greater,
            _ => false,
        };
        Ok(entailed)
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.feature, self.operator, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age(op: Operator, v: i64) -> Datatype {
        Datatype::new(Feature::new(0), op, Literal::Int(v))
    }

    #[test]
    fn equality_entails_matching_bounds() {
        assert!(age(Operator::Eq, 5).entails(&age(Operator::Ge, 3)).unwrap());
        assert!(age(Operator::Eq, 5).entails(&age(Operator::Eq, 5)).unwrap());
        assert!(!age(Operator::Eq, 5).entails(&age(Operator::Lt, 5)).unwrap());
    }

    #[test]
    fn bounds_entail_weaker_bounds() {
        assert!(age(Operator::Lt, 3).entails(&age(Operator::Le, 10)).unwrap());
        assert!(age(Operator::Le, 3).entails(&age(Operator::Lt, 4)).unwrap());
        assert!(!age(Operator::Le, 4).entails(&age(Operator::Lt, 4)).unwrap());
        assert!(age(Operator::Gt, 18).entails(&age(Operator::Ge, 18)).unwrap());
        assert!(!age(Operator::Gt, 18).entails(&age(Operator::Lt, 99)).unwrap());
        assert!(!age(Operator::Ge, 1).entails(&age(Operator::Eq, 1)).unwrap());
    }

    #[test]
    fn ints_and_floats_compare_numerically() {
        let float = Datatype::new(Feature::new(0), Operator::Eq, Literal::Float(2.5));
        assert!(float.entails(&age(Operator::Gt, 2)).unwrap());
    }

    #[test]
    fn large_ints_compare_exactly_against_floats() {
        let big = 1_i64 << 53;
        let exact = Literal::Float(big as f64);
        assert_eq!(Literal::Int(big + 1).compare(&exact), Some(Ordering::Greater));
        assert_eq!(exact.compare(&Literal::Int(big + 1)), Some(Ordering::Less));
        assert_eq!(Literal::Int(big).compare(&exact), Some(Ordering::Equal));
        assert_eq!(Literal::Int(-3).compare(&Literal::Float(-2.5)), Some(Ordering::Less));
        assert_eq!(Literal::Int(-2).compare(&Literal::Float(-2.5)), Some(Ordering::Greater));
        assert_eq!(Literal::Int(i64::MAX).compare(&Literal::Float(f64::INFINITY)), Some(Ordering::Less));
        assert_eq!(Literal::Int(i64::MIN).compare(&Literal::Float(-1e300)), Some(Ordering::Greater));

        let above = Datatype::new(Feature::new(0), Operator::Gt, exact);
        assert!(age(Operator::Eq, big + 1).entails(&above).unwrap());
        assert!(!age(Operator::Eq, big).entails(&above).unwrap());
    }

    #[test]
    fn different_features_never_entail() {
        let other = Datatype::new(Feature::new(1), Operator::Ge, Literal::Int(0));
        assert!(!age(Operator::Eq, 5).entails(&other).unwrap());
    }

    #[test]
    fn incompatible_literals_are_rejected() {
        let text = Datatype::new(Feature::new(0), Operator::Eq, Literal::Str("five".into()));
        let err = text.entails(&age(Operator::Eq, 5)).unwrap_err();
        assert!(matches!(err, AxiomError::DatatypeMismatch { feature: 0, .. }));

        let nan = Datatype::new(Feature::new(0), Operator::Eq, Literal::Float(f64::NAN));
        assert!(nan.entails(&age(Operator::Eq, 5)).is_err());
    }

    #[test]
    fn float_literals_hash_by_bits() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Literal::Float(1.5));
        assert!(set.contains(&Literal::Float(1.5)));
        assert!(!set.contains(&Literal::Int(1)));
    }
}
