use num::rational::{BigRational, Rational64};
use num::{FromPrimitive, ToPrimitive, Zero};
use ordered_float::OrderedFloat;
use std::fmt::Debug;
use std::hash::Hash;

/// Numeric value stored in the leaves of rate diagrams.
///
/// The three implementations are double precision floats, 64-bit fractions
/// and arbitrary precision rationals. One of them is picked per run.
pub trait Leaf: Clone + Eq + Ord + Hash + Debug + Send + Sync + 'static {
  const NAME: &'static str;

  fn zero() -> Self;

  fn from_f64(value: f64) -> Option<Self>;

  fn to_f64(&self) -> f64;

  fn add(&self, other: &Self) -> Self;

  fn mul(&self, other: &Self) -> Self;

  fn is_zero(&self) -> bool;

  fn max_of(&self, other: &Self) -> Self {
    if self >= other {
      self.clone()
    } else {
      other.clone()
    }
  }
}

impl Leaf for OrderedFloat<f64> {
  const NAME: &'static str = "float";

  fn zero() -> Self {
    OrderedFloat(0.0)
  }

  fn from_f64(value: f64) -> Option<Self> {
    // adding zero turns -0.0 into 0.0
    (!value.is_nan()).then(|| OrderedFloat(value + 0.0))
  }

  fn to_f64(&self) -> f64 {
    self.0
  }

  fn add(&self, other: &Self) -> Self {
    OrderedFloat(self.0 + other.0 + 0.0)
  }

  fn mul(&self, other: &Self) -> Self {
    OrderedFloat(self.0 * other.0 + 0.0)
  }

  fn is_zero(&self) -> bool {
    self.0 == 0.0
  }
}

impl Leaf for Rational64 {
  const NAME: &'static str = "fraction";

  fn zero() -> Self {
    <Self as Zero>::zero()
  }

  fn from_f64(value: f64) -> Option<Self> {
    <Rational64 as FromPrimitive>::from_f64(value)
  }

  fn to_f64(&self) -> f64 {
    ToPrimitive::to_f64(self).unwrap_or(f64::NAN)
  }

  fn add(&self, other: &Self) -> Self {
    self + other
  }

  fn mul(&self, other: &Self) -> Self {
    self * other
  }

  fn is_zero(&self) -> bool {
    Zero::is_zero(self)
  }
}

impl Leaf for BigRational {
  const NAME: &'static str = "exact";

  fn zero() -> Self {
    <Self as Zero>::zero()
  }

  fn from_f64(value: f64) -> Option<Self> {
    BigRational::from_float(value)
  }

  fn to_f64(&self) -> f64 {
    ToPrimitive::to_f64(self).unwrap_or(f64::NAN)
  }

  fn add(&self, other: &Self) -> Self {
    self + other
  }

  fn mul(&self, other: &Self) -> Self {
    self * other
  }

  fn is_zero(&self) -> bool {
    Zero::is_zero(self)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn arithmetic<L: Leaf>() {
    let two = L::from_f64(2.0).unwrap();
    let half = L::from_f64(0.5).unwrap();
    assert_eq!(two.mul(&half).to_f64(), 1.0);
    assert_eq!(two.add(&half).to_f64(), 2.5);
    assert_eq!(two.max_of(&half), two);
    assert!(L::zero().is_zero());
    assert!(!two.is_zero());
  }

  #[test]
  fn float_arithmetic() {
    arithmetic::<OrderedFloat<f64>>();
    assert_eq!(<OrderedFloat<f64> as Leaf>::from_f64(-0.0), Some(OrderedFloat(0.0)));
    assert_eq!(<OrderedFloat<f64> as Leaf>::from_f64(f64::NAN), None);
  }

  #[test]
  fn fraction_arithmetic() {
    arithmetic::<Rational64>();
  }

  #[test]
  fn exact_arithmetic() {
    arithmetic::<BigRational>();
    let third = BigRational::new(1.into(), 3.into());
    let sum = Leaf::add(&Leaf::add(&third, &third), &third);
    assert_eq!(sum, BigRational::from_integer(1.into()));
  }
}
