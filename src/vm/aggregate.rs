//! Aggregate accumulators for the AggInit/AggStep/AggFinal opcodes
//!
//! Each aggregate slot holds one [`Accumulator`]. NULL inputs are skipped;
//! the first non-NULL input seeds the running sum, minimum and maximum.

use std::cmp::Ordering;

use crate::vm::value::Scalar;

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// COUNT - number of non-NULL inputs
    Count,
    /// SUM - integer sum, REAL once any input is REAL or the sum overflows
    Sum,
    /// AVG - REAL mean of the non-NULL inputs
    Avg,
    /// MIN - smallest input under SQL comparison
    Min,
    /// MAX - largest input under SQL comparison
    Max,
}

impl AggregateFunction {
    /// Convert a function name string to an AggregateFunction enum
    ///
    /// # Arguments
    /// * `name` - The function name (case-insensitive)
    ///
    /// # Returns
    /// * Some(AggregateFunction) if the name is a valid aggregate function, None otherwise
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }
}

/// Running state of one aggregate slot
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: AggregateFunction,
    count: i64,
    sum: Scalar,
    min: Scalar,
    max: Scalar,
    all_null: bool,
}

impl Accumulator {
    pub fn new(function: AggregateFunction) -> Self {
        Accumulator {
            function,
            count: 0,
            sum: Scalar::Null,
            min: Scalar::Null,
            max: Scalar::Null,
            all_null: true,
        }
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    /// Fold one input into the running state
    pub fn step(&mut self, value: &Scalar) {
        if value.is_null() {
            return;
        }
        self.count += 1;
        if self.all_null {
            self.all_null = false;
            self.sum = value.clone();
            self.min = value.clone();
            self.max = value.clone();
            return;
        }
        self.sum = self.sum.add(value);
        if value.compare(&self.min) == Ordering::Less {
            self.min = value.clone();
        }
        if value.compare(&self.max) == Ordering::Greater {
            self.max = value.clone();
        }
    }

    /// Final value of the aggregate
    ///
    /// COUNT over no non-NULL input is 0; every other function is NULL.
    pub fn finish(&self) -> Scalar {
        match self.function {
            AggregateFunction::Count => Scalar::Integer(self.count),
            _ if self.all_null => Scalar::Null,
            AggregateFunction::Sum => self.sum.clone(),
            AggregateFunction::Avg => Scalar::Float(self.sum.to_float() / self.count as f64),
            AggregateFunction::Min => self.min.clone(),
            AggregateFunction::Max => self.max.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(function: AggregateFunction, inputs: &[Scalar]) -> Scalar {
        let mut acc = Accumulator::new(function);
        for v in inputs {
            acc.step(v);
        }
        acc.finish()
    }

    #[test]
    fn test_from_name_ignores_case() {
        assert_eq!(AggregateFunction::from_name("count"), Some(AggregateFunction::Count));
        assert_eq!(AggregateFunction::from_name("Avg"), Some(AggregateFunction::Avg));
        assert_eq!(AggregateFunction::from_name("median"), None);
    }

    #[test]
    fn test_all_null_group() {
        let nulls = [Scalar::Null, Scalar::Null];
        assert_eq!(run(AggregateFunction::Count, &nulls).as_int(), 0);
        assert!(!run(AggregateFunction::Count, &nulls).is_null());
        for f in [
            AggregateFunction::Sum,
            AggregateFunction::Avg,
            AggregateFunction::Min,
            AggregateFunction::Max,
        ] {
            assert!(run(f, &nulls).is_null(), "{:?} over NULLs should be NULL", f);
            assert!(run(f, &[]).is_null());
        }
    }

    #[test]
    fn test_numeric_aggregates_skip_nulls() {
        let inputs = [
            Scalar::Integer(4),
            Scalar::Null,
            Scalar::Integer(1),
            Scalar::Integer(7),
        ];
        assert_eq!(run(AggregateFunction::Count, &inputs).as_int(), 3);
        assert_eq!(run(AggregateFunction::Sum, &inputs).as_int(), 12);
        assert_eq!(run(AggregateFunction::Avg, &inputs).as_float(), 4.0);
        assert_eq!(run(AggregateFunction::Min, &inputs).as_int(), 1);
        assert_eq!(run(AggregateFunction::Max, &inputs).as_int(), 7);
    }

    #[test]
    fn test_sum_promotes_on_real_input() {
        let sum = run(AggregateFunction::Sum, &[Scalar::Integer(1), Scalar::Float(0.5)]);
        assert_eq!(sum.as_float(), 1.5);
    }

    #[test]
    fn test_min_max_over_text() {
        let inputs = [Scalar::text("pear"), Scalar::text("apple")];
        assert_eq!(run(AggregateFunction::Min, &inputs).as_text(), "apple");
        assert_eq!(run(AggregateFunction::Max, &inputs).as_text(), "pear");
    }
}
