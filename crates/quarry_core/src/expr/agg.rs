//! Aggregate accumulators.

use super::Func;
use crate::error::{CoreError, CoreResult};
use quarry_codec::Value;
use std::cmp::Ordering;

/// How aggregate calls evaluate.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Aggs<'a> {
    /// Not in an aggregate context: any aggregate call is misuse.
    Off,
    /// Final values after scanning a group.
    Final(&'a [Option<Acc>]),
    /// A group with no member rows.
    Empty,
}

impl Aggs<'_> {
    pub(super) fn value(self, func: Func, slot: usize) -> CoreResult<Value> {
        match self {
            Self::Off => Err(CoreError::eval(format!(
                "misuse of aggregate function {}",
                func.name()
            ))),
            Self::Final(accs) => Ok(accs
                .get(slot)
                .and_then(Option::as_ref)
                .map_or_else(|| empty_value(func), Acc::result)),
            Self::Empty => Ok(empty_value(func)),
        }
    }
}

fn empty_value(func: Func) -> Value {
    match func {
        Func::Count => Value::Int(0),
        _ => Value::Null,
    }
}

/// Running state of one aggregate call.
#[derive(Debug, Clone)]
pub(crate) enum Acc {
    Count(i64),
    Sum(Option<Value>),
    Avg { sum: f64, n: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
}

impl Acc {
    pub(super) fn new(func: Func) -> Self {
        match func {
            Func::Sum => Self::Sum(None),
            Func::Avg => Self::Avg { sum: 0.0, n: 0 },
            Func::Min => Self::Min(None),
            Func::Max => Self::Max(None),
            _ => Self::Count(0),
        }
    }

    /// `arg` is `None` for `count()` without arguments.
    pub(super) fn feed(&mut self, arg: Option<Value>) -> CoreResult<()> {
        match (self, arg) {
            (Self::Count(n), None) => *n += 1,
            (_, Some(Value::Null)) => {}
            (Self::Count(n), Some(_)) => *n += 1,
            (Self::Sum(total), Some(v)) => {
                *total = Some(match (total.take(), v) {
                    (None, v) if v.is_numeric() => v,
                    (Some(Value::Int(a)), Value::Int(b)) => Value::Int(
                        a.checked_add(b)
                            .ok_or_else(|| CoreError::eval("integer overflow in sum"))?,
                    ),
                    (Some(a), b) => match (a.as_float(), b.as_float()) {
                        (Some(a), Some(b)) => Value::Float(a + b),
                        _ => return Err(bad_argument("sum", &b)),
                    },
                    (None, v) => return Err(bad_argument("sum", &v)),
                });
            }
            (Self::Avg { sum, n }, Some(v)) => {
                let x = v.as_float().ok_or_else(|| bad_argument("avg", &v))?;
                *sum += x;
                *n += 1;
            }
            (Self::Min(best), Some(v)) => keep(best, v, Ordering::Less),
            (Self::Max(best), Some(v)) => keep(best, v, Ordering::Greater),
            (_, None) => {}
        }
        Ok(())
    }

    pub(super) fn result(&self) -> Value {
        match self {
            Self::Count(n) => Value::Int(*n),
            Self::Sum(v) | Self::Min(v) | Self::Max(v) => v.clone().unwrap_or(Value::Null),
            #[allow(clippy::cast_precision_loss)]
            Self::Avg { sum, n } => {
                if *n == 0 {
                    Value::Null
                } else {
                    Value::Float(*sum / *n as f64)
                }
            }
        }
    }
}

fn keep(best: &mut Option<Value>, v: Value, wanted: Ordering) {
    let replace = best.as_ref().map_or(true, |b| v.collate(b) == wanted);
    if replace {
        *best = Some(v);
    }
}

fn bad_argument(func: &str, v: &Value) -> CoreError {
    CoreError::eval(format!(
        "invalid argument to {func}: value of type {}",
        v.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: Func, values: &[Value]) -> Value {
        let mut acc = Acc::new(func);
        for v in values {
            acc.feed(Some(v.clone())).unwrap();
        }
        acc.result()
    }

    #[test]
    fn count_skips_nulls_only_with_argument() {
        let mut acc = Acc::new(Func::Count);
        acc.feed(None).unwrap();
        acc.feed(None).unwrap();
        assert_eq!(acc.result(), Value::Int(2));
        assert_eq!(
            run(Func::Count, &[Value::Null, Value::Int(1)]),
            Value::Int(1)
        );
    }

    #[test]
    fn sum_promotes_and_ignores_nulls() {
        assert_eq!(
            run(Func::Sum, &[Value::Int(1), Value::Null, Value::Int(2)]),
            Value::Int(3)
        );
        assert_eq!(
            run(Func::Sum, &[Value::Int(1), Value::Float(0.5)]),
            Value::Float(1.5)
        );
        assert_eq!(run(Func::Sum, &[Value::Null]), Value::Null);
    }

    #[test]
    fn sum_rejects_text() {
        let mut acc = Acc::new(Func::Sum);
        assert!(acc.feed(Some(Value::from("x"))).is_err());
    }

    #[test]
    fn avg_min_max() {
        let values = [Value::Int(4), Value::Int(1), Value::Int(7)];
        assert_eq!(run(Func::Avg, &values), Value::Float(4.0));
        assert_eq!(run(Func::Min, &values), Value::Int(1));
        assert_eq!(run(Func::Max, &values), Value::Int(7));
        assert_eq!(run(Func::Avg, &[]), Value::Null);
    }

    #[test]
    fn empty_group_values() {
        assert_eq!(Aggs::Empty.value(Func::Count, 0).unwrap(), Value::Int(0));
        assert_eq!(Aggs::Empty.value(Func::Max, 0).unwrap(), Value::Null);
    }
}
