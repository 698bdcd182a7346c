//! Expression trees and their evaluation.

mod agg;
mod ops;

pub(crate) use agg::{Acc, Aggs};

use crate::error::{CoreError, CoreResult};
use quarry_codec::Value;
use std::collections::HashMap;
use std::fmt;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Id,
    Len,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Func {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "id" => Self::Id,
            "len" => Self::Len,
            "count" => Self::Count,
            "sum" => Self::Sum,
            "avg" => Self::Avg,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Len => "len",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    pub(crate) fn is_aggregate(self) -> bool {
        !matches!(self, Self::Id | Self::Len)
    }

    /// Accepted argument counts.
    pub(crate) fn arity(self) -> std::ops::RangeInclusive<usize> {
        match self {
            Self::Id => 0..=0,
            Self::Count => 0..=1,
            _ => 1..=1,
        }
    }
}

/// A compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Value(Value),
    /// Positional parameter, 1-based.
    Param(usize),
    /// Column reference, possibly qualified (`q.c`).
    Ident(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    /// Function call. `slot` numbers aggregate calls within one field list.
    Call {
        func: Func,
        args: Vec<Expr>,
        slot: usize,
    },
}

impl Expr {
    pub(crate) fn has_aggregate(&self) -> bool {
        match self {
            Self::Value(_) | Self::Param(_) | Self::Ident(_) => false,
            Self::Unary(_, e) | Self::IsNull { expr: e, .. } => e.has_aggregate(),
            Self::Binary(_, l, r) => l.has_aggregate() || r.has_aggregate(),
            Self::Call { func, args, .. } => {
                func.is_aggregate() || args.iter().any(Expr::has_aggregate)
            }
        }
    }

    /// Highest parameter number referenced.
    pub(crate) fn max_param(&self) -> usize {
        match self {
            Self::Param(n) => *n,
            Self::Value(_) | Self::Ident(_) => 0,
            Self::Unary(_, e) | Self::IsNull { expr: e, .. } => e.max_param(),
            Self::Binary(_, l, r) => l.max_param().max(r.max_param()),
            Self::Call { args, .. } => args.iter().map(Expr::max_param).max().unwrap_or(0),
        }
    }

    /// Evaluates the expression against one row.
    pub(crate) fn eval(&self, env: &Env<'_>) -> CoreResult<Value> {
        match self {
            Self::Value(v) => Ok(v.clone()),
            Self::Param(n) => n
                .checked_sub(1)
                .and_then(|i| env.args.get(i))
                .cloned()
                .ok_or_else(|| CoreError::eval(format!("missing argument ${n}"))),
            Self::Ident(name) => {
                let index = env
                    .scope
                    .resolve(name)
                    .ok_or_else(|| CoreError::unknown_field(name.clone()))?;
                Ok(env.row.get(index).cloned().unwrap_or(Value::Null))
            }
            Self::Unary(op, e) => ops::unary(*op, e.eval(env)?),
            Self::Binary(BinaryOp::And, l, r) => {
                let l = ops::logical_operand(BinaryOp::And, l.eval(env)?)?;
                if l == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let r = ops::logical_operand(BinaryOp::And, r.eval(env)?)?;
                Ok(match (l, r) {
                    (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            Self::Binary(BinaryOp::Or, l, r) => {
                let l = ops::logical_operand(BinaryOp::Or, l.eval(env)?)?;
                if l == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let r = ops::logical_operand(BinaryOp::Or, r.eval(env)?)?;
                Ok(match (l, r) {
                    (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            Self::Binary(op, l, r) => ops::binary(*op, l.eval(env)?, r.eval(env)?),
            Self::IsNull { expr, negated } => Ok(Value::Bool(expr.eval(env)?.is_null() != *negated)),
            Self::Call { func, args, slot } => match func {
                Func::Id => Ok(env.id.map_or(Value::Null, Value::Int)),
                Func::Len => ops::len(args[0].eval(env)?),
                _ => env.aggs.value(*func, *slot),
            },
        }
    }

    /// Feeds the aggregate calls of this expression with one member row.
    pub(crate) fn accumulate(&self, env: &Env<'_>, accs: &mut Vec<Option<Acc>>) -> CoreResult<()> {
        match self {
            Self::Value(_) | Self::Param(_) | Self::Ident(_) => Ok(()),
            Self::Unary(_, e) | Self::IsNull { expr: e, .. } => e.accumulate(env, accs),
            Self::Binary(_, l, r) => {
                l.accumulate(env, accs)?;
                r.accumulate(env, accs)
            }
            Self::Call { func, args, slot } if func.is_aggregate() => {
                let arg = match args.first() {
                    Some(arg) => Some(arg.eval(env)?),
                    None => None,
                };
                if accs.len() <= *slot {
                    accs.resize_with(*slot + 1, || None);
                }
                accs[*slot]
                    .get_or_insert_with(|| Acc::new(*func))
                    .feed(arg)
            }
            Self::Call { args, .. } => args.iter().try_for_each(|a| a.accumulate(env, accs)),
        }
    }
}

fn fmt_operand(f: &mut fmt::Formatter<'_>, e: &Expr) -> fmt::Result {
    match e {
        Expr::Binary(..) => write!(f, "({e})"),
        _ => write!(f, "{e}"),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(Value::Text(s)) => write!(f, "{s:?}"),
            Self::Value(v) => write!(f, "{v}"),
            Self::Param(n) => write!(f, "${n}"),
            Self::Ident(name) => f.write_str(name),
            Self::Unary(UnaryOp::Not, e) => {
                f.write_str("!")?;
                fmt_operand(f, e)
            }
            Self::Unary(UnaryOp::Neg, e) => {
                f.write_str("-")?;
                fmt_operand(f, e)
            }
            Self::Binary(op, l, r) => {
                fmt_operand(f, l)?;
                write!(f, " {} ", op.symbol())?;
                fmt_operand(f, r)
            }
            Self::IsNull { expr, negated } => {
                fmt_operand(f, expr)?;
                f.write_str(if *negated { " IS NOT NULL" } else { " IS NULL" })
            }
            Self::Call { func, args, .. } => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Maps field names of a row header to positions.
///
/// Besides the exact names, an unqualified name resolves to a qualified
/// field `q.name` when exactly one such field exists. A qualified name
/// resolves to its unqualified part when the header carries no qualified
/// names at all (a single table source).
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    names: HashMap<String, usize>,
    aliases: HashMap<String, Option<usize>>,
    qualified: bool,
}

impl Scope {
    pub(crate) fn new(fields: &[String]) -> Self {
        let mut scope = Self::default();
        for (i, name) in fields.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            scope.names.entry(name.clone()).or_insert(i);
            if let Some((_, column)) = name.rsplit_once('.') {
                scope.qualified = true;
                scope
                    .aliases
                    .entry(column.to_string())
                    .and_modify(|slot| *slot = None)
                    .or_insert(Some(i));
            }
        }
        scope
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<usize> {
        if let Some(&i) = self.names.get(name) {
            return Some(i);
        }
        if let Some(&alias) = self.aliases.get(name) {
            return alias;
        }
        match name.rsplit_once('.') {
            Some((_, column)) if !self.qualified => self.names.get(column).copied(),
            _ => None,
        }
    }
}

/// Evaluation environment of one row.
pub(crate) struct Env<'a> {
    pub scope: &'a Scope,
    pub row: &'a [Value],
    pub id: Option<i64>,
    pub args: &'a [Value],
    pub aggs: Aggs<'a>,
}

impl<'a> Env<'a> {
    /// Environment without any row, for constant expressions.
    pub(crate) fn constant(scope: &'a Scope, args: &'a [Value]) -> Self {
        Self {
            scope,
            row: &[],
            id: None,
            args,
            aggs: Aggs::Off,
        }
    }

    pub(crate) fn row(scope: &'a Scope, row: &'a [Value], id: Option<i64>, args: &'a [Value]) -> Self {
        Self {
            scope,
            row,
            id,
            args,
            aggs: Aggs::Off,
        }
    }
}

/// Evaluates a filter predicate. `NULL` counts as `false`.
pub(crate) fn eval_predicate(expr: &Expr, env: &Env<'_>) -> CoreResult<bool> {
    match expr.eval(env)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(CoreError::eval(format!(
            "invalid WHERE expression {expr} (value of type {})",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.into()))
    }

    fn lit(v: impl Into<Value>) -> Box<Expr> {
        Box::new(Expr::Value(v.into()))
    }

    fn eval_row(expr: &Expr, fields: &[&str], row: &[Value]) -> CoreResult<Value> {
        let fields: Vec<String> = fields.iter().map(|s| s.to_string()).collect();
        let scope = Scope::new(&fields);
        expr.eval(&Env::row(&scope, row, Some(7), &[]))
    }

    #[test]
    fn scope_resolves_unique_aliases() {
        let fields = vec!["a.x".to_string(), "b.x".to_string(), "b.y".to_string()];
        let scope = Scope::new(&fields);
        assert_eq!(scope.resolve("a.x"), Some(0));
        assert_eq!(scope.resolve("y"), Some(2));
        assert_eq!(scope.resolve("x"), None);
        assert_eq!(scope.resolve("c.y"), None);
    }

    #[test]
    fn scope_strips_qualifier_for_plain_headers() {
        let fields = vec!["x".to_string(), String::new()];
        let scope = Scope::new(&fields);
        assert_eq!(scope.resolve("t.x"), Some(0));
        assert_eq!(scope.resolve(""), None);
    }

    #[test]
    fn three_valued_logic() {
        let and = Expr::Binary(BinaryOp::And, lit(Value::Null), lit(false));
        assert_eq!(eval_row(&and, &[], &[]).unwrap(), Value::Bool(false));
        let and = Expr::Binary(BinaryOp::And, lit(Value::Null), lit(true));
        assert_eq!(eval_row(&and, &[], &[]).unwrap(), Value::Null);
        let or = Expr::Binary(BinaryOp::Or, lit(Value::Null), lit(true));
        assert_eq!(eval_row(&or, &[], &[]).unwrap(), Value::Bool(true));
        let or = Expr::Binary(BinaryOp::Or, lit(false), lit(Value::Null));
        assert_eq!(eval_row(&or, &[], &[]).unwrap(), Value::Null);
    }

    #[test]
    fn identifiers_and_id() {
        let e = Expr::Binary(BinaryOp::Add, ident("a"), ident("b"));
        let v = eval_row(&e, &["a", "b"], &[Value::Int(2), Value::Float(0.5)]).unwrap();
        assert_eq!(v, Value::Float(2.5));

        let id = Expr::Call {
            func: Func::Id,
            args: vec![],
            slot: 0,
        };
        assert_eq!(eval_row(&id, &[], &[]).unwrap(), Value::Int(7));

        let err = eval_row(&Expr::Ident("zz".into()), &["a"], &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "unknown field zz");
    }

    #[test]
    fn aggregate_outside_select_is_misuse() {
        let e = Expr::Call {
            func: Func::Count,
            args: vec![],
            slot: 0,
        };
        let err = eval_row(&e, &[], &[]).unwrap_err();
        assert_eq!(err.to_string(), "misuse of aggregate function count");
    }

    #[test]
    fn predicate_rejects_non_bool() {
        let e = Expr::Binary(BinaryOp::Add, ident("a"), lit(1i64));
        let fields = vec!["a".to_string()];
        let scope = Scope::new(&fields);
        let row = [Value::Int(1)];
        let err = eval_predicate(&e, &Env::row(&scope, &row, None, &[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid WHERE expression a + 1 (value of type int64)"
        );
    }

    #[test]
    fn predicate_skips_null() {
        let scope = Scope::default();
        let env = Env::constant(&scope, &[]);
        assert!(!eval_predicate(&Expr::Value(Value::Null), &env).unwrap());
    }

    #[test]
    fn display_parenthesizes_nested_binaries() {
        let e = Expr::Binary(
            BinaryOp::Mul,
            Box::new(Expr::Binary(BinaryOp::Add, ident("a"), lit(1i64))),
            Box::new(Expr::Param(2)),
        );
        assert_eq!(e.to_string(), "(a + 1) * $2");
        let s = Expr::Value(Value::Text("x".into()));
        assert_eq!(s.to_string(), "\"x\"");
    }

    #[test]
    fn missing_parameter() {
        let scope = Scope::default();
        let err = Expr::Param(3).eval(&Env::constant(&scope, &[])).unwrap_err();
        assert_eq!(err.to_string(), "missing argument $3");
    }
}
