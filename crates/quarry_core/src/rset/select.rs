use super::group::Group;
use super::{ExecCtx, GroupByRset, Item, Rset, Sink};
use crate::error::CoreResult;
use crate::expr::{Acc, Aggs, Env, Expr, Scope};
use quarry_codec::Value;
use std::cell::RefCell;

/// One output field of a projection.
#[derive(Debug, Clone)]
pub(crate) struct Fld {
    pub expr: Expr,
    /// Output name: the alias, else the identifier text, else empty.
    pub name: String,
}

impl Fld {
    pub(crate) fn new(expr: Expr, alias: Option<String>) -> Self {
        let name = alias.unwrap_or_else(|| match &expr {
            Expr::Ident(name) => name.clone(),
            _ => String::new(),
        });
        Self { expr, name }
    }
}

/// Input of a projection.
#[derive(Debug)]
pub(crate) enum SelectSource {
    /// Aggregating projection: one output row per group.
    Group(GroupByRset),
    /// Row-by-row projection.
    Plain(Box<dyn Rset>),
}

/// Evaluates the field list against its source.
///
/// An empty field list (`SELECT *`) passes rows through unchanged on the
/// plain path and keeps the group's last row on the aggregate path.
#[derive(Debug)]
pub(crate) struct SelectRset {
    pub source: SelectSource,
    pub fields: Vec<Fld>,
}

impl SelectRset {
    fn run_plain(&self, source: &dyn Rset, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        if self.fields.is_empty() {
            return source.run(ctx, sink);
        }
        let mut scope = Scope::default();
        source.run(ctx, &mut |item| match item {
            Item::Header(names) => {
                scope = Scope::new(&names);
                sink(Item::Header(self.fields.iter().map(|f| f.name.clone()).collect()))
            }
            Item::Row { id, values } => {
                let env = Env::row(&scope, &values, id, ctx.args);
                let out = self
                    .fields
                    .iter()
                    .map(|f| f.expr.eval(&env))
                    .collect::<CoreResult<Vec<_>>>()?;
                sink(Item::Row { id: None, values: out })
            }
        })
    }

    fn run_grouped(&self, group_by: &GroupByRset, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        // Header state is set by the first callback and read by the second.
        let state = RefCell::new((Scope::default(), 0usize, Vec::<Fld>::new()));
        let sink = RefCell::new(sink);
        let emit = |item: Item| -> CoreResult<bool> {
            let mut sink = sink.borrow_mut();
            (*sink)(item)
        };

        group_by.run_groups(
            ctx,
            |names| {
                let mut st = state.borrow_mut();
                st.0 = Scope::new(&names);
                st.1 = names.len();
                let header = if self.fields.is_empty() {
                    st.2 = names
                        .iter()
                        .map(|n| Fld::new(Expr::Ident(n.clone()), None))
                        .collect();
                    names
                } else {
                    self.fields.iter().map(|f| f.name.clone()).collect()
                };
                emit(Item::Header(header))
            },
            |group| {
                let st = state.borrow();
                let (scope, width, synthesized) = &*st;
                let fields = if self.fields.is_empty() {
                    synthesized.as_slice()
                } else {
                    self.fields.as_slice()
                };
                let values = match group {
                    Group::Members(members) => {
                        let mut accs: Vec<Option<Acc>> = Vec::new();
                        let mut last = Vec::new();
                        members.for_each(|row| {
                            let env = Env::row(scope, row, None, ctx.args);
                            for f in fields {
                                f.expr.accumulate(&env, &mut accs)?;
                            }
                            last = row.to_vec();
                            Ok(())
                        })?;
                        let env = Env {
                            aggs: Aggs::Final(&accs),
                            ..Env::row(scope, &last, None, ctx.args)
                        };
                        eval_all(fields, &env)?
                    }
                    Group::Empty => {
                        let nulls = vec![Value::Null; *width];
                        let env = Env {
                            aggs: Aggs::Empty,
                            ..Env::row(scope, &nulls, None, ctx.args)
                        };
                        eval_all(fields, &env)?
                    }
                };
                emit(Item::Row { id: None, values })
            },
        )
    }
}

fn eval_all(fields: &[Fld], env: &Env<'_>) -> CoreResult<Vec<Value>> {
    fields.iter().map(|f| f.expr.eval(env)).collect()
}

impl Rset for SelectRset {
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        match &self.source {
            SelectSource::Plain(source) => self.run_plain(&**source, ctx, sink),
            SelectSource::Group(group_by) => self.run_grouped(group_by, ctx, sink),
        }
    }
}
