use super::{ExecCtx, Item, Rset, Sink};
use crate::error::CoreResult;
use crate::expr::{eval_predicate, Env, Expr, Scope};

/// Keeps the rows for which the predicate is `true`.
#[derive(Debug)]
pub(crate) struct WhereRset {
    pub source: Box<dyn Rset>,
    pub expr: Expr,
}

impl Rset for WhereRset {
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        let mut scope = Scope::default();
        self.source.run(ctx, &mut |item| match item {
            Item::Header(names) => {
                scope = Scope::new(&names);
                sink(Item::Header(names))
            }
            Item::Row { id, values } => {
                let env = Env::row(&scope, &values, id, ctx.args);
                if eval_predicate(&self.expr, &env)? {
                    sink(Item::Row { id, values })
                } else {
                    Ok(true)
                }
            }
        })
    }
}
