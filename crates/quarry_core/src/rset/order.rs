use super::{ExecCtx, Item, Rset, Sink};
use crate::error::{CoreError, CoreResult};
use crate::expr::{Env, Expr, Scope};
use quarry_codec::Value;

/// Sorts its source by a list of expressions.
///
/// The temp key is the ORDER BY values followed by a sequence number, so
/// equal keys stay distinct and every pair of rows is ordered.
#[derive(Debug)]
pub(crate) struct OrderByRset {
    pub source: Box<dyn Rset>,
    pub by: Vec<Expr>,
    pub ascending: bool,
}

impl Rset for OrderByRset {
    fn run(&self, ctx: &ExecCtx<'_>, sink: &mut Sink<'_>) -> CoreResult<()> {
        let mut temp = ctx.store().create_temp(self.ascending)?;
        let mut header = Vec::new();
        let mut scope = Scope::default();
        let mut seq: i64 = 0;

        self.source.run(ctx, &mut |item| {
            match item {
                Item::Header(names) => {
                    scope = Scope::new(&names);
                    header = names;
                }
                Item::Row { id, values } => {
                    let env = Env::row(&scope, &values, id, ctx.args);
                    let mut key = Vec::with_capacity(self.by.len() + 1);
                    for expr in &self.by {
                        let v = expr.eval(&env)?;
                        if !v.is_ordered() {
                            return Err(CoreError::eval(format!(
                                "cannot order by {expr} (type {})",
                                v.type_name()
                            )));
                        }
                        key.push(v);
                    }
                    seq += 1;
                    key.push(Value::Int(seq));
                    temp.set(key, values)?;
                }
            }
            Ok(true)
        })?;

        if !sink(Item::Header(header))? {
            return Ok(());
        }
        for entry in temp.seek_first()? {
            let (_, values) = entry?;
            if !sink(Item::Row { id: None, values })? {
                break;
            }
        }
        Ok(())
    }
}
