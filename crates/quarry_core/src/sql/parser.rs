//! Recursive-descent parser producing statements and query plans.

use super::lexer::{tokenize, Tok, Token};
use crate::error::{CoreError, CoreResult};
use crate::expr::{BinaryOp, Expr, Func, UnaryOp};
use crate::rset::{
    CrossJoinRset, DistinctRset, Fld, GroupByRset, JoinSource, LimitRset, OffsetRset,
    OrderByRset, Rset, SelectRset, SelectSource, TableRset, WhereRset,
};
use crate::stmt::{InsertSource, Stmt};
use quarry_codec::{ColumnType, Value};
use std::sync::Arc;

const RESERVED: &[&str] = &[
    "ADD", "ALTER", "AND", "AS", "ASC", "BEGIN", "BY", "COLUMN", "COMMIT", "CREATE", "DELETE",
    "DESC", "DISTINCT", "DROP", "EXISTS", "FALSE", "FROM", "GROUP", "IF", "INSERT", "INTO", "IS",
    "LIMIT", "NOT", "NULL", "OFFSET", "OR", "ORDER", "ROLLBACK", "SELECT", "SET", "TABLE",
    "TRANSACTION", "TRUE", "TRUNCATE", "UPDATE", "VALUES", "WHERE",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|k| k.eq_ignore_ascii_case(word))
}

pub(super) struct Parser {
    toks: Vec<Token>,
    pos: usize,
    /// Highest parameter number seen.
    pub params: usize,
    /// Next aggregate slot within the field list being parsed.
    slot: usize,
}

impl Parser {
    pub(super) fn new(src: &str) -> CoreResult<Self> {
        Ok(Self {
            toks: tokenize(src)?,
            pos: 0,
            params: 0,
            slot: 0,
        })
    }

    fn peek(&self) -> &Tok {
        &self.toks[self.pos.min(self.toks.len() - 1)].tok
    }

    fn peek_at(&self, ahead: usize) -> &Tok {
        &self.toks[(self.pos + ahead).min(self.toks.len() - 1)].tok
    }

    fn offset(&self) -> usize {
        self.toks[self.pos.min(self.toks.len() - 1)].offset
    }

    fn bump(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, expected: &str) -> CoreError {
        let found = match self.peek() {
            Tok::Word(w) => w.clone(),
            Tok::Int(n) => n.to_string(),
            Tok::Float(x) => x.to_string(),
            Tok::Str(s) => format!("{s:?}"),
            Tok::Param(n) => format!("${n}"),
            Tok::Sym(s) => (*s).to_string(),
            Tok::Eof => "end of input".to_string(),
        };
        CoreError::syntax(self.offset(), format!("expected {expected}, found {found}"))
    }

    pub(super) fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Word(w) if w.eq_ignore_ascii_case(kw))
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        let hit = self.is_kw(kw);
        if hit {
            self.bump();
        }
        hit
    }

    fn expect_kw(&mut self, kw: &str) -> CoreResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(kw))
        }
    }

    fn is_sym(&self, sym: &str) -> bool {
        matches!(self.peek(), Tok::Sym(s) if *s == sym)
    }

    pub(super) fn eat_sym(&mut self, sym: &str) -> bool {
        let hit = self.is_sym(sym);
        if hit {
            self.bump();
        }
        hit
    }

    pub(super) fn expect_sym(&mut self, sym: &str) -> CoreResult<()> {
        if self.eat_sym(sym) {
            Ok(())
        } else {
            Err(self.error(&format!("'{sym}'")))
        }
    }

    fn ident(&mut self) -> CoreResult<String> {
        match self.peek() {
            Tok::Word(w) if !is_reserved(w) => {
                let w = w.clone();
                self.bump();
                Ok(w)
            }
            _ => Err(self.error("identifier")),
        }
    }

    /// `name` or `q.name`.
    fn qualified_ident(&mut self) -> CoreResult<String> {
        let first = self.ident()?;
        if self.eat_sym(".") {
            let second = self.ident()?;
            return Ok(format!("{first}.{second}"));
        }
        Ok(first)
    }

    fn comma_list<T>(&mut self, mut item: impl FnMut(&mut Self) -> CoreResult<T>) -> CoreResult<Vec<T>> {
        let mut items = vec![item(self)?];
        while self.eat_sym(",") {
            items.push(item(self)?);
        }
        Ok(items)
    }

    fn column_type(&mut self) -> CoreResult<ColumnType> {
        let offset = self.offset();
        match self.bump() {
            Tok::Word(w) => ColumnType::parse(&w).map_err(|e| CoreError::syntax(offset, e.to_string())),
            _ => Err(CoreError::syntax(offset, "expected column type")),
        }
    }

    // statements

    pub(super) fn statement(&mut self) -> CoreResult<Stmt> {
        let Tok::Word(word) = self.peek() else {
            return Err(self.error("statement"));
        };
        match word.to_ascii_uppercase().as_str() {
            "BEGIN" => {
                self.bump();
                self.expect_kw("TRANSACTION")?;
                Ok(Stmt::Begin)
            }
            "COMMIT" => {
                self.bump();
                Ok(Stmt::Commit)
            }
            "ROLLBACK" => {
                self.bump();
                Ok(Stmt::Rollback)
            }
            "CREATE" => self.create_table(),
            "DROP" => self.drop_table(),
            "ALTER" => self.alter_table(),
            "TRUNCATE" => {
                self.bump();
                self.expect_kw("TABLE")?;
                Ok(Stmt::Truncate { table: self.ident()? })
            }
            "INSERT" => self.insert(),
            "UPDATE" => self.update(),
            "DELETE" => self.delete(),
            "SELECT" => Ok(Stmt::Select(Arc::from(self.select()?))),
            _ => Err(self.error("statement")),
        }
    }

    fn create_table(&mut self) -> CoreResult<Stmt> {
        self.expect_kw("CREATE")?;
        self.expect_kw("TABLE")?;
        let if_not_exists = if self.eat_kw("IF") {
            self.expect_kw("NOT")?;
            self.expect_kw("EXISTS")?;
            true
        } else {
            false
        };
        let name = self.ident()?;
        self.expect_sym("(")?;
        let columns = self.comma_list(|p| Ok((p.ident()?, p.column_type()?)))?;
        self.expect_sym(")")?;
        Ok(Stmt::CreateTable {
            name,
            if_not_exists,
            columns,
        })
    }

    fn drop_table(&mut self) -> CoreResult<Stmt> {
        self.expect_kw("DROP")?;
        self.expect_kw("TABLE")?;
        let if_exists = if self.eat_kw("IF") {
            self.expect_kw("EXISTS")?;
            true
        } else {
            false
        };
        Ok(Stmt::DropTable {
            name: self.ident()?,
            if_exists,
        })
    }

    fn alter_table(&mut self) -> CoreResult<Stmt> {
        self.expect_kw("ALTER")?;
        self.expect_kw("TABLE")?;
        let table = self.ident()?;
        if self.eat_kw("ADD") {
            self.eat_kw("COLUMN");
            let column = self.ident()?;
            let ty = self.column_type()?;
            return Ok(Stmt::AlterAdd { table, column, ty });
        }
        if self.eat_kw("DROP") {
            self.eat_kw("COLUMN");
            let column = self.ident()?;
            return Ok(Stmt::AlterDrop { table, column });
        }
        Err(self.error("ADD or DROP"))
    }

    fn insert(&mut self) -> CoreResult<Stmt> {
        self.expect_kw("INSERT")?;
        self.expect_kw("INTO")?;
        let table = self.ident()?;
        let columns = if self.eat_sym("(") {
            let columns = self.comma_list(Self::ident)?;
            self.expect_sym(")")?;
            columns
        } else {
            Vec::new()
        };
        let source = if self.eat_kw("VALUES") {
            InsertSource::Values(self.comma_list(|p| {
                p.expect_sym("(")?;
                let row = p.comma_list(Self::expr)?;
                p.expect_sym(")")?;
                Ok(row)
            })?)
        } else if self.is_kw("SELECT") {
            InsertSource::Select(Arc::from(self.select()?))
        } else {
            return Err(self.error("VALUES or SELECT"));
        };
        Ok(Stmt::Insert {
            table,
            columns,
            source,
        })
    }

    fn update(&mut self) -> CoreResult<Stmt> {
        self.expect_kw("UPDATE")?;
        let table = self.ident()?;
        self.expect_kw("SET")?;
        let assignments = self.comma_list(|p| {
            let column = p.ident()?;
            if !p.eat_sym("=") {
                p.expect_sym("==")?;
            }
            Ok((column, p.expr()?))
        })?;
        let filter = self.where_clause()?;
        Ok(Stmt::Update {
            table,
            assignments,
            filter,
        })
    }

    fn delete(&mut self) -> CoreResult<Stmt> {
        self.expect_kw("DELETE")?;
        self.expect_kw("FROM")?;
        let table = self.ident()?;
        let filter = self.where_clause()?;
        Ok(Stmt::Delete { table, filter })
    }

    fn where_clause(&mut self) -> CoreResult<Option<Expr>> {
        if self.eat_kw("WHERE") {
            Ok(Some(self.expr()?))
        } else {
            Ok(None)
        }
    }

    // queries

    /// Parses a SELECT and builds its plan:
    /// sources, filter, projection (grouped or plain), distinct, order,
    /// offset, limit.
    fn select(&mut self) -> CoreResult<Box<dyn Rset>> {
        self.expect_kw("SELECT")?;
        let distinct = self.eat_kw("DISTINCT");
        let fields = if self.eat_sym("*") {
            Vec::new()
        } else {
            self.slot = 0;
            self.comma_list(|p| {
                let expr = p.expr()?;
                let alias = if p.eat_kw("AS") { Some(p.ident()?) } else { None };
                Ok(Fld::new(expr, alias))
            })?
        };
        self.expect_kw("FROM")?;
        let mut plan = self.sources()?;

        if let Some(expr) = self.where_clause()? {
            plan = Box::new(WhereRset { source: plan, expr });
        }

        let group = if self.eat_kw("GROUP") {
            self.expect_kw("BY")?;
            Some(self.comma_list(Self::qualified_ident)?)
        } else {
            None
        };
        let aggregate = group.is_some() || fields.iter().any(|f| f.expr.has_aggregate());
        let source = if aggregate {
            SelectSource::Group(GroupByRset {
                source: plan,
                columns: group.unwrap_or_default(),
            })
        } else {
            SelectSource::Plain(plan)
        };
        plan = Box::new(SelectRset { source, fields });

        if distinct {
            plan = Box::new(DistinctRset { source: plan });
        }

        if self.eat_kw("ORDER") {
            self.expect_kw("BY")?;
            let by = self.comma_list(Self::expr)?;
            let ascending = if self.eat_kw("DESC") {
                false
            } else {
                self.eat_kw("ASC");
                true
            };
            plan = Box::new(OrderByRset {
                source: plan,
                by,
                ascending,
            });
        }

        let mut limit = None;
        let mut offset = None;
        loop {
            if limit.is_none() && self.eat_kw("LIMIT") {
                limit = Some(self.expr()?);
            } else if offset.is_none() && self.eat_kw("OFFSET") {
                offset = Some(self.expr()?);
            } else {
                break;
            }
        }
        if let Some(n) = offset {
            plan = Box::new(OffsetRset { source: plan, n });
        }
        if let Some(n) = limit {
            plan = Box::new(LimitRset { source: plan, n });
        }
        Ok(plan)
    }

    fn sources(&mut self) -> CoreResult<Box<dyn Rset>> {
        let mut sources = self.comma_list(Self::source)?;
        if sources.len() == 1 {
            if let Some(only) = sources.pop() {
                return Ok(only.rset);
            }
        }
        Ok(Box::new(CrossJoinRset { sources }))
    }

    fn source(&mut self) -> CoreResult<JoinSource> {
        let (rset, name): (Box<dyn Rset>, String) = if self.eat_sym("(") {
            let rset = self.select()?;
            self.expect_sym(")")?;
            (rset, String::new())
        } else {
            let table = self.ident()?;
            (Box::new(TableRset::new(table.clone())), table)
        };
        let alias = if self.eat_kw("AS") {
            Some(self.ident()?)
        } else if matches!(self.peek(), Tok::Word(w) if !is_reserved(w)) {
            Some(self.ident()?)
        } else {
            None
        };
        Ok(JoinSource {
            rset,
            qualifier: alias.unwrap_or(name),
        })
    }

    // expressions

    pub(super) fn expr(&mut self) -> CoreResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_sym("||") || self.eat_kw("OR") {
            let right = self.and_expr()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> CoreResult<Expr> {
        let mut left = self.comparison()?;
        while self.eat_sym("&&") || self.eat_kw("AND") {
            let right = self.comparison()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> CoreResult<Expr> {
        let left = self.additive()?;
        if self.eat_kw("IS") {
            let negated = self.eat_kw("NOT");
            self.expect_kw("NULL")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }
        let op = match self.peek() {
            Tok::Sym("==" | "=") => BinaryOp::Eq,
            Tok::Sym("!=" | "<>") => BinaryOp::Ne,
            Tok::Sym("<") => BinaryOp::Lt,
            Tok::Sym("<=") => BinaryOp::Le,
            Tok::Sym(">") => BinaryOp::Gt,
            Tok::Sym(">=") => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.bump();
        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> CoreResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Sym("+") => BinaryOp::Add,
                Tok::Sym("-") => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> CoreResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Sym("*") => BinaryOp::Mul,
                Tok::Sym("/") => BinaryOp::Div,
                Tok::Sym("%") => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> CoreResult<Expr> {
        if self.eat_sym("-") {
            return Ok(match self.unary()? {
                Expr::Value(Value::Int(n)) if n != i64::MIN => Expr::Value(Value::Int(-n)),
                Expr::Value(Value::Float(x)) => Expr::Value(Value::Float(-x)),
                e => Expr::Unary(UnaryOp::Neg, Box::new(e)),
            });
        }
        if self.eat_sym("!") || self.eat_kw("NOT") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> CoreResult<Expr> {
        let offset = self.offset();
        match self.peek().clone() {
            Tok::Int(n) => {
                self.bump();
                Ok(Expr::Value(Value::Int(n)))
            }
            Tok::Float(x) => {
                self.bump();
                Ok(Expr::Value(Value::Float(x)))
            }
            Tok::Str(s) => {
                self.bump();
                Ok(Expr::Value(Value::Text(s)))
            }
            Tok::Param(n) => {
                self.bump();
                self.params = self.params.max(n);
                Ok(Expr::Param(n))
            }
            Tok::Sym("(") => {
                self.bump();
                let e = self.expr()?;
                self.expect_sym(")")?;
                Ok(e)
            }
            Tok::Word(w) if w.eq_ignore_ascii_case("NULL") => {
                self.bump();
                Ok(Expr::Value(Value::Null))
            }
            Tok::Word(w) if w.eq_ignore_ascii_case("TRUE") => {
                self.bump();
                Ok(Expr::Value(Value::Bool(true)))
            }
            Tok::Word(w) if w.eq_ignore_ascii_case("FALSE") => {
                self.bump();
                Ok(Expr::Value(Value::Bool(false)))
            }
            Tok::Word(w) if !is_reserved(&w) && matches!(self.peek_at(1), Tok::Sym("(")) => {
                self.bump();
                self.bump();
                self.call(&w, offset)
            }
            Tok::Word(_) => Ok(Expr::Ident(self.qualified_ident()?)),
            _ => Err(self.error("expression")),
        }
    }

    /// Parses the arguments of `name(`; the opening parenthesis is consumed.
    fn call(&mut self, name: &str, offset: usize) -> CoreResult<Expr> {
        let func = Func::lookup(name)
            .ok_or_else(|| CoreError::syntax(offset, format!("unknown function {name}")))?;
        let args = if self.eat_sym(")") {
            Vec::new()
        } else if func == Func::Count && self.is_sym("*") && matches!(self.peek_at(1), Tok::Sym(")")) {
            self.bump();
            self.bump();
            Vec::new()
        } else {
            let args = self.comma_list(Self::expr)?;
            self.expect_sym(")")?;
            args
        };
        if !func.arity().contains(&args.len()) {
            return Err(CoreError::syntax(
                offset,
                format!("wrong number of arguments to {}: {}", func.name(), args.len()),
            ));
        }
        let slot = if func.is_aggregate() {
            self.slot += 1;
            self.slot - 1
        } else {
            0
        };
        Ok(Expr::Call { func, args, slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Expr {
        let mut p = Parser::new(src).unwrap();
        let e = p.expr().unwrap();
        assert!(p.at_eof(), "trailing input in {src}");
        e
    }

    #[test]
    fn precedence() {
        assert_eq!(expr("1 + 2 * 3").to_string(), "1 + (2 * 3)");
        assert_eq!(expr("a || b && c").to_string(), "a || (b && c)");
        assert_eq!(expr("a = 1 OR NOT b").to_string(), "(a == 1) || !b");
        assert_eq!(expr("(1 + 2) * 3").to_string(), "(1 + 2) * 3");
        assert_eq!(expr("x IS NOT NULL").to_string(), "x IS NOT NULL");
    }

    #[test]
    fn negative_literals_fold() {
        assert_eq!(expr("-5"), Expr::Value(Value::Int(-5)));
        assert_eq!(expr("-a").to_string(), "-a");
    }

    #[test]
    fn qualified_idents_and_params() {
        let mut p = Parser::new("t.a + $3").unwrap();
        assert_eq!(p.expr().unwrap().to_string(), "t.a + $3");
        assert_eq!(p.params, 3);
    }

    #[test]
    fn aggregate_slots_number_the_field_list() {
        let mut p = Parser::new("count(*), sum(a) + max(b), len(c)").unwrap();
        p.slot = 0;
        let fields = p.comma_list(Parser::expr).unwrap();
        let slots: Vec<usize> = fields
            .iter()
            .flat_map(|e| {
                let mut out = Vec::new();
                collect_slots(e, &mut out);
                out
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    fn collect_slots(e: &Expr, out: &mut Vec<usize>) {
        match e {
            Expr::Call { func, args, slot } => {
                if func.is_aggregate() {
                    out.push(*slot);
                }
                args.iter().for_each(|a| collect_slots(a, out));
            }
            Expr::Binary(_, l, r) => {
                collect_slots(l, out);
                collect_slots(r, out);
            }
            Expr::Unary(_, e) | Expr::IsNull { expr: e, .. } => collect_slots(e, out),
            _ => {}
        }
    }

    #[test]
    fn call_errors() {
        let mut p = Parser::new("nope(1)").unwrap();
        assert_eq!(
            p.expr().unwrap_err().to_string(),
            "syntax error at offset 0: unknown function nope"
        );
        let mut p = Parser::new("len()").unwrap();
        assert_eq!(
            p.expr().unwrap_err().to_string(),
            "syntax error at offset 0: wrong number of arguments to len: 0"
        );
    }

    #[test]
    fn reserved_words_are_not_identifiers() {
        let mut p = Parser::new("FROM").unwrap();
        assert_eq!(
            p.expr().unwrap_err().to_string(),
            "syntax error at offset 0: expected identifier, found FROM"
        );
    }
}
