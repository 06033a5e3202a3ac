//! SQL subset understood by the simulated cluster
//!
//! Covers the statements the harness itself issues plus the trivial
//! statements common in statement-list files:
//!
//! ```text
//! select <literal>[, <literal>...]
//! select count(*) from T [where col = v]
//! select * | c1[, c2...] from T [where col = v] [limit n] [for update]
//! insert into T [(cols)] values (v, ...)[, (v, ...)...]
//! update T set col = v[, col = v...] where col = v
//! create table [if not exists] T (col type [primary key] [unique], ..., primary key (c), unique key name (c))
//! drop table [if exists] T
//! begin | start transaction | commit | rollback | set ... | use ...
//! ```
//!
//! Comments (`/* */`, `-- `, `#`) are ignored. Identifiers are case-insensitive.

use sct_core::codes::{ER_EMPTY_QUERY, ER_PARSE_ERROR};
use sct_core::QueryError;

/// A cell value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cell {
    /// SQL NULL
    Null,
    /// Unsigned integer
    Int(u64),
    /// Anything else, kept as text
    Text(String),
}

impl Cell {
    /// Textual form handed back in result rows.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Int(v) => Some(v.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

/// `where column = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Column compared
    pub column: String,
    /// Value it must equal
    pub value: Cell,
}

/// Selected columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `*`
    All,
    /// Named columns in order
    Columns(Vec<String>),
}

/// One column of a `create table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Part of the primary key
    pub primary: bool,
    /// Covered by a unique index
    pub unique: bool,
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `select 1`
    SelectLiteral(Vec<Cell>),
    /// `select count(*) from T`
    SelectCount {
        /// Table name
        table: String,
        /// Optional filter
        filter: Option<Filter>,
    },
    /// `select cols from T where ...`
    Select {
        /// Table name
        table: String,
        /// Projected columns
        projection: Projection,
        /// Optional filter
        filter: Option<Filter>,
        /// Optional row limit
        limit: Option<u64>,
    },
    /// `insert into T values (...)`
    Insert {
        /// Table name
        table: String,
        /// Explicit column list, if given
        columns: Option<Vec<String>>,
        /// One entry per inserted row
        rows: Vec<Vec<Cell>>,
    },
    /// `update T set ... where ...`
    Update {
        /// Table name
        table: String,
        /// Assignments in order
        assignments: Vec<(String, Cell)>,
        /// Rows to change
        filter: Filter,
    },
    /// `create table T (...)`
    CreateTable {
        /// Table name
        table: String,
        /// Column definitions
        columns: Vec<ColumnDef>,
        /// `if not exists` was given
        if_not_exists: bool,
    },
    /// `drop table T`
    DropTable {
        /// Table name
        table: String,
        /// `if exists` was given
        if_exists: bool,
    },
    /// Session/transaction control with no visible effect
    Noop,
}

impl Statement {
    /// Whether the statement changes data and must replicate.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Statement::Insert { .. }
                | Statement::Update { .. }
                | Statement::CreateTable { .. }
                | Statement::DropTable { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Number(u64),
    Str(String),
    Punct(char),
}

/// Parse one statement.
pub fn parse(sql: &str) -> Result<Statement, QueryError> {
    let tokens = tokenize(sql)?;
    if tokens.is_empty() {
        return Err(QueryError::new(ER_EMPTY_QUERY, "Query was empty"));
    }
    let mut parser = Parser {
        sql,
        tokens,
        pos: 0,
    };
    let stmt = parser.statement()?;
    parser.eat_punct(';');
    if let Some(tok) = parser.peek() {
        return Err(parser.error_near(tok));
    }
    Ok(stmt)
}

fn syntax_error(sql: &str, near: &str) -> QueryError {
    QueryError::new(
        ER_PARSE_ERROR,
        format!(
            "You have an error in your SQL syntax near '{}' in '{}'",
            near, sql
        ),
    )
}

fn tokenize(sql: &str) -> Result<Vec<Token>, QueryError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            if i >= chars.len() {
                return Err(syntax_error(sql, "/*"));
            }
            i += 2;
        } else if c == '#' || (c == '-' && chars.get(i + 1) == Some(&'-')) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '\'' || c == '"' || c == '`' {
            let quote = c;
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(syntax_error(sql, &quote.to_string())),
                    Some(&ch) if ch == quote => {
                        if chars.get(i + 1) == Some(&quote) {
                            text.push(quote);
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    }
                    Some(&ch) => {
                        text.push(ch);
                        i += 1;
                    }
                }
            }
            if quote == '`' {
                tokens.push(Token::Word(text.to_ascii_lowercase()));
            } else {
                tokens.push(Token::Str(text));
            }
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric()
                    || chars[i] == '_'
                    || chars[i] == '.'
                    || chars[i] == '$')
            {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.parse::<u64>() {
                Ok(n) => tokens.push(Token::Number(n)),
                Err(_) => tokens.push(Token::Word(word.to_ascii_lowercase())),
            }
        } else {
            tokens.push(Token::Punct(c));
            i += 1;
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error_near(&self, tok: &Token) -> QueryError {
        let near = match tok {
            Token::Word(w) => w.clone(),
            Token::Number(n) => n.to_string(),
            Token::Str(s) => format!("'{}'", s),
            Token::Punct(c) => c.to_string(),
        };
        syntax_error(self.sql, &near)
    }

    fn error_here(&self) -> QueryError {
        match self.peek() {
            Some(tok) => self.error_near(tok),
            None => syntax_error(self.sql, ""),
        }
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == kw)
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), QueryError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error_here())
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), QueryError> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.error_here())
        }
    }

    fn identifier(&mut self) -> Result<String, QueryError> {
        match self.peek() {
            Some(Token::Word(w)) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            _ => Err(self.error_here()),
        }
    }

    /// Table names may be schema-qualified; only the table part is kept.
    fn table_name(&mut self) -> Result<String, QueryError> {
        let name = self.identifier()?;
        Ok(match name.rsplit_once('.') {
            Some((_, table)) => table.to_string(),
            None => name,
        })
    }

    fn literal(&mut self) -> Result<Cell, QueryError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Cell::Int(n)),
            Some(Token::Str(s)) => Ok(Cell::Text(s)),
            Some(Token::Word(w)) if w == "null" => Ok(Cell::Null),
            Some(Token::Word(w)) => Ok(Cell::Text(w)),
            Some(tok) => Err(self.error_near(&tok)),
            None => Err(syntax_error(self.sql, "")),
        }
    }

    fn statement(&mut self) -> Result<Statement, QueryError> {
        let head = self.identifier()?;
        match head.as_str() {
            "select" => self.select(),
            "insert" | "replace" => self.insert(),
            "update" => self.update(),
            "create" => self.create(),
            "drop" => self.drop_table(),
            "begin" | "commit" | "rollback" | "start" | "set" | "use" => {
                self.pos = self.tokens.len();
                Ok(Statement::Noop)
            }
            _ => Err(syntax_error(self.sql, &head)),
        }
    }

    fn select(&mut self) -> Result<Statement, QueryError> {
        if self.peek_keyword("count") {
            self.pos += 1;
            self.expect_punct('(')?;
            self.expect_punct('*')?;
            self.expect_punct(')')?;
            self.expect_keyword("from")?;
            let table = self.table_name()?;
            let filter = self.opt_filter()?;
            return Ok(Statement::SelectCount { table, filter });
        }

        let mut items = Vec::new();
        loop {
            if self.eat_punct('*') {
                items.push(None);
            } else {
                items.push(Some(self.literal()?));
            }
            if !self.eat_punct(',') {
                break;
            }
        }

        if !self.eat_keyword("from") {
            let cells = items
                .into_iter()
                .map(|item| item.ok_or_else(|| syntax_error(self.sql, "*")))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Statement::SelectLiteral(cells));
        }

        let projection = if items.len() == 1 && items[0].is_none() {
            Projection::All
        } else {
            let mut columns = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Some(Cell::Text(name)) => columns.push(name),
                    _ => return Err(syntax_error(self.sql, "from")),
                }
            }
            Projection::Columns(columns)
        };
        let table = self.table_name()?;
        let filter = self.opt_filter()?;
        let limit = if self.eat_keyword("limit") {
            match self.next() {
                Some(Token::Number(n)) => Some(n),
                Some(tok) => return Err(self.error_near(&tok)),
                None => return Err(syntax_error(self.sql, "limit")),
            }
        } else {
            None
        };
        if self.eat_keyword("for") {
            self.expect_keyword("update")?;
        }
        Ok(Statement::Select {
            table,
            projection,
            filter,
            limit,
        })
    }

    fn opt_filter(&mut self) -> Result<Option<Filter>, QueryError> {
        if self.eat_keyword("where") {
            Ok(Some(self.filter()?))
        } else {
            Ok(None)
        }
    }

    fn filter(&mut self) -> Result<Filter, QueryError> {
        let column = self.identifier()?;
        self.expect_punct('=')?;
        let value = self.literal()?;
        Ok(Filter { column, value })
    }

    fn insert(&mut self) -> Result<Statement, QueryError> {
        self.eat_keyword("ignore");
        self.expect_keyword("into")?;
        let table = self.table_name()?;

        let columns = if self.eat_punct('(') {
            let mut cols = vec![self.identifier()?];
            while self.eat_punct(',') {
                cols.push(self.identifier()?);
            }
            self.expect_punct(')')?;
            Some(cols)
        } else {
            None
        };

        if !self.eat_keyword("values") {
            self.expect_keyword("value")?;
        }
        let mut rows = Vec::new();
        loop {
            self.expect_punct('(')?;
            let mut row = vec![self.literal()?];
            while self.eat_punct(',') {
                row.push(self.literal()?);
            }
            self.expect_punct(')')?;
            rows.push(row);
            if !self.eat_punct(',') {
                break;
            }
        }
        Ok(Statement::Insert {
            table,
            columns,
            rows,
        })
    }

    fn update(&mut self) -> Result<Statement, QueryError> {
        let table = self.table_name()?;
        self.expect_keyword("set")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.identifier()?;
            self.expect_punct('=')?;
            let value = self.literal()?;
            assignments.push((column, value));
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_keyword("where")?;
        let filter = self.filter()?;
        Ok(Statement::Update {
            table,
            assignments,
            filter,
        })
    }

    fn create(&mut self) -> Result<Statement, QueryError> {
        self.expect_keyword("table")?;
        let if_not_exists = if self.eat_keyword("if") {
            self.expect_keyword("not")?;
            self.expect_keyword("exists")?;
            true
        } else {
            false
        };
        let table = self.table_name()?;
        self.expect_punct('(')?;

        // Split the body into top-level comma separated groups.
        let mut groups: Vec<Vec<Token>> = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut depth = 0usize;
        loop {
            let tok = self.next().ok_or_else(|| syntax_error(self.sql, "("))?;
            match tok {
                Token::Punct(')') if depth == 0 => break,
                Token::Punct(',') if depth == 0 => groups.push(std::mem::take(&mut current)),
                Token::Punct('(') => {
                    depth += 1;
                    current.push(tok);
                }
                Token::Punct(')') => {
                    depth -= 1;
                    current.push(tok);
                }
                other => current.push(other),
            }
        }
        groups.push(current);
        // Table options (engine=..., charset=...) carry no meaning here.
        self.pos = self.tokens.len();

        let mut columns: Vec<ColumnDef> = Vec::new();
        let mut constraints: Vec<(bool, Vec<String>)> = Vec::new();
        for group in groups {
            let words: Vec<String> = group
                .iter()
                .filter_map(|t| match t {
                    Token::Word(w) => Some(w.clone()),
                    _ => None,
                })
                .collect();
            let Some(first) = words.first() else {
                return Err(syntax_error(self.sql, ","));
            };
            match first.as_str() {
                "primary" | "unique" | "key" | "index" | "constraint" => {
                    let is_primary = words.iter().any(|w| w == "primary");
                    let is_unique = is_primary || words.iter().any(|w| w == "unique");
                    let cols = parenthesized_words(&group);
                    if is_unique {
                        constraints.push((is_primary, cols));
                    }
                }
                name => {
                    columns.push(ColumnDef {
                        name: name.to_string(),
                        primary: words.iter().any(|w| w == "primary"),
                        unique: words.iter().any(|w| w == "unique"),
                    });
                }
            }
        }

        for (is_primary, cols) in constraints {
            // Composite keys are not modelled; only single-column keys are enforced.
            if cols.len() != 1 {
                continue;
            }
            if let Some(col) = columns.iter_mut().find(|c| c.name == cols[0]) {
                if is_primary {
                    col.primary = true;
                } else {
                    col.unique = true;
                }
            }
        }

        if columns.is_empty() {
            return Err(syntax_error(self.sql, ")"));
        }
        Ok(Statement::CreateTable {
            table,
            columns,
            if_not_exists,
        })
    }

    fn drop_table(&mut self) -> Result<Statement, QueryError> {
        self.expect_keyword("table")?;
        let if_exists = if self.eat_keyword("if") {
            self.expect_keyword("exists")?;
            true
        } else {
            false
        };
        let table = self.table_name()?;
        Ok(Statement::DropTable { table, if_exists })
    }
}

fn parenthesized_words(group: &[Token]) -> Vec<String> {
    let mut inside = false;
    let mut words = Vec::new();
    for tok in group {
        match tok {
            Token::Punct('(') => inside = true,
            Token::Punct(')') => inside = false,
            Token::Word(w) if inside => words.push(w.clone()),
            _ => {}
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_literal() {
        assert_eq!(
            parse("select 1").unwrap(),
            Statement::SelectLiteral(vec![Cell::Int(1)])
        );
        assert_eq!(
            parse("SELECT 1, 'a';").unwrap(),
            Statement::SelectLiteral(vec![Cell::Int(1), Cell::Text("a".into())])
        );
    }

    #[test]
    fn test_select_with_comment_and_filter() {
        let stmt =
            parse("/* mysqlsct test after update */ select c1 from sct0 where id = 17").unwrap();
        assert_eq!(
            stmt,
            Statement::Select {
                table: "sct0".into(),
                projection: Projection::Columns(vec!["c1".into()]),
                filter: Some(Filter {
                    column: "id".into(),
                    value: Cell::Int(17),
                }),
                limit: None,
            }
        );
        assert!(!stmt.is_write());
    }

    #[test]
    fn test_select_star_and_count() {
        assert!(matches!(
            parse("select * from db.T1 where sid = 3 limit 1").unwrap(),
            Statement::Select { projection: Projection::All, ref table, limit: Some(1), .. } if table == "t1"
        ));
        assert_eq!(
            parse("select count(*) from sct0").unwrap(),
            Statement::SelectCount {
                table: "sct0".into(),
                filter: None
            }
        );
    }

    #[test]
    fn test_insert_multiple_rows() {
        let stmt = parse("insert into t (id, c1) values(1,0), (2, NULL)").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert {
                table: "t".into(),
                columns: Some(vec!["id".into(), "c1".into()]),
                rows: vec![
                    vec![Cell::Int(1), Cell::Int(0)],
                    vec![Cell::Int(2), Cell::Null]
                ],
            }
        );
        assert!(stmt.is_write());
    }

    #[test]
    fn test_update() {
        assert_eq!(
            parse("update sec_indexsct0 set name = 5 where sid = 9").unwrap(),
            Statement::Update {
                table: "sec_indexsct0".into(),
                assignments: vec![("name".into(), Cell::Int(5))],
                filter: Filter {
                    column: "sid".into(),
                    value: Cell::Int(9)
                },
            }
        );
    }

    #[test]
    fn test_create_with_inline_and_trailing_keys() {
        let stmt = parse(
            "create table s (id bigint not null, name bigint, tag bigint, sid bigint, \
             primary key (id), unique key uk_sid (sid)) engine=InnoDB",
        )
        .unwrap();
        let Statement::CreateTable { columns, .. } = stmt else {
            panic!("expected create table");
        };
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "tag", "sid"]);
        assert!(columns[0].primary);
        assert!(columns[3].unique);
        assert!(!columns[1].unique);

        let stmt = parse("create table t (id bigint not null primary key, c1 bigint)").unwrap();
        let Statement::CreateTable { columns, .. } = stmt else {
            panic!("expected create table");
        };
        assert!(columns[0].primary);
    }

    #[test]
    fn test_drop_and_noop() {
        assert_eq!(
            parse("drop table if exists sct1").unwrap(),
            Statement::DropTable {
                table: "sct1".into(),
                if_exists: true
            }
        );
        assert_eq!(parse("commit").unwrap(), Statement::Noop);
        assert_eq!(parse("set session autocommit = 0").unwrap(), Statement::Noop);
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("   ").unwrap_err().code, ER_EMPTY_QUERY);
        assert_eq!(parse("-- only a comment").unwrap_err().code, ER_EMPTY_QUERY);
        assert_eq!(parse("delete from t").unwrap_err().code, ER_PARSE_ERROR);
        assert_eq!(parse("select c1 from t where").unwrap_err().code, ER_PARSE_ERROR);
        assert_eq!(parse("select 'open").unwrap_err().code, ER_PARSE_ERROR);
        assert_eq!(parse("select 1 extra").unwrap_err().code, ER_PARSE_ERROR);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(input in "\\PC{0,64}") {
                let _ = parse(&input);
            }

            #[test]
            fn update_values_survive_parsing(key in 0u64..1_000_000, value in any::<u64>()) {
                let sql = format!("update sct0 set c1 = {} where id = {}", value, key);
                let stmt = parse(&sql).unwrap();
                prop_assert_eq!(stmt, Statement::Update {
                    table: "sct0".into(),
                    assignments: vec![("c1".into(), Cell::Int(value))],
                    filter: Filter { column: "id".into(), value: Cell::Int(key) },
                });
            }
        }
    }
}
