//! In-memory tables for one simulated node

use super::sql::{Cell, ColumnDef, Filter, Projection, Statement};
use sct_core::codes::{
    ER_BAD_FIELD_ERROR, ER_BAD_TABLE_ERROR, ER_DUP_ENTRY, ER_NO_SUCH_TABLE,
    ER_PARSE_ERROR, ER_TABLE_EXISTS_ERROR, ER_WRONG_VALUE_COUNT_ON_ROW,
};
use sct_core::{QueryError, Row, RowSet};
use std::collections::{BTreeMap, HashMap};

/// Compare cells the way a loosely typed server would: `5` equals `'5'`.
fn cell_eq(a: &Cell, b: &Cell) -> bool {
    match (a, b) {
        (Cell::Int(x), Cell::Text(s)) | (Cell::Text(s), Cell::Int(x)) => {
            s.trim().parse::<u64>().map(|y| y == *x).unwrap_or(false)
        }
        (Cell::Null, _) | (_, Cell::Null) => false,
        _ => a == b,
    }
}

#[derive(Debug, Clone)]
struct Table {
    name: String,
    columns: Vec<ColumnDef>,
    pk: usize,
    rows: BTreeMap<Cell, Vec<Cell>>,
}

impl Table {
    fn new(name: String, columns: Vec<ColumnDef>) -> Self {
        let pk = columns.iter().position(|c| c.primary).unwrap_or(0);
        Self {
            name,
            columns,
            pk,
            rows: BTreeMap::new(),
        }
    }

    fn column_index(&self, name: &str, clause: &str) -> Result<usize, QueryError> {
        self.columns.iter().position(|c| c.name == name).ok_or_else(|| {
            QueryError::new(
                ER_BAD_FIELD_ERROR,
                format!("Unknown column '{}' in '{}'", name, clause),
            )
        })
    }

    fn matching_keys(&self, filter: Option<&Filter>) -> Result<Vec<Cell>, QueryError> {
        let Some(filter) = filter else {
            return Ok(self.rows.keys().cloned().collect());
        };
        let idx = self.column_index(&filter.column, "where clause")?;
        if idx == self.pk {
            if let Cell::Int(_) = filter.value {
                return Ok(self
                    .rows
                    .contains_key(&filter.value)
                    .then(|| filter.value.clone())
                    .into_iter()
                    .collect());
            }
        }
        Ok(self
            .rows
            .iter()
            .filter(|(_, row)| cell_eq(&row[idx], &filter.value))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn duplicate_error(&self, value: &Cell, column: usize) -> QueryError {
        let key = if column == self.pk {
            "PRIMARY".to_string()
        } else {
            format!("{}.{}", self.name, self.columns[column].name)
        };
        QueryError::new(
            ER_DUP_ENTRY,
            format!(
                "Duplicate entry '{}' for key '{}'",
                value.render().unwrap_or_default(),
                key
            ),
        )
    }

    /// Reject `row` if a unique column collides with a row other than `own_key`.
    fn check_unique(&self, row: &[Cell], own_key: Option<&Cell>) -> Result<(), QueryError> {
        for (idx, col) in self.columns.iter().enumerate() {
            if !col.unique || idx == self.pk || row[idx] == Cell::Null {
                continue;
            }
            let clash = self
                .rows
                .iter()
                .any(|(k, other)| Some(k) != own_key && cell_eq(&other[idx], &row[idx]));
            if clash {
                return Err(self.duplicate_error(&row[idx], idx));
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        columns: Option<&[String]>,
        rows: &[Vec<Cell>],
    ) -> Result<u64, QueryError> {
        let positions: Vec<usize> = match columns {
            Some(cols) => cols
                .iter()
                .map(|c| self.column_index(c, "field list"))
                .collect::<Result<_, _>>()?,
            None => (0..self.columns.len()).collect(),
        };

        let mut inserted: Vec<Cell> = Vec::with_capacity(rows.len());
        for values in rows {
            let result = self.insert_one(&positions, values);
            match result {
                Ok(key) => inserted.push(key),
                Err(e) => {
                    for key in &inserted {
                        self.rows.remove(key);
                    }
                    return Err(e);
                }
            }
        }
        Ok(inserted.len() as u64)
    }

    fn insert_one(&mut self, positions: &[usize], values: &[Cell]) -> Result<Cell, QueryError> {
        if values.len() != positions.len() {
            return Err(QueryError::new(
                ER_WRONG_VALUE_COUNT_ON_ROW,
                "Column count doesn't match value count at row 1",
            ));
        }
        let mut row = vec![Cell::Null; self.columns.len()];
        for (pos, value) in positions.iter().zip(values) {
            row[*pos] = value.clone();
        }
        let key = row[self.pk].clone();
        if self.rows.contains_key(&key) {
            return Err(self.duplicate_error(&key, self.pk));
        }
        self.check_unique(&row, None)?;
        self.rows.insert(key.clone(), row);
        Ok(key)
    }

    fn update(&mut self, assignments: &[(String, Cell)], filter: &Filter) -> Result<u64, QueryError> {
        let mut targets = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let idx = self.column_index(column, "field list")?;
            if idx == self.pk {
                return Err(QueryError::new(
                    ER_PARSE_ERROR,
                    "updating the primary key is not supported by the simulator",
                ));
            }
            targets.push((idx, value.clone()));
        }

        let mut changed = 0;
        for key in self.matching_keys(Some(filter))? {
            let Some(current) = self.rows.get(&key) else {
                continue;
            };
            let mut next = current.clone();
            for (idx, value) in &targets {
                next[*idx] = value.clone();
            }
            if next == *current {
                continue;
            }
            self.check_unique(&next, Some(&key))?;
            self.rows.insert(key, next);
            changed += 1;
        }
        Ok(changed)
    }

    fn select(
        &self,
        projection: &Projection,
        filter: Option<&Filter>,
        limit: Option<u64>,
    ) -> Result<RowSet, QueryError> {
        let indices: Vec<usize> = match projection {
            Projection::All => (0..self.columns.len()).collect(),
            Projection::Columns(cols) => cols
                .iter()
                .map(|c| self.column_index(c, "field list"))
                .collect::<Result<_, _>>()?,
        };
        let limit = limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let rows = self
            .matching_keys(filter)?
            .into_iter()
            .filter_map(|k| self.rows.get(&k))
            .take(limit)
            .map(|row| Row::new(indices.iter().map(|i| row[*i].render()).collect()))
            .collect();
        Ok(RowSet::from_rows(rows))
    }
}

/// All tables of one node.
#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    fn table(&self, name: &str) -> Result<&Table, QueryError> {
        self.tables.get(name).ok_or_else(|| no_such_table(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, QueryError> {
        self.tables.get_mut(name).ok_or_else(|| no_such_table(name))
    }

    /// Execute any statement against this node.
    pub(crate) fn execute(&mut self, stmt: &Statement) -> Result<RowSet, QueryError> {
        match stmt {
            Statement::Insert {
                table,
                columns,
                rows,
            } => {
                let n = self.table_mut(table)?.insert(columns.as_deref(), rows)?;
                Ok(RowSet::affected(n))
            }
            Statement::Update {
                table,
                assignments,
                filter,
            } => {
                let n = self.table_mut(table)?.update(assignments, filter)?;
                Ok(RowSet::affected(n))
            }
            Statement::CreateTable {
                table,
                columns,
                if_not_exists,
            } => {
                if self.tables.contains_key(table) {
                    if *if_not_exists {
                        return Ok(RowSet::empty());
                    }
                    return Err(QueryError::new(
                        ER_TABLE_EXISTS_ERROR,
                        format!("Table '{}' already exists", table),
                    ));
                }
                self.tables
                    .insert(table.clone(), Table::new(table.clone(), columns.clone()));
                Ok(RowSet::empty())
            }
            Statement::DropTable { table, if_exists } => {
                if self.tables.remove(table).is_none() && !*if_exists {
                    return Err(QueryError::new(
                        ER_BAD_TABLE_ERROR,
                        format!("Unknown table '{}'", table),
                    ));
                }
                Ok(RowSet::empty())
            }
            read => self.query(read),
        }
    }

    /// Execute a read-only statement.
    pub(crate) fn query(&self, stmt: &Statement) -> Result<RowSet, QueryError> {
        match stmt {
            Statement::SelectLiteral(cells) => Ok(RowSet::from_rows(vec![Row::new(
                cells.iter().map(Cell::render).collect(),
            )])),
            Statement::SelectCount { table, filter } => {
                let n = self.table(table)?.matching_keys(filter.as_ref())?.len() as u64;
                Ok(RowSet::from_rows(vec![Row::from_u64s(&[n])]))
            }
            Statement::Select {
                table,
                projection,
                filter,
                limit,
            } => self.table(table)?.select(projection, filter.as_ref(), *limit),
            Statement::Noop => Ok(RowSet::empty()),
            write => Err(QueryError::new(
                ER_PARSE_ERROR,
                format!("{:?} is not a read-only statement", write),
            )),
        }
    }

    /// Number of rows in `table`, if it exists.
    pub(crate) fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }

    /// Value of `column` in the row whose `key_column` equals `key`.
    pub(crate) fn lookup(&self, table: &str, key_column: &str, key: u64, column: &str) -> Option<Cell> {
        let t = self.tables.get(table)?;
        let idx = t.column_index(column, "field list").ok()?;
        let filter = Filter {
            column: key_column.to_string(),
            value: Cell::Int(key),
        };
        let row_key = t.matching_keys(Some(&filter)).ok()?.into_iter().next()?;
        t.rows.get(&row_key).map(|row| row[idx].clone())
    }
}

fn no_such_table(name: &str) -> QueryError {
    QueryError::new(ER_NO_SUCH_TABLE, format!("Table '{}' doesn't exist", name))
}

#[cfg(test)]
mod tests {
    use super::super::sql::parse;
    use super::*;

    fn run(catalog: &mut Catalog, sql: &str) -> Result<RowSet, QueryError> {
        catalog.execute(&parse(sql).unwrap())
    }

    fn setup() -> Catalog {
        let mut c = Catalog::default();
        run(&mut c, "create table t (id bigint not null primary key, c1 bigint)").unwrap();
        run(
            &mut c,
            "create table s (id bigint not null primary key, name bigint, tag bigint, sid bigint, unique key uk (sid))",
        )
        .unwrap();
        for pk in 1..=3 {
            run(&mut c, &format!("insert into t values({},0)", pk)).unwrap();
            run(&mut c, &format!("insert into s values({},0,0,{})", pk, pk + 100)).unwrap();
        }
        c
    }

    #[test]
    fn test_point_select_and_update() {
        let mut c = setup();
        let rs = run(&mut c, "update t set c1 = 7 where id = 2").unwrap();
        assert_eq!(rs.affected_rows(), 1);
        let mut rs = run(&mut c, "select c1 from t where id = 2").unwrap();
        assert_eq!(rs.fetch_row().unwrap().get_u64(0), Some(7));
        assert!(rs.fetch_row().is_none());
    }

    #[test]
    fn test_update_same_value_changes_nothing() {
        let mut c = setup();
        let rs = run(&mut c, "update t set c1 = 0 where id = 1").unwrap();
        assert_eq!(rs.affected_rows(), 0);
    }

    #[test]
    fn test_secondary_index_path() {
        let mut c = setup();
        run(&mut c, "update s set name = 9 where sid = 103").unwrap();
        assert_eq!(c.lookup("s", "sid", 103, "name"), Some(Cell::Int(9)));
        assert_eq!(c.lookup("s", "id", 3, "name"), Some(Cell::Int(9)));
        let mut rs = run(&mut c, "select name from s where sid = 103").unwrap();
        assert_eq!(rs.fetch_row().unwrap().get_u64(0), Some(9));
    }

    #[test]
    fn test_missing_row_returns_empty_set() {
        let mut c = setup();
        let mut rs = run(&mut c, "select c1 from t where id = 99").unwrap();
        assert!(rs.fetch_row().is_none());
    }

    #[test]
    fn test_count() {
        let mut c = setup();
        let mut rs = run(&mut c, "select count(*) from t").unwrap();
        assert_eq!(rs.fetch_row().unwrap().get_u64(0), Some(3));
        assert_eq!(c.row_count("s"), Some(3));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut c = setup();
        assert_eq!(run(&mut c, "insert into t values(1,5)").unwrap_err().code, ER_DUP_ENTRY);
        assert_eq!(
            run(&mut c, "insert into s values(9,0,0,101)").unwrap_err().code,
            ER_DUP_ENTRY
        );
        assert_eq!(
            run(&mut c, "update s set sid = 102 where id = 1").unwrap_err().code,
            ER_DUP_ENTRY
        );
    }

    #[test]
    fn test_multi_row_insert_is_atomic() {
        let mut c = setup();
        let err = run(&mut c, "insert into t values(10,0),(1,0)").unwrap_err();
        assert_eq!(err.code, ER_DUP_ENTRY);
        assert_eq!(c.row_count("t"), Some(3));
    }

    #[test]
    fn test_table_lifecycle_errors() {
        let mut c = setup();
        assert_eq!(
            run(&mut c, "create table t (id bigint)").unwrap_err().code,
            ER_TABLE_EXISTS_ERROR
        );
        run(&mut c, "drop table if exists t").unwrap();
        run(&mut c, "drop table if exists t").unwrap();
        assert_eq!(run(&mut c, "drop table t").unwrap_err().code, ER_BAD_TABLE_ERROR);
        assert_eq!(
            run(&mut c, "select c1 from t where id = 1").unwrap_err().code,
            ER_NO_SUCH_TABLE
        );
    }

    #[test]
    fn test_unknown_column_and_value_count() {
        let mut c = setup();
        assert_eq!(
            run(&mut c, "select c9 from t where id = 1").unwrap_err().code,
            ER_BAD_FIELD_ERROR
        );
        assert_eq!(
            run(&mut c, "insert into t values(4)").unwrap_err().code,
            ER_WRONG_VALUE_COUNT_ON_ROW
        );
    }

    #[test]
    fn test_select_literal() {
        let mut c = Catalog::default();
        let mut rs = run(&mut c, "select 1").unwrap();
        assert_eq!(rs.fetch_row().unwrap().get_u64(0), Some(1));
    }
}
