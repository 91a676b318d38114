//! SQL text builders.

use std::fmt;

/// Comparison operators usable in WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// SQL spelling.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Parses an operator token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" => Some(CompareOp::Eq),
            "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Conjunction of `column op ?` conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhereClause {
    conditions: Vec<(String, CompareOp)>,
}

impl WhereClause {
    /// Creates an empty clause.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `column = ?`.
    #[must_use]
    pub fn column_eq(self, column: impl Into<String>) -> Self {
        self.and(column, CompareOp::Eq)
    }

    /// Adds `column op ?`.
    #[must_use]
    pub fn and(mut self, column: impl Into<String>, op: CompareOp) -> Self {
        self.conditions.push((column.into(), op));
        self
    }

    /// Returns true if no condition was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Number of placeholders the clause contributes.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.conditions.len()
    }

    fn write_to(&self, sql: &mut String) {
        for (i, (column, op)) in self.conditions.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(column);
            sql.push(' ');
            sql.push_str(op.as_sql());
            sql.push_str(" ?");
        }
    }
}

/// Renders the four statement shapes the engine issues.
pub struct SqlBuilder;

impl SqlBuilder {
    /// `INSERT INTO table (a, b) VALUES (?, ?)`
    #[must_use]
    pub fn insert(table: &str, columns: &[&str]) -> String {
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders(columns.len())
        )
    }

    /// `UPDATE table SET a = ?, b = ? WHERE ...`
    #[must_use]
    pub fn update(table: &str, columns: &[&str], filter: &WhereClause) -> String {
        let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = ?")).collect();
        let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
        filter.write_to(&mut sql);
        sql
    }

    /// `DELETE FROM table WHERE ...`
    #[must_use]
    pub fn delete(table: &str, filter: &WhereClause) -> String {
        let mut sql = format!("DELETE FROM {table}");
        filter.write_to(&mut sql);
        sql
    }

    /// `SELECT a, b FROM table WHERE ...`
    #[must_use]
    pub fn select(table: &str, columns: &[&str], filter: &WhereClause) -> String {
        let mut sql = format!("SELECT {} FROM {table}", columns.join(", "));
        filter.write_to(&mut sql);
        sql
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_shape() {
        assert_eq!(
            SqlBuilder::insert("members", &["id", "name"]),
            "INSERT INTO members (id, name) VALUES (?, ?)"
        );
    }

    #[test]
    fn update_shape() {
        let filter = WhereClause::new().column_eq("id");
        assert_eq!(
            SqlBuilder::update("members", &["name", "age"], &filter),
            "UPDATE members SET name = ?, age = ? WHERE id = ?"
        );
    }

    #[test]
    fn where_clause_conjunction() {
        let filter = WhereClause::new()
            .and("age", CompareOp::Ge)
            .and("name", CompareOp::Ne);
        assert_eq!(filter.parameter_count(), 2);
        assert_eq!(
            SqlBuilder::select("m", &["id"], &filter),
            "SELECT id FROM m WHERE age >= ? AND name <> ?"
        );
        assert_eq!(SqlBuilder::select("m", &["id"], &WhereClause::new()), "SELECT id FROM m");
    }

    #[test]
    fn operator_tokens() {
        for op in [
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Lt,
            CompareOp::Le,
            CompareOp::Gt,
            CompareOp::Ge,
        ] {
            assert_eq!(CompareOp::parse(op.as_sql()), Some(op));
        }
        assert_eq!(CompareOp::parse("=="), None);
    }
}
