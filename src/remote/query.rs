use std::fmt;

/// A structured row query against the remote table store. Services build these;
/// the HTTP client renders them to query-string pairs and the in-memory double
/// applies them structurally.
#[derive(Debug, Clone, Default)]
pub struct TableQuery {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals a literal value.
    Eq(String, String),
    /// Case-insensitive substring match on one column.
    Ilike(String, String),
    /// Case-insensitive substring match across several columns, OR-combined.
    AnyIlike(Vec<String>, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => write!(f, "asc"),
            Direction::Descending => write!(f, "desc"),
        }
    }
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Eq(column.into(), value.to_string()));
        self
    }

    pub fn ilike(mut self, column: impl Into<String>, term: impl Into<String>) -> Self {
        self.filters.push(Filter::Ilike(column.into(), term.into()));
        self
    }

    pub fn any_ilike<I, S>(mut self, columns: I, term: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter::AnyIlike(
            columns.into_iter().map(Into::into).collect(),
            term.into(),
        ));
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render to PostgREST-style query pairs, e.g.
    /// `user_id=eq.<id>&or=(title.ilike.*t*,content.ilike.*t*)&order=updated_at.desc&limit=5`.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 2);
        for filter in &self.filters {
            match filter {
                Filter::Eq(column, value) => {
                    pairs.push((column.clone(), format!("eq.{value}")));
                }
                Filter::Ilike(column, term) => {
                    pairs.push((column.clone(), format!("ilike.*{term}*")));
                }
                Filter::AnyIlike(columns, term) => {
                    let clauses = columns
                        .iter()
                        .map(|column| format!("{column}.ilike.*{term}*"))
                        .collect::<Vec<_>>()
                        .join(",");
                    pairs.push(("or".to_string(), format!("({clauses})")));
                }
            }
        }
        if let Some(order) = &self.order {
            pairs.push((
                "order".to_string(),
                format!("{}.{}", order.column, order.direction),
            ));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}
