use crate::backend::{Filter, Order, TableQuery};

/// What subset of a backend table a [`TableSync`](super::TableSync) tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBinding {
    pub table: String,
    /// `None` selects every column.
    pub columns: Option<Vec<String>>,
    pub filter: Option<Filter>,
    pub order: Option<Order>,
    /// Open a push channel on mount.
    pub realtime: bool,
    /// Cache key holding the last good snapshot.
    pub fallback_key: Option<String>,
}

impl TableBinding {
    /// Binding for a whole table with realtime on and no fallback key.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            filter: None,
            order: None,
            realtime: true,
            fallback_key: None,
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn fallback_key(mut self, key: impl Into<String>) -> Self {
        self.fallback_key = Some(key.into());
        self
    }

    pub fn query(&self) -> TableQuery {
        TableQuery {
            table: self.table.clone(),
            columns: self.columns.clone(),
            filter: self.filter.clone(),
            order: self.order.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let binding = TableBinding::new("staff");
        assert!(binding.realtime);
        assert!(binding.fallback_key.is_none());
        assert_eq!(binding.query(), TableQuery::new("staff"));
    }

    #[test]
    fn test_builder_flows_into_query() {
        let binding = TableBinding::new("schedule_events")
            .select(&["id", "date"])
            .filter(Filter::eq("venue", "Shibuya"))
            .order(Order::asc("date"))
            .realtime(false)
            .fallback_key("schedule");

        let query = binding.query();
        assert_eq!(query.table, "schedule_events");
        assert_eq!(query.select_clause(), "id,date");
        assert_eq!(query.filter, Some(Filter::eq("venue", "Shibuya")));
        assert_eq!(query.order, Some(Order::asc("date")));
        assert!(!binding.realtime);
        assert_eq!(binding.fallback_key.as_deref(), Some("schedule"));
    }
}
