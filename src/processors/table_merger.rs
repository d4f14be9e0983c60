use crate::error::{ProcessingError, Result};
use crate::models::{GlobalTable, PartialTable};
use tracing::debug;

/// Folds worker partial tables into the single global table.
///
/// Merging is associative and commutative, so partials may arrive in any
/// completion order.
pub struct TableMerger {
    global: GlobalTable,
    partials_merged: usize,
}

impl TableMerger {
    pub fn new() -> Self {
        Self {
            global: GlobalTable::new(),
            partials_merged: 0,
        }
    }

    pub fn merge(&mut self, partial: PartialTable) {
        debug!(
            stations = partial.len(),
            rows = partial.rows(),
            "merging partial table"
        );
        self.global.absorb(partial);
        self.partials_merged += 1;
    }

    pub fn partials_merged(&self) -> usize {
        self.partials_merged
    }

    /// Hand over the merged table; an input without a single row is an error.
    pub fn finish(self) -> Result<GlobalTable> {
        if self.global.is_empty() {
            return Err(ProcessingError::NoStations);
        }
        Ok(self.global)
    }

    /// Merge a complete set of partials in one go
    pub fn merge_all<I>(partials: I) -> Result<GlobalTable>
    where
        I: IntoIterator<Item = PartialTable>,
    {
        let mut merger = Self::new();
        for partial in partials {
            merger.merge(partial);
        }
        merger.finish()
    }
}

impl Default for TableMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::parse_chunk_into;

    fn partial(rows: &str) -> PartialTable {
        let mut table = PartialTable::new();
        parse_chunk_into(rows.as_bytes(), &mut table).unwrap();
        table
    }

    fn partials() -> Vec<PartialTable> {
        vec![
            partial("Tokyo;10.5\nParis;-5.3\n"),
            partial("Tokyo;20.0\nOslo;-12.0\n"),
            partial("Paris;7.1\n"),
            partial("Oslo;3.3\nTokyo;-0.4\nLima;19.9\n"),
        ]
    }

    fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_merge_order_is_irrelevant() {
        let reference = TableMerger::merge_all(partials()).unwrap();
        let orders = permutations(&[0, 1, 2, 3]);
        assert_eq!(orders.len(), 24);

        for order in orders {
            let mut pool: Vec<Option<PartialTable>> = partials().into_iter().map(Some).collect();
            let reordered = order.iter().map(|&i| pool[i].take().unwrap());
            let merged = TableMerger::merge_all(reordered).unwrap();
            assert_eq!(merged, reference, "order {:?}", order);
        }
    }

    #[test]
    fn test_merged_values() {
        let global = TableMerger::merge_all(partials()).unwrap();

        assert_eq!(global.len(), 4);
        assert_eq!(global.rows(), 8);

        let tokyo = global.get(b"Tokyo").unwrap();
        assert_eq!((tokyo.min, tokyo.max, tokyo.sum, tokyo.count), (-4, 200, 301, 3));

        let oslo = global.get(b"Oslo").unwrap();
        assert_eq!((oslo.min, oslo.max, oslo.count), (-120, 33, 2));
    }

    #[test]
    fn test_counts_sum_to_rows() {
        let global = TableMerger::merge_all(partials()).unwrap();
        let total: u64 = global.iter().map(|(_, aggregate)| aggregate.count).sum();
        assert_eq!(total, global.rows());
    }

    #[test]
    fn test_empty_merge_is_an_error() {
        assert!(matches!(
            TableMerger::merge_all(Vec::new()),
            Err(ProcessingError::NoStations)
        ));
        assert!(matches!(
            TableMerger::merge_all(vec![PartialTable::new(), PartialTable::new()]),
            Err(ProcessingError::NoStations)
        ));
    }

    #[test]
    fn test_partials_merged_counter() {
        let mut merger = TableMerger::new();
        for table in partials() {
            merger.merge(table);
        }
        assert_eq!(merger.partials_merged(), 4);
    }
}
