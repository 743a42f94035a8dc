use std::collections::HashMap;
use std::hash::Hash;

use squidchat_types::{ChannelRecord, MessageRecord, Page, QueryError, RequestRecord};

/// Cached result of one read query.
///
/// `resolve` with an error keeps the previously loaded data so views can
/// keep rendering stale-but-useful state.
#[derive(Debug)]
pub struct QueryCell<T> {
    data: Option<T>,
    error: Option<QueryError>,
    loading: bool,
    epoch: u64,
}

impl<T> QueryCell<T> {
    pub fn new() -> Self {
        QueryCell {
            data: None,
            error: None,
            loading: false,
            epoch: 0,
        }
    }

    /// Mark the cell as loading; data and error are untouched.
    pub fn begin(&mut self) {
        self.loading = true;
    }

    pub fn resolve(&mut self, result: Result<T, QueryError>) {
        self.loading = false;
        self.epoch += 1;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(error) => {
                self.error = Some(error);
            }
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_resolved(&self) -> bool {
        self.epoch > 0
    }

    /// Number of resolutions so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn clear(&mut self) {
        self.data = None;
        self.error = None;
        self.loading = false;
    }
}

impl<T> Default for QueryCell<T> {
    fn default() -> Self {
        QueryCell::new()
    }
}

/// Items that carry a stable identifier usable as a merge key.
pub trait Keyed {
    type Key: Copy + Eq + Hash;

    fn key(&self) -> Self::Key;
}

impl Keyed for MessageRecord {
    type Key = u32;

    fn key(&self) -> u32 {
        self.message_id
    }
}

impl Keyed for ChannelRecord {
    type Key = u32;

    fn key(&self) -> u32 {
        self.channel_id
    }
}

impl Keyed for RequestRecord {
    type Key = u32;

    fn key(&self) -> u32 {
        self.request_id
    }
}

/// Accumulating page cache for infinite-scroll views.
///
/// Fetched pages merge by stable key: insertion order is preserved and a
/// duplicate key overwrites the earlier item in place. `total` and
/// `has_next_page` always come from the latest merged page, so a total that
/// shrank under us never breaks the cache.
pub struct PageCache<T: Keyed> {
    items: Vec<T>,
    index: HashMap<T::Key, usize>,
    offset: u32,
    per_page: u32,
    total: u32,
    has_next_page: bool,
}

impl<T: Keyed> PageCache<T> {
    pub fn new(per_page: u32) -> Self {
        PageCache {
            items: Vec::new(),
            index: HashMap::new(),
            offset: 0,
            per_page,
            total: 0,
            has_next_page: false,
        }
    }

    /// The last requested window, re-issued by `refresh`.
    pub fn window(&self) -> (u32, u32) {
        (self.offset, self.per_page)
    }

    pub fn set_offset(&mut self, offset: u32) {
        self.offset = offset;
    }

    /// Merge one fetched page into the accumulated items.
    pub fn merge(&mut self, page: Page<T>) {
        for item in page.items {
            let key = item.key();
            match self.index.get(&key) {
                Some(&pos) => self.items[pos] = item,
                None => {
                    self.index.insert(key, self.items.len());
                    self.items.push(item);
                }
            }
        }
        self.total = page.total;
        self.has_next_page = page.has_next_page;
    }

    /// Remove one item by key. Returns true if it was present.
    pub fn remove(&mut self, key: T::Key) -> bool {
        let Some(pos) = self.index.remove(&key) else {
            return false;
        };
        self.items.remove(pos);
        for idx in self.index.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
        self.offset = 0;
        self.total = 0;
        self.has_next_page = false;
    }

    /// Accumulated items in insertion order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }
}

impl<T: Keyed + Clone> PageCache<T>
where
    T::Key: Ord,
{
    /// Accumulated items sorted by key ascending.
    pub fn items_sorted(&self) -> Vec<T> {
        let mut items = self.items.clone();
        items.sort_by_key(|item| item.key());
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        label: &'static str,
    }

    impl Keyed for Item {
        type Key = u32;

        fn key(&self) -> u32 {
            self.id
        }
    }

    fn items(range: std::ops::Range<u32>) -> Vec<Item> {
        range.map(|id| Item { id, label: "x" }).collect()
    }

    #[test]
    fn test_cell_error_retains_previous_data() {
        let mut cell = QueryCell::new();
        cell.resolve(Ok(41));
        cell.resolve(Err(QueryError::Transport("rpc down".into())));

        assert_eq!(cell.data(), Some(&41));
        assert!(cell.error().is_some());
        assert_eq!(cell.epoch(), 2);

        cell.resolve(Ok(42));
        assert_eq!(cell.data(), Some(&42));
        assert!(cell.error().is_none());
    }

    #[test]
    fn test_two_page_accumulation() {
        // page(offset=0, per_page=15) -> total=20, has_next_page=true;
        // page(offset=15) -> 5 items, has_next_page=false; 20 unique combined.
        let mut cache = PageCache::new(15);
        cache.merge(Page::new(items(0..15), 0, 15, 20));
        assert!(cache.has_next_page());
        assert_eq!(cache.total(), 20);

        cache.set_offset(15);
        cache.merge(Page::new(items(15..20), 15, 15, 20));
        assert!(!cache.has_next_page());
        assert_eq!(cache.len(), 20);

        let ids: Vec<u32> = cache.items().iter().map(|i| i.id).collect();
        let expected: Vec<u32> = (0..20).collect();
        assert_eq!(ids, expected, "insertion order preserved");
    }

    #[test]
    fn test_duplicate_overwritten_in_place() {
        let mut cache = PageCache::new(10);
        cache.merge(Page::new(items(0..3), 0, 10, 3));
        cache.merge(Page::new(
            vec![Item { id: 1, label: "updated" }],
            0,
            10,
            3,
        ));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.items()[1].label, "updated");
        let ids: Vec<u32> = cache.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_shrinking_total_tolerated() {
        let mut cache = PageCache::new(10);
        cache.merge(Page::new(items(0..10), 0, 10, 30));
        assert!(cache.has_next_page());

        // Concurrent deletions shrank the collection; metadata follows the
        // fresh page.
        cache.merge(Page::new(items(0..4), 0, 10, 4));
        assert!(!cache.has_next_page());
        assert_eq!(cache.total(), 4);
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut cache = PageCache::new(10);
        cache.merge(Page::new(items(0..5), 0, 10, 5));

        assert!(cache.remove(2));
        assert!(!cache.remove(2));
        assert_eq!(cache.len(), 4);

        // Overwrite after removal still lands on the right slot.
        cache.merge(Page::new(
            vec![Item { id: 4, label: "updated" }],
            0,
            10,
            4,
        ));
        let ids: Vec<u32> = cache.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);
        assert_eq!(cache.items()[3].label, "updated");
    }

    #[test]
    fn test_items_sorted_by_key() {
        let mut cache = PageCache::new(10);
        cache.merge(Page::new(items(5..8), 5, 10, 8));
        cache.set_offset(0);
        cache.merge(Page::new(items(0..5), 0, 10, 8));

        let sorted: Vec<u32> = cache.items_sorted().iter().map(|i| i.id).collect();
        let expected: Vec<u32> = (0..8).collect();
        assert_eq!(sorted, expected);
    }
}
