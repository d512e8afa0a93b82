use crate::SEARCH_PAGE_SIZE;

/// One search configuration: everything the API lets a query constrain,
/// pagination cursor included.
///
/// Two filters describe the *same partition* when they differ only in
/// `search_after`. A cursor is only meaningful to the configuration that
/// produced it, so every reconfiguration helper resets it to the first
/// page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub care_type: String,
    pub min_rate: u32,
    pub max_rate: u32,
    pub currency: String,
    pub postal_code: String,
    pub languages: Vec<String>,
    /// Partition attributes; empty means the unpartitioned base query.
    pub attributes: Vec<String>,
    pub sort_order: SortOrder,
    pub page_size: u32,
    /// Pagination cursor; `""` requests the first page.
    pub search_after: String,
    pub ages_served_in_months: Vec<u32>,
    pub number_of_children: u32,
}

impl SearchFilter {
    /// Base filter for one pay range: no partition attributes, primary
    /// sort order, first page, and the fixed query fields the whole crawl
    /// shares.
    pub fn new(min_rate: u32, max_rate: u32, postal_code: &str) -> Self {
        Self {
            care_type: "CHILD_CARE".to_string(),
            min_rate,
            max_rate,
            currency: "USD".to_string(),
            postal_code: postal_code.to_string(),
            languages: vec!["ENGLISH".to_string()],
            attributes: Vec::new(),
            sort_order: SortOrder::BestMatch,
            page_size: SEARCH_PAGE_SIZE,
            search_after: String::new(),
            ages_served_in_months: vec![12, 24, 36, 48],
            number_of_children: 1,
        }
    }

    /// Same range and settings, restricted to one attribute partition.
    pub fn with_attributes(&self, attributes: Vec<String>) -> Self {
        let mut filter = self.clone();
        filter.attributes = attributes;
        filter.search_after.clear();
        filter
    }

    /// Same partition under another sort order, back on the first page.
    pub fn with_sort(&self, sort_order: SortOrder) -> Self {
        let mut filter = self.clone();
        filter.sort_order = sort_order;
        filter.search_after.clear();
        filter
    }

    /// The page behind `cursor` of this exact configuration.
    pub fn with_cursor(&self, cursor: &str) -> Self {
        let mut filter = self.clone();
        filter.search_after = cursor.to_string();
        filter
    }

    /// Whether `other` walks the same partition: equal in everything but
    /// the pagination cursor.
    pub fn same_partition(&self, other: &Self) -> bool {
        self.with_cursor("") == other.with_cursor("")
    }
}

/// Server-side result orderings.
///
/// [`SortOrder::BestMatch`] is the primary order every partition is walked
/// under; the other three exist to shake loose ids the cap hides behind
/// any one ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    BestMatch,
    RatingDesc,
    RecommendedDesc,
    DistanceAsc,
}

impl SortOrder {
    /// Enum value the GraphQL schema expects.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::BestMatch => "BEST_MATCH",
            Self::RatingDesc => "AVERAGE_RATING",
            Self::RecommendedDesc => "RECOMMENDED",
            Self::DistanceAsc => "DISTANCE",
        }
    }
}

/// Reruns for a saturated partition, in rerun order.
pub const ALTERNATE_SORT_ORDERS: [SortOrder; 3] = [
    SortOrder::RatingDesc,
    SortOrder::RecommendedDesc,
    SortOrder::DistanceAsc,
];

/// Every subset of `universe`: the empty set plus all 2^N - 1 non-empty
/// ones, in ascending bitmask order over the input so the output is
/// deterministic for a given universe. Order inside a subset follows the
/// universe's order; these are combinations, not permutations.
///
/// 2^N grows fast. The coordinator documents a practical ceiling of about
/// a dozen attributes; nothing is enforced here.
pub fn attribute_partitions(universe: &[String]) -> Vec<Vec<String>> {
    let mut partitions = Vec::with_capacity(1 << universe.len());
    for mask in 0..(1usize << universe.len()) {
        let combo = universe
            .iter()
            .enumerate()
            .filter(|(i, _)| mask >> i & 1 == 1)
            .map(|(_, attr)| attr.clone())
            .collect();
        partitions.push(combo);
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tags(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn partitions_cover_every_subset_once() {
        let universe = tags(&["NON_SMOKER", "CPR_TRAINED", "COMFORTABLE_WITH_PETS"]);
        let partitions = attribute_partitions(&universe);

        assert_eq!(partitions.len(), 8);
        assert!(partitions.contains(&Vec::new()));
        let unique: HashSet<_> = partitions.iter().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn empty_universe_yields_single_empty_partition() {
        assert_eq!(attribute_partitions(&[]), vec![Vec::<String>::new()]);
    }

    #[test]
    fn partition_order_is_deterministic() {
        let universe = tags(&["A", "B"]);
        let first = attribute_partitions(&universe);
        assert_eq!(first, attribute_partitions(&universe));
        // Empty subset leads, full subset closes.
        assert_eq!(first[0], Vec::<String>::new());
        assert_eq!(first[3], tags(&["A", "B"]));
    }

    #[test]
    fn reconfiguration_resets_the_cursor() {
        let paged = SearchFilter::new(15, 20, "10001").with_cursor("deep-page");
        assert!(!paged.search_after.is_empty());

        let repartitioned = paged.with_attributes(tags(&["NON_SMOKER"]));
        assert!(repartitioned.search_after.is_empty());
        let resorted = paged.with_sort(SortOrder::DistanceAsc);
        assert!(resorted.search_after.is_empty());
    }

    #[test]
    fn same_partition_ignores_only_the_cursor() {
        let base = SearchFilter::new(15, 20, "10001");
        assert!(base.same_partition(&base.with_cursor("c9")));
        assert!(!base.same_partition(&base.with_sort(SortOrder::RatingDesc)));
        assert!(!base.same_partition(&base.with_attributes(tags(&["NON_SMOKER"]))));
    }
}
