//! Route-table collection for gateway endpoints.

use crate::models::Subnet;
use itertools::Itertools;

/// Unique route-table ids of `subnets`, in order of first appearance.
///
/// Subnets without a route table, or whose route table has an empty id,
/// contribute nothing. The order is kept stable rather than sorted so that the
/// endpoint declarations stay identical across rebuilds.
///
/// # Examples
/// ```
/// use vpc_topology::processing::all_route_table_ids;
/// let none: Vec<vpc_topology::models::Subnet> = vec![];
/// assert!(all_route_table_ids(&none).is_empty());
/// ```
pub fn all_route_table_ids<'a, I>(subnets: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Subnet>,
{
    subnets
        .into_iter()
        .filter_map(Subnet::route_table_id)
        .unique()
        .map(str::to_string)
        .collect()
}
