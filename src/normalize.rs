//! NOT elimination for search filters.
//!
//! The search grammar never keeps a negation node. `NOT x` is rewritten as
//! soon as `x` is parsed: comparisons flip their operator and De Morgan's
//! law moves the negation through `AND` and `OR`.
//!
//! ```text
//! NOT a=1               a!=1
//! NOT (a<1 AND b=2)     Or(a>=1, b!=2)
//! NOT NOT a=1           a=1
//! ```

use crate::ast::FilterNode;

/// Returns the filter matching exactly the records `node` rejects.
///
/// Applying it twice gives back the original tree.
pub fn negate(node: FilterNode) -> FilterNode {
    match node {
        FilterNode::Terminal(mut comparison) => {
            comparison.op = comparison.op.negate();
            FilterNode::Terminal(comparison)
        }
        FilterNode::And(left, right) => FilterNode::or(negate(*left), negate(*right)),
        FilterNode::Or(left, right) => FilterNode::and(negate(*left), negate(*right)),
    }
}
