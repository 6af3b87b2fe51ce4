//! Evaluation of a parsed search against concrete tags.

use super::ast::{SearchNode, TagSearch};
use crate::message::MetricMessage;
use crate::tag::TagSet;

impl SearchNode {
    /// Evaluate against one tag set.
    pub fn evaluate(&self, tags: &TagSet<'_>) -> bool {
        self.evaluate_sets(&[tags])
    }

    /// Evaluate against the union of several tag sets.
    ///
    /// A match node holds if any single tag satisfies both its patterns.
    /// `and` and `or` short-circuit.
    pub fn evaluate_sets(&self, sets: &[&TagSet<'_>]) -> bool {
        match self {
            SearchNode::And(args) => args.iter().all(|arg| arg.evaluate_sets(sets)),
            SearchNode::Or(args) => args.iter().any(|arg| arg.evaluate_sets(sets)),
            SearchNode::Not(arg) => !arg.evaluate_sets(sets),
            SearchNode::Hint { expr, .. } => expr.evaluate_sets(sets),
            SearchNode::Match { category, value } => {
                sets.iter().flat_map(|set| set.iter()).any(|tag| {
                    category.matches(tag.category())
                        && value.as_ref().map_or(true, |v| v.matches(tag.value()))
                })
            }
        }
    }
}

impl TagSearch {
    /// True if `tags` satisfy the search.
    pub fn matches(&self, tags: &TagSet<'_>) -> bool {
        self.root().evaluate(tags)
    }

    /// True if the union of `sets` satisfies the search.
    pub fn matches_sets(&self, sets: &[&TagSet<'_>]) -> bool {
        self.root().evaluate_sets(sets)
    }

    /// Evaluate against a decoded message: its stream and measurement tags
    /// plus the implicit `__name` and `__check_uuid` tags.
    pub fn matches_message(&self, message: &MetricMessage<'_>) -> bool {
        let implicit = message.implicit_tags();
        match &message.id.name {
            Some(name) => self.matches_sets(&[name.stream(), name.measurement(), &implicit]),
            None => self.matches(&implicit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{decode_line, NoitField};
    use crate::tag::TagLimit;

    #[test]
    fn test_union_of_sets() {
        let stream = TagSet::parse("env:prod", TagLimit::Standard).unwrap();
        let measurement = TagSet::parse("units:ms", TagLimit::Standard).unwrap();
        let search = TagSearch::parse("and(env:prod,units:ms)").unwrap();
        assert!(!search.matches(&stream));
        assert!(search.matches_sets(&[&stream, &measurement]));
    }

    #[test]
    fn test_both_patterns_must_hit_same_tag() {
        let tags = TagSet::parse("a:1,b:2", TagLimit::Standard).unwrap();
        assert!(!TagSearch::parse("and(a:2)").unwrap().matches(&tags));
        assert!(TagSearch::parse("or(a:2,b:2)").unwrap().matches(&tags));
    }

    #[test]
    fn test_message_implicit_tags() {
        let line = "M\t1526493506.214\tx`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tfoo|ST[color:orange]|MT{units:s}\ti\t1";
        let msg = decode_line(line.as_bytes(), NoitField::Auto).unwrap();
        for (query, expected) in [
            ("and(__name:foo)", true),
            ("and(__name:bar)", false),
            ("and(__check_uuid:4766c496-*)", true),
            ("and(color:orange,units:s)", true),
            ("not(color:blue)", true),
        ] {
            let search = TagSearch::parse(query).unwrap();
            assert_eq!(search.matches_message(&msg), expected, "{query}");
        }
    }

    #[test]
    fn test_hint_is_transparent() {
        let tags = TagSet::parse("a:b", TagLimit::Standard).unwrap();
        for (query, expected) in [
            ("hint(and(a:b),index:none)", true),
            ("hint(and(a:c),index:none)", false),
            ("and(hint(a:*))", true),
            ("not(hint(a:b,x:y))", false),
        ] {
            assert_eq!(TagSearch::parse(query).unwrap().matches(&tags), expected, "{query}");
        }
    }

    #[test]
    fn test_empty_set() {
        let tags = TagSet::new();
        assert!(!TagSearch::parse("and(*:*)").unwrap().matches(&tags));
        assert!(TagSearch::parse("not(*)").unwrap().matches(&tags));
    }
}
