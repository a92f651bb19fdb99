//! Property-based tests for the dedup and validation stages.
//!
//! These tests use proptest to generate random declared lists and verify
//! that the drop rules hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::model::DeclaredRepo;
    use crate::phases::{dedup, validate};
    use crate::report::RunReport;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn records(names: &[String]) -> Vec<DeclaredRepo> {
        names.iter().map(DeclaredRepo::named).collect()
    }

    // ============================================================================
    // dedup property tests
    // ============================================================================

    proptest! {
        /// Property: a name occurring more than once leaves no record behind
        #[test]
        fn dedup_removes_every_copy(names in prop::collection::vec("[a-e]", 0..20)) {
            let mut counts: HashMap<&String, usize> = HashMap::new();
            for name in &names {
                *counts.entry(name).or_default() += 1;
            }

            let mut report = RunReport::new();
            let kept = dedup::execute(records(&names), &mut report);

            for record in &kept {
                prop_assert_eq!(counts[&record.name], 1);
            }
            let unique = counts.values().filter(|c| **c == 1).count();
            prop_assert_eq!(kept.len(), unique);
            prop_assert_eq!(report.duplicate_repos, names.len() - unique);
        }

        /// Property: surviving records keep their input order
        #[test]
        fn dedup_preserves_order(names in prop::collection::vec("[a-z]{1,3}", 0..20)) {
            let mut report = RunReport::new();
            let kept: Vec<String> = dedup::execute(records(&names), &mut report)
                .into_iter()
                .map(|r| r.name)
                .collect();
            let expected: Vec<String> = names
                .iter()
                .filter(|n| names.iter().filter(|m| m == n).count() == 1)
                .cloned()
                .collect();
            prop_assert_eq!(kept, expected);
        }
    }

    // ============================================================================
    // validation property tests
    // ============================================================================

    proptest! {
        /// Property: two repos sharing a permission name are both dropped,
        /// whichever order they are declared in
        #[test]
        fn shared_permission_drops_both(a in "[a-m]{1,5}", b in "[n-z]{1,5}", shared in "[a-z]{1,5}", swap in any::<bool>()) {
            let mut first = DeclaredRepo::named(a);
            first.permission_name = shared.clone();
            let mut second = DeclaredRepo::named(b);
            second.permission_name = shared;
            let input = if swap { vec![second, first] } else { vec![first, second] };

            let mut report = RunReport::new();
            let kept = validate::drop_shared_permissions(input, &mut report);
            prop_assert!(kept.is_empty());
            prop_assert_eq!(report.invalid_repos, 2);
        }

        /// Property: names built from the allowed alphabet without edge spaces are valid
        #[test]
        fn allowed_names_are_valid(name in "[A-Za-z0-9_-][A-Za-z0-9 _-]{0,20}[A-Za-z0-9_-]") {
            let rule = validate::NameRule::new().unwrap();
            prop_assert!(rule.is_valid(&name));
        }

        /// Property: any character outside the alphabet makes a name invalid
        #[test]
        fn foreign_characters_are_invalid(prefix in "[a-z]{0,5}", bad in "[./:@*]", suffix in "[a-z]{0,5}") {
            let rule = validate::NameRule::new().unwrap();
            let name = format!("{}{}{}", prefix, bad, suffix);
            prop_assert!(!rule.is_valid(&name));
        }

        /// Property: a leading or trailing space makes a name invalid
        #[test]
        fn edge_spaces_are_invalid(name in "[a-z]{1,10}", leading in any::<bool>()) {
            let rule = validate::NameRule::new().unwrap();
            let padded = if leading { format!(" {}", name) } else { format!("{} ", name) };
            prop_assert!(!rule.is_valid(&padded));
        }
    }
}
