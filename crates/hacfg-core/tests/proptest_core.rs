//! Property-based tests for hacfg-core using proptest.

use hacfg_core::args::{argv, group_by_keywords};
use hacfg_core::cib::ids::{find_unique_id, validate_id};
use hacfg_core::cib::resource::common::are_clone_meta_disabled;
use hacfg_core::cib::resource::group::place_resource;
use hacfg_core::{Document, SchemaVersion, Tag};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// Generator for syntactically valid ids.
fn any_id() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_.-]{0,12}"
}

fn document_with(ids: &[String]) -> Document {
    let mut doc = Document::new(SchemaVersion::LATEST);
    let resources = doc.get_resources().unwrap();
    for id in ids {
        doc.append_new_with_id(resources, Tag::Primitive, id);
    }
    doc
}

proptest! {
    #[test]
    fn prop_unique_id_absent_is_unchanged(id in any_id()) {
        let doc = document_with(&[]);
        prop_assert_eq!(find_unique_id(&doc, &id, &HashSet::new()), id);
    }

    #[test]
    fn prop_unique_id_takes_first_free_suffix(id in any_id(), taken in 0usize..6) {
        let mut ids = vec![id.clone()];
        ids.extend((1..=taken).map(|n| format!("{}-{}", id, n)));
        let doc = document_with(&ids);
        prop_assert_eq!(
            find_unique_id(&doc, &id, &HashSet::new()),
            format!("{}-{}", id, taken + 1)
        );
    }

    #[test]
    fn prop_valid_ids_pass(id in any_id()) {
        prop_assert!(validate_id(&id, "id").is_ok());
    }

    #[test]
    fn prop_leading_digit_fails(digit in 0u8..10, rest in "[a-z]{0,8}") {
        let id = format!("{}{}", digit, rest);
        prop_assert!(validate_id(&id, "id").is_err());
    }

    #[test]
    fn prop_grouping_keeps_every_token(
        tokens in proptest::collection::vec(
            prop_oneof![Just("op"), Just("meta"), Just("a=1"), Just("b"), Just("c=")],
            0..20,
        )
    ) {
        let args = argv(tokens.iter().copied());
        let grouped = group_by_keywords(&args, &["op", "meta"], Some("options")).unwrap();
        let kept: usize = ["options", "op", "meta"]
            .iter()
            .map(|k| grouped.get_args_flat(k).len())
            .sum();
        let expected = tokens.iter().filter(|t| **t != "op" && **t != "meta").count();
        prop_assert_eq!(kept, expected);
        let op_count = tokens.iter().filter(|t| **t == "op").count();
        prop_assert_eq!(grouped.get_args_groups("op").len(), op_count);
    }

    #[test]
    fn prop_clone_max_zero_disables(value in 0u32..1000, zeros in 0usize..3) {
        let text = format!("{}{}", "0".repeat(zeros), value);
        let meta: BTreeMap<&str, String> = [("clone-max", text)].into_iter().collect();
        prop_assert_eq!(are_clone_meta_disabled(&meta), value == 0);
    }

    #[test]
    fn prop_place_before_and_after(size in 1usize..6, target in 0usize..6, after in any::<bool>()) {
        let target = target % size;
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let group = doc.append_new_with_id(resources, Tag::Group, "G");
        let ids: Vec<String> = (0..size).map(|n| format!("R{}", n)).collect();
        for id in &ids {
            doc.append_new_with_id(group, Tag::Primitive, id);
        }
        let new = doc.append_new_with_id(resources, Tag::Primitive, "NEW");

        place_resource(&mut doc, group, new, Some(&ids[target]), after).unwrap();

        let order: Vec<String> = doc
            .children(group)
            .into_iter()
            .map(|c| doc.id_of(c).to_string())
            .collect();
        let new_index = order.iter().position(|id| id == "NEW").unwrap();
        let adjacent_index = order.iter().position(|id| *id == ids[target]).unwrap();
        if after {
            prop_assert_eq!(new_index, adjacent_index + 1);
        } else {
            prop_assert_eq!(new_index + 1, adjacent_index);
        }
        prop_assert_eq!(order.len(), size + 1);
    }

    #[test]
    fn prop_self_adjacency_fails(after in any::<bool>()) {
        let mut doc = Document::new(SchemaVersion::LATEST);
        let resources = doc.get_resources().unwrap();
        let group = doc.append_new_with_id(resources, Tag::Group, "G");
        let primitive = doc.append_new_with_id(resources, Tag::Primitive, "R");
        prop_assert!(place_resource(&mut doc, group, primitive, Some("R"), after).is_err());
    }
}
