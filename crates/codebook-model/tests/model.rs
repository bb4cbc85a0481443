//! Tests for codebook-model types.

use codebook_model::{
    BoundOperator, CodeDataType, CodeListEntry, CodebookTree, DataType, Item, NodeKind,
};

fn entry(code: &str, value: &str, system: &str) -> CodeListEntry {
    CodeListEntry {
        code: code.to_string(),
        value: value.to_string(),
        code_system: system.to_string(),
        description: String::new(),
    }
}

#[test]
fn projections_follow_entry_order() {
    let mut item = Item::new("severity_1", NodeKind::Leaf, "Severity");
    item.data_type = DataType::Code;
    item.push_code(entry("3", "Severe", "local"));
    item.push_code(entry("1", "Mild", "local"));
    item.push_code(entry("2", "Moderate", "local"));

    assert_eq!(item.codes(), vec!["3", "1", "2"]);
    assert_eq!(item.code_values(), vec!["Severe", "Mild", "Moderate"]);
    assert_eq!(item.code_systems(), vec!["local", "local", "local"]);

    item.sort_code_list();
    assert_eq!(item.codes(), vec!["1", "2", "3"]);
    assert_eq!(item.code_values(), vec!["Mild", "Moderate", "Severe"]);
}

#[test]
fn mixed_codes_sort_lexically_case_insensitive() {
    let mut item = Item::new("result_1", NodeKind::Leaf, "Result");
    item.push_code(entry("positive", "Positive", "local"));
    item.push_code(entry("Negative", "Negative", "local"));
    item.push_code(entry("12", "Twelve", "local"));
    assert_eq!(item.code_data_type(), CodeDataType::String);

    item.sort_code_list();
    assert_eq!(item.codes(), vec!["12", "Negative", "positive"]);
}

#[test]
fn defaults_match_model_contract() {
    let item = Item::new("x_1", NodeKind::Leaf, "X");
    assert_eq!(item.data_type, DataType::String);
    assert_eq!(item.units, "");
    assert_eq!(item.min, "");
    assert_eq!(item.min_operator, BoundOperator::None);
    assert_eq!(item.max_operator, BoundOperator::None);
    assert_eq!(item.precision, "0");
    assert!(item.ontology.is_none());
    assert!(!item.has_code_list());
}

#[test]
fn deep_tree_walks_depth_first() {
    let mut tree = CodebookTree::new("Codebook");
    let information = tree.attach(
        Item::new("info_1", NodeKind::Group, "Information"),
        tree.root(),
    );
    let person = tree.attach(Item::new("person_2", NodeKind::Group, "Person"), information);
    tree.attach(Item::new("sex_3", NodeKind::Leaf, "Sex"), person);
    tree.attach(Item::new("dob_4", NodeKind::Leaf, "Date of birth"), person);
    let outcome = tree.attach(Item::new("outcome_5", NodeKind::Group, "Outcome"), tree.root());
    tree.attach(Item::new("score_6", NodeKind::Leaf, "Score"), outcome);

    let names: Vec<&str> = tree.walk().map(|(id, _)| tree.item(id).name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Codebook",
            "Information",
            "Person",
            "Sex",
            "Date of birth",
            "Outcome",
            "Score"
        ]
    );
}
