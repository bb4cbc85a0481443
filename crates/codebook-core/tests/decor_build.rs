//! End-to-end builds from dataset-export XML.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use codebook_core::{BuildRequest, DecorBuilder, IssueKind, build};
use codebook_ingest::{
    CodebookSettings, DocumentSource, IdentifierResolver, IngestError, Result as IngestResult,
    SourceKind,
};
use codebook_model::{CodeDataType, CodebookTree, DataType, Item, NodeKind};
use codebook_registry::Registry;

struct MemorySource {
    datasets: BTreeMap<(String, String), String>,
    fetches: AtomicUsize,
}

impl MemorySource {
    fn new(datasets: &[(&str, &str)]) -> Self {
        Self {
            datasets: datasets
                .iter()
                .map(|(id, xml)| (((*id).to_string(), "nl-NL".to_string()), (*xml).to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl DocumentSource for MemorySource {
    fn dataset_xml(&self, _codebook: &str, dataset_id: &str, language: &str) -> IngestResult<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.datasets
            .get(&(dataset_id.to_string(), language.to_string()))
            .cloned()
            .ok_or_else(|| IngestError::MissingDocument {
                identifier: dataset_id.to_string(),
            })
    }

    fn flattened_archetype(&self, archetype_id: &str) -> IngestResult<String> {
        Err(IngestError::MissingDocument {
            identifier: archetype_id.to_string(),
        })
    }
}

impl IdentifierResolver for MemorySource {
    fn resolve(&self, _name: &str, _version: &str) -> IngestResult<Option<String>> {
        Ok(None)
    }
}

fn settings(groups_selectable: bool) -> CodebookSettings {
    CodebookSettings {
        name: "zib2020".to_string(),
        kind: SourceKind::Decor,
        server: "https://decor.example.org/".to_string(),
        groups_selectable,
        excluded_languages: Vec::new(),
    }
}

fn items(tree: &CodebookTree) -> Vec<&Item> {
    tree.walk().map(|(id, _)| tree.item(id)).collect()
}

fn leaf<'t>(tree: &'t CodebookTree, name: &str) -> &'t Item {
    items(tree)
        .into_iter()
        .find(|i| i.name == name && i.kind == NodeKind::Leaf)
        .unwrap_or_else(|| panic!("no leaf named {name}"))
}

#[test]
fn self_reference_terminates_with_one_placeholder() {
    let xml = r#"
        <dataset id="ds1" statusCode="final">
            <name language="nl-NL">Referenties</name>
            <concept id="g1" type="group" statusCode="final">
                <name language="nl-NL">Groep</name>
                <concept id="l1" type="item" statusCode="final">
                    <name language="nl-NL">Veld</name>
                    <valueDomain type="string"/>
                </concept>
                <concept id="g2" type="group" statusCode="final">
                    <name language="nl-NL">Terugverwijzing</name>
                    <inherit ref="g1"/>
                </concept>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", xml)]));
    let registry = Registry::new(source);

    let result =
        DecorBuilder::build(&registry, &settings(false), "ds1", "nl-NL").expect("build");

    let placeholders: Vec<&Item> = items(&result.tree)
        .into_iter()
        .filter(|i| i.kind == NodeKind::LeafInfo)
        .collect();
    assert_eq!(placeholders.len(), 1);
    assert!(placeholders[0].description.contains("infinite reference"));
    assert_eq!(result.count_of(IssueKind::ReferenceCycle), 1);

    // The reference was expanded exactly once before the guard tripped:
    // the leaf exists below the original group and below the expansion.
    let fields = items(&result.tree)
        .into_iter()
        .filter(|i| i.name == "Veld")
        .count();
    assert_eq!(fields, 2);
}

#[test]
fn blank_codes_get_synthetic_codes_in_encounter_order() {
    let xml = r#"
        <dataset id="ds1" statusCode="final">
            <concept id="l1" type="item" statusCode="final">
                <name language="nl-NL">Uitslag</name>
                <valueDomain type="code"/>
                <valueSet id="vs1">
                    <conceptList>
                        <concept code="1" displayName="A"/>
                        <concept code="" displayName="B"/>
                        <concept code="2" displayName="C"/>
                        <concept code="" displayName="D"/>
                    </conceptList>
                </valueSet>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", xml)]));
    let registry = Registry::new(source);

    let result =
        DecorBuilder::build(&registry, &settings(false), "ds1", "nl-NL").expect("build");
    let item = leaf(&result.tree, "Uitslag");

    assert!(item.has_code_list());
    assert_eq!(item.value_for_code("Code_1").expect("Code_1"), "B");
    assert_eq!(item.value_for_code("Code_2").expect("Code_2"), "D");
    assert_eq!(item.value_for_code("1").expect("1"), "A");
    // Two integer codes are present, but synthetic codes force strings.
    assert_eq!(item.code_data_type(), CodeDataType::String);
}

#[test]
fn same_key_built_twice_fetches_once_and_matches() {
    let xml = r#"
        <dataset id="ds1" statusCode="final">
            <concept id="g1" type="group" statusCode="final">
                <name language="nl-NL">Groep</name>
                <concept id="l1" type="item" statusCode="final">
                    <name language="nl-NL">Veld</name>
                    <valueDomain type="count"/>
                </concept>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", xml)]));
    let registry = Registry::new(Arc::clone(&source) as Arc<dyn DocumentSource>);
    let request = BuildRequest {
        document: "ds1".to_string(),
        language: "nl-NL".to_string(),
    };
    let resolver = MemorySource::new(&[]);

    let first = build(&registry, &resolver, &settings(false), &request).expect("first build");
    let second = build(&registry, &resolver, &settings(false), &request).expect("second build");

    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    let first_json = serde_json::to_string(&first.tree).expect("serialize first");
    let second_json = serde_json::to_string(&second.tree).expect("serialize second");
    assert_eq!(first_json, second_json);
}

#[test]
fn value_domain_list_wins_over_value_set_list() {
    let xml = r#"
        <dataset id="ds1" statusCode="final">
            <terminologyAssociation conceptId="c1" code="373066001"
                codeSystem="2.16.840.1.113883.6.96" displayName="Yes"
                codeSystemName="SNOMED CT"/>
            <concept id="l1" type="item" statusCode="final">
                <name language="nl-NL">Antwoord</name>
                <valueDomain type="code">
                    <conceptList>
                        <concept id="c1"><name language="nl-NL">Ja</name></concept>
                    </conceptList>
                </valueDomain>
                <valueSet id="vs1">
                    <conceptList>
                        <concept code="99" displayName="From value set"/>
                    </conceptList>
                </valueSet>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", xml)]));
    let registry = Registry::new(source);

    let result =
        DecorBuilder::build(&registry, &settings(false), "ds1", "nl-NL").expect("build");
    let item = leaf(&result.tree, "Antwoord");

    assert_eq!(item.codes(), vec!["373066001"]);
    assert_eq!(item.value_for_code("373066001").expect("code"), "Ja");
    assert_eq!(item.code_system_for_code("373066001").expect("code"), "SNOMED CT");
    assert!(!item.contains_code("99"));
}

#[test]
fn selectable_groups_get_wrapped() {
    let xml = r#"
        <dataset id="ds1" statusCode="final">
            <concept id="g1" type="group" statusCode="final">
                <name language="nl-NL">Lichamelijk onderzoek</name>
                <concept id="l1" type="item" statusCode="final">
                    <name language="nl-NL">Lengte</name>
                    <valueDomain type="quantity">
                        <property unit="cm" minInclude="0" maxInclude="250" fractionDigits="1"/>
                    </valueDomain>
                </concept>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", xml)]));
    let registry = Registry::new(source);

    let result = DecorBuilder::build(&registry, &settings(true), "ds1", "nl-NL").expect("build");
    let tree = &result.tree;

    // root -> wrapper group -> selectable group item -> field leaf
    let root_children = tree.node(tree.root()).children();
    assert_eq!(root_children.len(), 1);
    let wrapper = tree.node(root_children[0]);
    assert_eq!(wrapper.item.kind, NodeKind::Group);
    assert_eq!(wrapper.children().len(), 1);
    let selectable = tree.node(wrapper.children()[0]);
    assert_eq!(selectable.item.kind, NodeKind::Leaf);
    assert_eq!(selectable.item.name, "Lichamelijk onderzoek");
    let field = tree.item(selectable.children()[0]);
    assert_eq!(field.name, "Lengte");
    assert_eq!(field.data_type, DataType::Quantity);
    assert_eq!(field.units, "cm");
    assert_eq!(field.min, "0");
    assert_eq!(field.max, "250");
    assert_eq!(field.precision, "1");
}

#[test]
fn malformed_codelist_is_cleared_not_fatal() {
    let xml = r#"
        <dataset id="ds1" statusCode="final">
            <concept id="l1" type="item" statusCode="final">
                <name language="nl-NL">Kapot</name>
                <valueDomain type="code">
                    <conceptList>
                        <concept><name language="nl-NL">Zonder id</name></concept>
                    </conceptList>
                </valueDomain>
            </concept>
            <concept id="l2" type="item" statusCode="final">
                <name language="nl-NL">Heel</name>
                <valueDomain type="boolean"/>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", xml)]));
    let registry = Registry::new(source);

    let result =
        DecorBuilder::build(&registry, &settings(false), "ds1", "nl-NL").expect("build");

    let broken = leaf(&result.tree, "Kapot");
    assert!(!broken.has_code_list());
    assert_eq!(broken.data_type, DataType::String);
    assert_eq!(result.count_of(IssueKind::BrokenCodeList), 1);

    // The sibling still built normally.
    assert_eq!(leaf(&result.tree, "Heel").data_type, DataType::Boolean);
}

#[test]
fn cross_dataset_reference_expands_like_local() {
    let entry = r#"
        <dataset id="ds1" statusCode="final">
            <concept id="g1" type="group" statusCode="final">
                <name language="nl-NL">Verwijzing</name>
                <inherit ref="r1" dataset="ds2"/>
            </concept>
        </dataset>"#;
    let referenced = r#"
        <dataset id="ds2" statusCode="final">
            <concept id="r1" type="group" statusCode="final">
                <name language="nl-NL">Gedeelde groep</name>
                <concept id="r2" type="item" statusCode="final">
                    <name language="nl-NL">Gedeeld veld</name>
                    <valueDomain type="string"/>
                </concept>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", entry), ("ds2", referenced)]));
    let registry = Registry::new(source);

    let result =
        DecorBuilder::build(&registry, &settings(false), "ds1", "nl-NL").expect("build");

    assert_eq!(leaf(&result.tree, "Gedeeld veld").data_type, DataType::String);
    assert!(!result.has_issues());
}

#[test]
fn missing_referenced_dataset_degrades_to_placeholder() {
    let entry = r#"
        <dataset id="ds1" statusCode="final">
            <concept id="g1" type="group" statusCode="final">
                <name language="nl-NL">Verwijzing</name>
                <inherit ref="r1" dataset="nope"/>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", entry)]));
    let registry = Registry::new(source);

    let result =
        DecorBuilder::build(&registry, &settings(false), "ds1", "nl-NL").expect("build");
    assert_eq!(result.count_of(IssueKind::UnresolvedReference), 1);
    assert!(
        items(&result.tree)
            .iter()
            .any(|i| i.kind == NodeKind::LeafInfo)
    );
}

#[test]
fn missing_entry_document_is_fatal() {
    let source = Arc::new(MemorySource::new(&[]));
    let registry = Registry::new(source);
    assert!(DecorBuilder::build(&registry, &settings(false), "ds1", "nl-NL").is_err());
}

#[test]
fn deprecated_concepts_are_skipped() {
    let xml = r#"
        <dataset id="ds1" statusCode="final">
            <concept id="l1" type="item" statusCode="deprecated">
                <name language="nl-NL">Oud</name>
            </concept>
            <concept id="l2" type="item" statusCode="draft">
                <name language="nl-NL">Nieuw</name>
                <valueDomain type="string"/>
            </concept>
        </dataset>"#;
    let source = Arc::new(MemorySource::new(&[("ds1", xml)]));
    let registry = Registry::new(source);

    let result =
        DecorBuilder::build(&registry, &settings(false), "ds1", "nl-NL").expect("build");
    let names: Vec<&str> = items(&result.tree).iter().map(|i| i.name.as_str()).collect();
    assert!(names.contains(&"Nieuw"));
    assert!(!names.contains(&"Oud"));
}
