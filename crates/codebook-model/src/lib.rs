pub mod enums;
pub mod error;
pub mod item;
pub mod tree;

pub use enums::{BoundOperator, CodeDataType, DataType, NodeKind};
pub use error::{ModelError, Result};
pub use item::{CodeListEntry, Item, OntologyBinding};
pub use tree::{CodebookTree, Node, NodeId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serializes() {
        let mut item = Item::new("2.16.840.1.113883_1", NodeKind::Leaf, "Sex");
        item.data_type = DataType::Code;
        item.push_code(CodeListEntry {
            code: "M".to_string(),
            value: "Male".to_string(),
            code_system: "AdministrativeGender".to_string(),
            description: String::new(),
        });
        let json = serde_json::to_string(&item).expect("serialize item");
        let round: Item = serde_json::from_str(&json).expect("deserialize item");
        assert_eq!(round.id, item.id);
        assert_eq!(round.codes(), vec!["M"]);
        assert_eq!(round.code_data_type(), CodeDataType::String);
    }

    #[test]
    fn tree_serializes() {
        let mut tree = CodebookTree::new("Demo");
        tree.attach(Item::new("a_1", NodeKind::Leaf, "A"), tree.root());
        let json = serde_json::to_string(&tree).expect("serialize tree");
        let round: CodebookTree = serde_json::from_str(&json).expect("deserialize tree");
        assert_eq!(round.len(), 2);
    }
}
