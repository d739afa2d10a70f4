//! Access to phenotype (HPO) and gene (HGNC) vocabularies.
//!
//! The gene panel code only needs two capabilities from a vocabulary backend:
//! looking up a term by identifier, and resolving an identifier of unknown
//! origin.  Both are expressed as traits so that any backend can be plugged
//! in; `memory` provides one that is loaded from the HPO and HGNC flat files.

use std::{
    collections::BTreeMap,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

pub mod memory;

/// Label of the HPO vocabulary.
pub const HPO: &str = "hpo";
/// Label of the HGNC vocabulary.
pub const HGNC: &str = "hgnc";

/// Term property with the symbols of genes associated with a phenotype.
pub const ASSOCIATED_GENES: &str = "associated_genes";
/// Term property with the preferred (ENSEMBL) identifiers of a gene.
pub const ENSEMBL_GENE_ID: &str = "ensembl_gene_id";
/// Term property with the approved symbol of a gene.
pub const SYMBOL: &str = "symbol";
/// Term property with alias symbols of a gene.
pub const ALIAS_SYMBOL: &str = "alias_symbol";
/// Term property with previous symbols of a gene.
pub const PREV_SYMBOL: &str = "prev_symbol";

/// A term from a vocabulary.
///
/// Two terms are the same if their identifiers are the same.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VocabularyTerm {
    /// The term identifier, e.g., `HP:0001250` or `HGNC:1100`.
    pub id: String,
    /// The human readable name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// All other properties of the term.
    #[serde(default, flatten)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl VocabularyTerm {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style helper for setting a list-valued property.
    pub fn with_list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_list(key, values);
        self
    }

    /// Set a list-valued property, replacing any previous value.
    pub fn set_list<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|v| serde_json::Value::String(v.into()))
            .collect();
        self.properties
            .insert(key.to_string(), serde_json::Value::Array(values));
    }

    /// Raw access to a property.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Return a property as a list of strings.
    ///
    /// A missing property yields an empty list, a scalar string yields a
    /// one-element list, and non-string list elements are skipped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(serde_json::Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(value)) => vec![value.clone()],
            _ => Vec::new(),
        }
    }

    /// The name if set and not blank, the identifier otherwise.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.id,
        }
    }

    /// JSON representation with `id`, `name` and all properties.
    ///
    /// Keys are emitted in lexicographic order.
    pub fn to_json(&self) -> serde_json::Value {
        let mut fields = self.properties.clone();
        fields.insert("id".to_string(), self.id.clone().into());
        if let Some(name) = &self.name {
            fields.insert("name".to_string(), name.clone().into());
        }
        serde_json::Value::Object(fields.into_iter().collect())
    }
}

impl PartialEq for VocabularyTerm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for VocabularyTerm {}

impl Hash for VocabularyTerm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A single vocabulary, e.g., HPO or HGNC.
pub trait Vocabulary: Send + Sync {
    /// The vocabulary label, e.g., `"hpo"`.
    fn identifier(&self) -> &str;

    /// Look up a term; `None` if unknown.
    fn get_term(&self, id: &str) -> Option<VocabularyTerm>;
}

/// Gives access to all configured vocabularies.
pub trait VocabularyManager: Send + Sync {
    /// Return the vocabulary with the given label.
    fn get_vocabulary(&self, name: &str) -> Option<Arc<dyn Vocabulary>>;

    /// Labels of all known vocabularies, in lookup order.
    fn vocabulary_names(&self) -> Vec<String>;

    /// Resolve an identifier of unknown origin.
    ///
    /// The identifier prefix selects the vocabulary when it is known (`HP:`
    /// for HPO, `HGNC:` for HGNC); otherwise every vocabulary is tried in
    /// turn.
    fn resolve_term(&self, id: &str) -> Option<VocabularyTerm> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        if let Some(name) = vocabulary_for_prefix(id) {
            if let Some(vocabulary) = self.get_vocabulary(name) {
                return vocabulary.get_term(id);
            }
        }
        self.vocabulary_names()
            .iter()
            .filter_map(|name| self.get_vocabulary(name))
            .find_map(|vocabulary| vocabulary.get_term(id))
    }
}

/// Map an identifier prefix to the label of the vocabulary it belongs to.
fn vocabulary_for_prefix(id: &str) -> Option<&'static str> {
    let (prefix, _) = id.split_once(':')?;
    match prefix.to_ascii_uppercase().as_str() {
        "HP" => Some(HPO),
        "HGNC" => Some(HGNC),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::VocabularyTerm;

    #[test]
    fn equality_by_id_only() {
        let a = VocabularyTerm::new("HP:001", Some("a".into()));
        let b = VocabularyTerm::new("HP:001", Some("b".into()));
        assert_eq!(a, b);

        let set = [a, b].into_iter().collect::<HashSet<_>>();
        assert_eq!(set.len(), 1);
    }

    #[rstest::rstest]
    #[case(Some("Seizure"), "Seizure")]
    #[case(Some("  "), "HP:0001250")]
    #[case(None, "HP:0001250")]
    fn display_name(#[case] name: Option<&str>, #[case] expected: &str) {
        let term = VocabularyTerm::new("HP:0001250", name.map(str::to_string));
        assert_eq!(term.display_name(), expected);
    }

    #[test]
    fn get_list_variants() {
        let mut term = VocabularyTerm::new("HGNC:1", None).with_list("ensembl_gene_id", ["ENSG1"]);
        term.properties
            .insert("symbol".to_string(), serde_json::json!("A1BG"));
        term.properties
            .insert("mixed".to_string(), serde_json::json!(["x", 1, "y"]));

        assert_eq!(term.get_list("ensembl_gene_id"), vec!["ENSG1".to_string()]);
        assert_eq!(term.get_list("symbol"), vec!["A1BG".to_string()]);
        assert_eq!(term.get_list("mixed"), vec!["x".to_string(), "y".to_string()]);
        assert!(term.get_list("missing").is_empty());
    }

    #[test]
    fn to_json() {
        let term = VocabularyTerm::new("HP:001", Some("Term one".into()))
            .with_list("associated_genes", ["GENE_A"]);
        insta::assert_json_snapshot!(term.to_json(), @r###"
        {
          "associated_genes": [
            "GENE_A"
          ],
          "id": "HP:001",
          "name": "Term one"
        }
        "###);
    }

    #[test]
    fn to_json_without_name() {
        let term = VocabularyTerm::new("HP:002", None);
        assert_eq!(term.to_json(), serde_json::json!({"id": "HP:002"}));
    }
}
