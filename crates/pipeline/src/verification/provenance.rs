//! Provenance categories used by the triangulation rule.
//!
//! This lookup is independent of [`crate::ExtractionTier`]: a deep-tier source
//! such as El Comercio is `local` here, while Reuters is an unknown tier but an
//! `international_agency` provenance.

use serde::{Deserialize, Serialize};

use crate::evidence::contains_label;
use crate::SourceName;

/// Triangulation category of a provenance label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceCategory {
    /// Governments, ministries, governing bodies and multilateral institutions.
    Official,
    /// Wire services.
    InternationalAgency,
    /// Domestic outlets.
    Local,
}

impl ProvenanceCategory {
    /// Every category, in the order the triangulation rule reports them.
    pub const ALL: [ProvenanceCategory; 3] = [
        ProvenanceCategory::Official,
        ProvenanceCategory::InternationalAgency,
        ProvenanceCategory::Local,
    ];

    /// Feedback phrase naming the missing category.
    pub fn missing_phrase(self) -> &'static str {
        match self {
            ProvenanceCategory::Official => "need an official source",
            ProvenanceCategory::InternationalAgency => "need an international-agency source",
            ProvenanceCategory::Local => "need a local source",
        }
    }
}

impl std::fmt::Display for ProvenanceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProvenanceCategory::Official => "official",
            ProvenanceCategory::InternationalAgency => "international_agency",
            ProvenanceCategory::Local => "local",
        };
        f.write_str(s)
    }
}

/// Lookup from provenance label to [`ProvenanceCategory`].
///
/// Exact labels are matched case-insensitively. Official labels additionally
/// match by keyword (`government`, `ministry`, `ministerio`, `gobierno`) so
/// that "Ministry of Health" or "Gobierno del Perú" need no explicit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceCatalog {
    pub official: Vec<String>,
    pub official_keywords: Vec<String>,
    pub international_agency: Vec<String>,
    pub local: Vec<String>,
}

impl Default for ProvenanceCatalog {
    fn default() -> Self {
        let labels = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            official: labels(&[
                "FIFA",
                "United Nations",
                "UN",
                "ONU",
                "WHO",
                "OMS",
                "World Bank",
                "Banco Mundial",
                "IMF",
                "FMI",
            ]),
            official_keywords: labels(&["government", "ministry", "gobierno", "ministerio"]),
            international_agency: labels(&[
                "Reuters",
                "Associated Press",
                "AP",
                "AFP",
                "Agence France-Presse",
                "EFE",
                "ANSA",
                "DPA",
                "Xinhua",
                "Bloomberg",
            ]),
            local: labels(&[
                "La República",
                "El Comercio",
                "Infobae",
                "RPP",
                "Perú21",
                "Gestión",
                "Correo",
            ]),
        }
    }
}

impl ProvenanceCatalog {
    /// Classifies a provenance label, or `None` if it is in no category.
    pub fn classify(&self, provenance: &SourceName) -> Option<ProvenanceCategory> {
        let label = provenance.as_str();
        if contains_label(&self.official, label) || self.matches_official_keyword(label) {
            Some(ProvenanceCategory::Official)
        } else if contains_label(&self.international_agency, label) {
            Some(ProvenanceCategory::InternationalAgency)
        } else if contains_label(&self.local, label) {
            Some(ProvenanceCategory::Local)
        } else {
            None
        }
    }

    fn matches_official_keyword(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.official_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && label.contains(&k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(label: &str) -> Option<ProvenanceCategory> {
        ProvenanceCatalog::default().classify(&SourceName::new(label).unwrap())
    }

    #[test]
    fn test_default_catalog_categories() {
        assert_eq!(classify("FIFA"), Some(ProvenanceCategory::Official));
        assert_eq!(classify("reuters"), Some(ProvenanceCategory::InternationalAgency));
        assert_eq!(classify("EL COMERCIO"), Some(ProvenanceCategory::Local));
        assert_eq!(classify("NewsAPI"), None);
    }

    #[test]
    fn test_official_keywords_match_inside_labels() {
        assert_eq!(classify("Ministry of Health"), Some(ProvenanceCategory::Official));
        assert_eq!(classify("Gobierno del Perú"), Some(ProvenanceCategory::Official));
    }

    #[test]
    fn test_missing_phrases() {
        assert_eq!(
            ProvenanceCategory::InternationalAgency.missing_phrase(),
            "need an international-agency source"
        );
    }
}
