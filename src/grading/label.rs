use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use super::error::{GradingError, GradingResult};

/// Canonical quality grades, declared from most to least demanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Grade {
    #[serde(rename = "Retenido")]
    Retenido,
    #[serde(rename = "Calidad Standard")]
    Standard,
    #[serde(rename = "Calidad Superior")]
    Superior,
}

impl Grade {
    pub const MOST_DEMANDING: Grade = Grade::Retenido;
    pub const LEAST_DEMANDING: Grade = Grade::Superior;

    /// Lower rank wins aggregation.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Retenido => 0,
            Self::Standard => 1,
            Self::Superior => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retenido => "Retenido",
            Self::Standard => "Calidad Standard",
            Self::Superior => "Calidad Superior",
        }
    }

    /// Maps every historical spelling onto one canonical grade. This is the
    /// only place label text is interpreted.
    pub fn from_name(raw: &str) -> GradingResult<Self> {
        let collapsed = raw
            .split_whitespace()
            .collect::<Vec<&str>>()
            .join(" ")
            .to_lowercase();
        let bare = collapsed
            .strip_prefix("calidad ")
            .unwrap_or(collapsed.as_str());

        match bare {
            "retenido" => Ok(Self::Retenido),
            "standard" => Ok(Self::Standard),
            "superior" => Ok(Self::Superior),
            _ => Err(GradingError::UnknownLabel {
                label: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lot-level outcome: a grade, or nothing measured yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LotLabel {
    Graded(Grade),
    NotAnalyzed,
}

impl LotLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graded(grade) => grade.as_str(),
            Self::NotAnalyzed => "No analizado",
        }
    }

    pub fn grade(self) -> Option<Grade> {
        match self {
            Self::Graded(grade) => Some(grade),
            Self::NotAnalyzed => None,
        }
    }
}

impl fmt::Display for LotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LotLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLabel {
    pub id: i64,
    pub name: String,
    pub grade: Grade,
}

/// Stored label rows resolved onto canonical grades. Several rows may share a
/// grade (synonyms); the lowest id is used when writing.
#[derive(Debug, Clone)]
pub struct LabelCatalog {
    labels: Vec<CatalogLabel>,
    by_id: BTreeMap<i64, Grade>,
    write_ids: BTreeMap<Grade, i64>,
}

impl LabelCatalog {
    pub fn from_rows<I>(rows: I) -> GradingResult<Self>
    where
        I: IntoIterator<Item = (i64, String)>,
    {
        let mut labels = Vec::new();
        let mut by_id = BTreeMap::new();
        let mut write_ids = BTreeMap::<Grade, i64>::new();

        for (id, name) in rows {
            let grade = Grade::from_name(&name)?;
            by_id.insert(id, grade);
            write_ids
                .entry(grade)
                .and_modify(|current| *current = (*current).min(id))
                .or_insert(id);
            labels.push(CatalogLabel { id, name, grade });
        }

        labels.sort_by(|a, b| {
            a.grade
                .precedence()
                .cmp(&b.grade.precedence())
                .then(a.id.cmp(&b.id))
        });

        Ok(Self {
            labels,
            by_id,
            write_ids,
        })
    }

    pub fn all(&self) -> &[CatalogLabel] {
        &self.labels
    }

    pub fn normalize(&self, raw: &str) -> GradingResult<Grade> {
        Grade::from_name(raw)
    }

    pub fn precedence(&self, raw: &str) -> GradingResult<u8> {
        self.normalize(raw).map(Grade::precedence)
    }

    pub fn grade_for_id(&self, id: i64) -> GradingResult<Grade> {
        self.by_id
            .get(&id)
            .copied()
            .ok_or_else(|| GradingError::UnknownLabel {
                label: format!("label_id={id}"),
            })
    }

    pub fn id_for(&self, grade: Grade) -> GradingResult<i64> {
        self.write_ids
            .get(&grade)
            .copied()
            .ok_or_else(|| GradingError::UnknownLabel {
                label: grade.as_str().to_string(),
            })
    }
}

pub fn most_demanding(labels: &[Grade]) -> Option<Grade> {
    labels.iter().copied().min_by_key(|grade| grade.precedence())
}

/// True only for a non-empty set where every entry equals `target`.
pub fn all_agree(labels: &[Grade], target: Grade) -> bool {
    !labels.is_empty() && labels.iter().all(|grade| *grade == target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_catalog() -> LabelCatalog {
        LabelCatalog::from_rows(vec![
            (1, "Retenido".to_string()),
            (2, "Calidad Standard".to_string()),
            (3, "Calidad Superior".to_string()),
        ])
        .expect("seed labels are canonical")
    }

    #[test]
    fn synonyms_normalize_to_one_grade() {
        assert_eq!(Grade::from_name("Standard").unwrap(), Grade::Standard);
        assert_eq!(
            Grade::from_name("Calidad Standard").unwrap(),
            Grade::Standard
        );
        assert_eq!(
            Grade::from_name("  calidad   SUPERIOR ").unwrap(),
            Grade::Superior
        );
        assert_eq!(Grade::from_name("Superior").unwrap(), Grade::Superior);
        assert_eq!(Grade::from_name("RETENIDO").unwrap(), Grade::Retenido);
    }

    #[test]
    fn unknown_label_name_is_rejected() {
        let err = Grade::from_name("Premium").unwrap_err();
        assert!(matches!(err, GradingError::UnknownLabel { ref label } if label == "Premium"));
        assert!(Grade::from_name("Calidad").is_err());
        assert!(Grade::from_name("").is_err());
    }

    #[test]
    fn precedence_orders_retenido_first() {
        let catalog = seeded_catalog();
        assert_eq!(catalog.precedence("Retenido").unwrap(), 0);
        assert_eq!(catalog.precedence("Standard").unwrap(), 1);
        assert_eq!(catalog.precedence("Calidad Standard").unwrap(), 1);
        assert_eq!(catalog.precedence("Calidad Superior").unwrap(), 2);

        let names = catalog
            .all()
            .iter()
            .map(|label| label.grade)
            .collect::<Vec<_>>();
        assert_eq!(names, vec![Grade::Retenido, Grade::Standard, Grade::Superior]);
    }

    #[test]
    fn catalog_with_synonym_rows_writes_lowest_id() {
        let catalog = LabelCatalog::from_rows(vec![
            (7, "Calidad Standard".to_string()),
            (4, "Standard".to_string()),
            (1, "Retenido".to_string()),
        ])
        .unwrap();

        assert_eq!(catalog.grade_for_id(7).unwrap(), Grade::Standard);
        assert_eq!(catalog.grade_for_id(4).unwrap(), Grade::Standard);
        assert_eq!(catalog.id_for(Grade::Standard).unwrap(), 4);
        assert!(catalog.id_for(Grade::Superior).is_err());
        assert!(catalog.grade_for_id(99).is_err());
    }

    #[test]
    fn catalog_rejects_unknown_row() {
        let result = LabelCatalog::from_rows(vec![(1, "Descartado".to_string())]);
        assert!(matches!(result, Err(GradingError::UnknownLabel { .. })));
    }

    #[test]
    fn most_demanding_picks_lowest_rank() {
        assert_eq!(
            most_demanding(&[Grade::Superior, Grade::Retenido, Grade::Standard]),
            Some(Grade::Retenido)
        );
        assert_eq!(
            most_demanding(&[Grade::Superior, Grade::Standard]),
            Some(Grade::Standard)
        );
        assert_eq!(most_demanding(&[]), None);
    }

    #[test]
    fn all_agree_requires_non_empty_unanimity() {
        assert!(all_agree(&[Grade::Superior, Grade::Superior], Grade::Superior));
        assert!(!all_agree(&[Grade::Superior, Grade::Standard], Grade::Superior));
        assert!(!all_agree(&[], Grade::Superior));
    }

    #[test]
    fn lot_label_serializes_display_name() {
        let graded = serde_json::to_string(&LotLabel::Graded(Grade::Standard)).unwrap();
        assert_eq!(graded, "\"Calidad Standard\"");
        let pending = serde_json::to_string(&LotLabel::NotAnalyzed).unwrap();
        assert_eq!(pending, "\"No analizado\"");
    }
}
