//! Project type resolution.
//!
//! A project's type decides how its hours turn into revenue. It comes from,
//! in order of precedence: a stored override label, the project's tags
//! (matched by id, then by name), and finally heuristics on the project name.
//! Anything left over is [`ProjectType::Unclassified`].

use crate::schema::ProjectType;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a tag in the source system.
///
/// Synchronized rows carry tag ids both as numbers and as numeric strings;
/// both deserialize to the same `TagId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TagId(pub u64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for TagId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawTagId {
            Number(u64),
            Text(String),
        }

        match RawTagId::deserialize(deserializer)? {
            RawTagId::Number(n) => Ok(TagId(n)),
            RawTagId::Text(s) => s
                .trim()
                .parse::<u64>()
                .map(TagId)
                .map_err(|_| serde::de::Error::custom(format!("invalid tag id '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTag {
    pub id: TagId,
    #[serde(default)]
    pub name: String,
}

impl ProjectTag {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: TagId(id),
            name: name.into(),
        }
    }
}

/// Where a classification came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationSource {
    Override,
    Tag { id: TagId },
    NameHeuristic,
    /// Tags pointed at more than one project type.
    ConflictingTags,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub project_type: ProjectType,
    pub source: ClassificationSource,
}

/// Maps tags onto project types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagTable {
    #[serde(default)]
    by_id: BTreeMap<TagId, ProjectType>,
    #[serde(default)]
    by_name: BTreeMap<String, ProjectType>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that recognizes the tag names used for each project type.
    pub fn with_default_names() -> Self {
        let mut table = Self::new();
        for project_type in ProjectType::ALL {
            if project_type != ProjectType::Unclassified {
                table.insert_name(project_type.label(), project_type);
            }
        }
        table
    }

    pub fn insert_id(&mut self, id: TagId, project_type: ProjectType) -> &mut Self {
        self.by_id.insert(id, project_type);
        self
    }

    pub fn insert_name(&mut self, name: &str, project_type: ProjectType) -> &mut Self {
        self.by_name.insert(normalize(name), project_type);
        self
    }

    pub fn lookup(&self, tag: &ProjectTag) -> Option<ProjectType> {
        self.by_id
            .get(&tag.id)
            .or_else(|| self.by_name.get(&normalize(&tag.name)))
            .copied()
    }

    /// Resolves the type of a project.
    pub fn classify(
        &self,
        project_name: &str,
        tags: &[ProjectTag],
        override_label: Option<&str>,
    ) -> Classification {
        if let Some(label) = override_label.filter(|l| !l.trim().is_empty()) {
            match label.parse::<ProjectType>() {
                Ok(project_type) => {
                    return Classification {
                        project_type,
                        source: ClassificationSource::Override,
                    }
                }
                Err(e) => warn!("Ignoring override for '{}': {}", project_name, e),
            }
        }

        let matches: Vec<(TagId, ProjectType)> = tags
            .iter()
            .filter_map(|tag| self.lookup(tag).map(|t| (tag.id, t)))
            .collect();

        if let Some(&(first_id, first_type)) = matches.first() {
            if matches.iter().all(|(_, t)| *t == first_type) {
                return Classification {
                    project_type: first_type,
                    source: ClassificationSource::Tag { id: first_id },
                };
            }
            warn!(
                "Project '{}' carries tags for different project types",
                project_name
            );
            return Classification {
                project_type: ProjectType::Unclassified,
                source: ClassificationSource::ConflictingTags,
            };
        }

        match classify_by_name(project_name) {
            Some(project_type) => Classification {
                project_type,
                source: ClassificationSource::NameHeuristic,
            },
            None => Classification {
                project_type: ProjectType::Unclassified,
                source: ClassificationSource::Unresolved,
            },
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

// Order matters: "interne offerte" is internal work, not a quote.
const NAME_HINTS: [(&str, ProjectType); 5] = [
    ("intern", ProjectType::Intern),
    ("vaste prijs", ProjectType::FixedPrice),
    ("nacalculatie", ProjectType::TimeAndMaterials),
    ("contract", ProjectType::Contract),
    ("offerte", ProjectType::Quote),
];

fn classify_by_name(name: &str) -> Option<ProjectType> {
    let lowered = normalize(name);
    NAME_HINTS
        .iter()
        .find(|(hint, _)| lowered.contains(hint))
        .map(|(_, project_type)| *project_type)
}
