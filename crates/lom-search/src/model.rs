use lom_registry::ResourceKind;
use serde::{Deserialize, Serialize};

/// Entity kinds a search can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    Tube,
    SpinColumn,
    Order,
}

impl Model {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "tube" => Some(Model::Tube),
            "spin_column" => Some(Model::SpinColumn),
            "order" => Some(Model::Order),
            _ => None,
        }
    }

    /// Singular name: the wrapper key of each result entry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Tube => "tube",
            Model::SpinColumn => "spin_column",
            Model::Order => "order",
        }
    }

    /// Plural name: the list key of a result page.
    pub fn plural(&self) -> &'static str {
        match self {
            Model::Tube => "tubes",
            Model::SpinColumn => "spin_columns",
            Model::Order => "orders",
        }
    }

    /// The registry kind for resource models; `None` for `order`.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self {
            Model::Tube => Some(ResourceKind::Tube),
            Model::SpinColumn => Some(ResourceKind::SpinColumn),
            Model::Order => None,
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
