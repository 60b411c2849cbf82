use serde::{Deserialize, Serialize};

/// A tracked cryptocurrency as the upstream price source knows it.
///
/// **Equality and hashing** are based solely on `id` (e.g. "bitcoin"),
/// NOT on the display fields. Two transactions that spell the name or
/// symbol differently still land in the same holding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Upstream asset id, lowercased (e.g., "bitcoin", "ethereum")
    pub id: String,

    /// Human-readable name (e.g., "Bitcoin")
    pub name: String,

    /// Ticker symbol, uppercased (e.g., "BTC")
    pub symbol: String,

    /// Logo URL for display
    #[serde(default)]
    pub image: String,
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Asset {}

impl std::hash::Hash for Asset {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Asset {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into().trim().to_lowercase(),
            name: name.into(),
            symbol: symbol.into().to_uppercase(),
            image: String::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }
}
