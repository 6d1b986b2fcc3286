use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The fixed set of expense categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Category {
    #[default]
    Food,
    DailyGoods,
    DiningOut,
    Utilities,
    /// A household-specific tag, such as spending on a pet.
    CustomTag,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Food,
        Category::DailyGoods,
        Category::DiningOut,
        Category::Utilities,
        Category::CustomTag,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::DailyGoods => "daily-goods",
            Category::DiningOut => "dining-out",
            Category::Utilities => "utilities",
            Category::CustomTag => "custom-tag",
            Category::Other => "other",
        }
    }

    /// Label used by ledgers written before categories had ASCII keys.
    pub fn legacy_label(&self) -> &'static str {
        match self {
            Category::Food => "食品",
            Category::DailyGoods => "日用品",
            Category::DiningOut => "外食",
            Category::Utilities => "光熱費",
            Category::CustomTag => "こたちゃん",
            Category::Other => "その他",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::DailyGoods => "Daily goods",
            Category::DiningOut => "Dining out",
            Category::Utilities => "Utilities",
            Category::CustomTag => "Custom tag",
            Category::Other => "Other",
        }
    }

    /// Accepts the kebab-case key (case-insensitive, `_` allowed for `-`) or the legacy label.
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        let key = s.to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == key || c.legacy_label() == s)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Category::from_str(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category: {}", raw)))
    }
}
