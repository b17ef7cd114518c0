use crate::models::OrganizationType;

/// Supplies display labels for organization types in the active language.
pub trait Translator {
    fn organization_type(&self, organization_type: &OrganizationType) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    German,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Language::English),
            "de" | "german" | "deutsch" => Some(Language::German),
            _ => None,
        }
    }
}

/// Built-in labels for the well-known organization type keys. Unknown keys
/// fall back to the name the backend sent.
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    language: Language,
}

impl Labels {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    fn lookup(&self, key: &str) -> Option<&'static str> {
        let key = key.to_ascii_lowercase();
        let label = match (self.language, key.as_str()) {
            (Language::English, "school") => "School",
            (Language::English, "company") => "Company",
            (Language::English, "camp") => "Camp",
            (Language::English, "daycare") => "Daycare",
            (Language::English, "university") => "University",
            (Language::English, "care_home") => "Care home",
            (Language::German, "school") => "Schule",
            (Language::German, "company") => "Unternehmen",
            (Language::German, "camp") => "Ferienlager",
            (Language::German, "daycare") => "Kita",
            (Language::German, "university") => "Hochschule",
            (Language::German, "care_home") => "Pflegeheim",
            _ => return None,
        };
        Some(label)
    }
}

impl Translator for Labels {
    fn organization_type(&self, organization_type: &OrganizationType) -> String {
        self.lookup(&organization_type.key)
            .map(str::to_string)
            .unwrap_or_else(|| organization_type.name.clone())
    }
}
