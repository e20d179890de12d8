/// Recognition language offered by the language selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
    French,
    German,
    Chinese,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Chinese => "zh",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "en" => Some(Language::English),
            "es" => Some(Language::Spanish),
            "fr" => Some(Language::French),
            "de" => Some(Language::German),
            "zh" => Some(Language::Chinese),
            _ => None,
        }
    }

    pub fn all() -> Vec<Language> {
        vec![
            Language::English,
            Language::Spanish,
            Language::French,
            Language::German,
            Language::Chinese,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English (en-US)",
            Language::Spanish => "Español (es-ES)",
            Language::French => "Français (fr-FR)",
            Language::German => "Deutsch (de-DE)",
            Language::Chinese => "中文 (zh-CN)",
        }
    }

    /// Tag handed to the speech engine
    pub fn bcp47_tag(&self) -> &'static str {
        match self {
            Language::English => "en-US",
            Language::Spanish => "es-ES",
            Language::French => "fr-FR",
            Language::German => "de-DE",
            Language::Chinese => "zh-CN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_round_trip() {
        for lang in Language::all() {
            assert_eq!(Language::from_str(lang.as_str()), Some(lang));
        }
        assert_eq!(Language::from_str("EN"), Some(Language::English));
        assert_eq!(Language::from_str("pt"), None);
    }

    #[test]
    fn test_bcp47_tags() {
        assert_eq!(Language::English.bcp47_tag(), "en-US");
        assert_eq!(Language::Spanish.bcp47_tag(), "es-ES");
        assert_eq!(Language::Chinese.bcp47_tag(), "zh-CN");
    }
}
