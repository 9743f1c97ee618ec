use thiserror::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SourceType {
    #[default]
    Json,
    Yml,
}

const JSON_EXT: &str = "json";
const YML_EXT: &str = "yml";
const YAML_EXT: &str = "yaml";

#[derive(Debug, Error, PartialEq)]
#[error("Unsupported config extension: {0}")]
pub struct UnsupportedConfigFormat(pub String);

impl std::str::FromStr for SourceType {
    type Err = UnsupportedConfigFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SourceType::Json),
            "yml" | "yaml" => Ok(SourceType::Yml),
            _ => Err(UnsupportedConfigFormat(s.to_string())),
        }
    }
}

impl SourceType {
    /// Detect the format from the file name
    pub fn detect(name: &str) -> Result<SourceType, UnsupportedConfigFormat> {
        let normalized = name.replace('\\', "/").to_lowercase();
        if normalized.ends_with(&format!(".{}", JSON_EXT)) {
            Ok(SourceType::Json)
        } else if normalized.ends_with(&format!(".{}", YML_EXT))
            || normalized.ends_with(&format!(".{}", YAML_EXT))
        {
            Ok(SourceType::Yml)
        } else {
            Err(UnsupportedConfigFormat(name.to_string()))
        }
    }
}
