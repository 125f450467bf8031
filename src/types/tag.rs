use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use handle_errors::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(pub i32);

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub description: Option<String>,
    pub question_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub description: Option<String>,
}

/// 태그 이름은 소문자로 저장하고 공백을 포함할 수 없다.
pub fn normalize_name(raw: &str) -> Result<String, Error> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::Validation("Tag name is required".to_string()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(Error::Validation(
            "Tag name cannot contain whitespace".to_string(),
        ));
    }
    Ok(name)
}

impl NewTag {
    pub fn validate(self) -> Result<NewTag, Error> {
        let name = normalize_name(&self.name)?;

        Ok(NewTag {
            name,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_names_are_normalized() {
        let tag = NewTag {
            name: "  Rust ".to_string(),
            description: Some("  ".to_string()),
        }
        .validate()
        .unwrap();
        assert_eq!(tag.name, "rust");
        assert_eq!(tag.description, None);
    }

    #[test]
    fn lookup_names_match_stored_form() {
        assert_eq!(normalize_name(" TypeScript").unwrap(), "typescript");
        assert!(normalize_name("").is_err());
    }

    #[test]
    fn blank_or_spaced_names_are_rejected() {
        for name in ["", "  ", "two words"] {
            let tag = NewTag {
                name: name.to_string(),
                description: None,
            };
            assert!(matches!(tag.validate(), Err(Error::Validation(_))));
        }
    }
}
