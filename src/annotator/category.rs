use serde::{Deserialize, Serialize};
use std::fmt;

/// Personal-data category, serialized as the short tag code the model emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "pn")]
    PersonalName,
    #[serde(rename = "i")]
    Institution,
    #[serde(rename = "c")]
    Company,
    #[serde(rename = "l")]
    Location,
    #[serde(rename = "d")]
    Date,
    #[serde(rename = "z")]
    Zipcode,
    #[serde(rename = "p")]
    Phone,
    #[serde(rename = "e")]
    Email,
    #[serde(rename = "cj")]
    CaseNumber,
    #[serde(rename = "a")]
    Act,
    #[serde(rename = "w")]
    Web,
    #[serde(rename = "m")]
    Money,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::PersonalName,
        Category::Institution,
        Category::Company,
        Category::Location,
        Category::Date,
        Category::Zipcode,
        Category::Phone,
        Category::Email,
        Category::CaseNumber,
        Category::Act,
        Category::Web,
        Category::Money,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Category::PersonalName => "pn",
            Category::Institution => "i",
            Category::Company => "c",
            Category::Location => "l",
            Category::Date => "d",
            Category::Zipcode => "z",
            Category::Phone => "p",
            Category::Email => "e",
            Category::CaseNumber => "cj",
            Category::Act => "a",
            Category::Web => "w",
            Category::Money => "m",
        }
    }

    pub fn from_code(code: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Categories the model is allowed to tag but which are always
    /// demoted to plain text on cleanup.
    pub fn is_omitted(self) -> bool {
        matches!(self, Category::Date | Category::Act | Category::Money)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
