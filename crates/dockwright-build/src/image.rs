//! Image naming
//!
//! Registry path policy: `host/org/slug(repository)`.
//! Tag policy: primary tag `<commit>.<environment>`; alias `latest` for
//! production, `latest.<environment>` everywhere else.

use dockwright_core::{Artifacts, CoreError, keys};

pub const PRODUCTION: &str = "production";

/// Registry host and organization the image is published under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTarget {
    pub host: String,
    pub org: String,
}

impl RegistryTarget {
    pub fn from_artifacts(artifacts: &Artifacts) -> Result<Self, CoreError> {
        Ok(Self {
            host: artifacts.require(keys::HOST)?.value.clone(),
            org: artifacts.require(keys::ORG)?.value.clone(),
        })
    }
}

/// Lower-case, fold Latin diacritics and collapse every run of other
/// characters into a single `-`
///
/// # Examples
/// - `acme/app` -> `acme-app`
/// - `Acme/My_App` -> `acme-my-app`
/// - `Café/Straße` -> `cafe-strasse`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    let mut buf = [0u8; 4];
    for c in name.chars() {
        let part = if c.is_ascii_alphanumeric() {
            &*c.to_ascii_lowercase().encode_utf8(&mut buf)
        } else if let Some(folded) = fold_latin(c) {
            folded
        } else {
            pending_separator = true;
            continue;
        };
        if pending_separator && !slug.is_empty() {
            slug.push('-');
        }
        pending_separator = false;
        slug.push_str(part);
    }
    slug
}

/// ASCII spelling of accented Latin letters
fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'À'..='Å' | 'à'..='å' | 'Ā'..='ą' => "a",
        'Æ' | 'æ' => "ae",
        'Ç' | 'ç' | 'Ć'..='č' => "c",
        'Ď'..='đ' | 'Ð' | 'ð' => "d",
        'È'..='Ë' | 'è'..='ë' | 'Ē'..='ě' => "e",
        'Ĝ'..='ģ' => "g",
        'Ĥ'..='ħ' => "h",
        'Ì'..='Ï' | 'ì'..='ï' | 'Ĩ'..='ı' => "i",
        'Ĵ' | 'ĵ' => "j",
        'Ķ' | 'ķ' => "k",
        'Ĺ'..='ł' => "l",
        'Ñ' | 'ñ' | 'Ń'..='ň' => "n",
        'Ò'..='Ö' | 'Ø' | 'ò'..='ö' | 'ø' | 'Ō'..='ő' => "o",
        'Œ' | 'œ' => "oe",
        'Ŕ'..='ř' => "r",
        'Ś'..='š' => "s",
        'ß' => "ss",
        'Ţ'..='ŧ' => "t",
        'Þ' | 'þ' => "th",
        'Ù'..='Ü' | 'ù'..='ü' | 'Ũ'..='ų' => "u",
        'Ŵ' | 'ŵ' => "w",
        'Ý' | 'ý' | 'ÿ' | 'Ŷ'..='Ÿ' => "y",
        'Ź'..='ž' => "z",
        _ => return None,
    };
    Some(folded)
}

pub fn primary_tag(commit: &str, environment: &str) -> String {
    format!("{}.{}", commit, environment)
}

pub fn alias_tag(environment: &str) -> String {
    if environment == PRODUCTION {
        "latest".to_string()
    } else {
        format!("latest.{}", environment)
    }
}

/// Check a tag against Docker's tag grammar
///
/// At most 128 characters of `[A-Za-z0-9_.-]`, not starting with `.` or `-`.
pub fn validate_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() {
        return Err("(empty)".to_string());
    }

    if tag.len() > 128 {
        return Err(format!("Tag too long ({} characters, max 128)", tag.len()));
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(tag.to_string());
    }

    for c in tag.chars() {
        if !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_' {
            return Err(format!("Invalid character '{}' in tag: {}", c, tag));
        }
    }

    Ok(())
}

/// Fully qualified image name with both policy tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    repository_path: String,
    primary_tag: String,
    alias_tag: String,
}

impl ImageReference {
    pub fn new(target: &RegistryTarget, repository: &str, commit: &str, environment: &str) -> Self {
        Self {
            repository_path: format!("{}/{}/{}", target.host, target.org, slugify(repository)),
            primary_tag: primary_tag(commit, environment),
            alias_tag: alias_tag(environment),
        }
    }

    /// `host/org/slug`, without a tag
    pub fn repository_path(&self) -> &str {
        &self.repository_path
    }

    pub fn primary_tag(&self) -> &str {
        &self.primary_tag
    }

    pub fn alias_tag(&self) -> &str {
        &self.alias_tag
    }

    /// `host/org/slug:<commit>.<environment>`
    pub fn primary(&self) -> String {
        format!("{}:{}", self.repository_path, self.primary_tag)
    }

    pub fn alias(&self) -> String {
        format!("{}:{}", self.repository_path, self.alias_tag)
    }

    /// Both tags must be valid before anything is built
    pub fn validate(&self) -> Result<(), String> {
        validate_tag(&self.primary_tag)?;
        validate_tag(&self.alias_tag)
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository_path, self.primary_tag)
    }
}
