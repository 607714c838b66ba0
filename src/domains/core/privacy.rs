use crate::config::AppConfig;
use crate::domains::user::User;
use crate::errors::{DomainError, DomainResult};
use crate::types::DELETED_USER_PLACEHOLDER;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use sha2::Sha256;
use std::collections::BTreeSet;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Context mixed into tokens written over moderated references
pub const MODERATION_CONTEXT: &str = "moderation";

static SEPARATORS: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"[,.\-_+]"));
static DIGITS: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"[0-9]"));

/// Derives opaque, stable tokens that stand in for a user's id once the link is removed
#[derive(Clone)]
pub struct UserTokenGenerator {
    secret: String,
}

impl std::fmt::Debug for UserTokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserTokenGenerator").finish_non_exhaustive()
    }
}

impl UserTokenGenerator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            secret: config.user_token_secret.clone(),
        }
    }

    pub fn make_token(&self, user_id: Uuid, context: &str) -> DomainResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| DomainError::Internal(format!("Invalid user token secret: {}", e)))?;
        mac.update(format!("{}{}", user_id, context).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn moderation_token(&self, user_id: Uuid) -> DomainResult<String> {
        self.make_token(user_id, MODERATION_CONTEXT)
    }
}

fn compiled(pattern: &'static Lazy<Result<Regex, regex::Error>>) -> DomainResult<&'static Regex> {
    pattern
        .as_ref()
        .map_err(|e| DomainError::Internal(format!("Invalid scrub pattern: {}", e)))
}

/// Lowercased words of an identifier, split on separators and digits.
fn split_to_words(value: &str) -> DomainResult<BTreeSet<String>> {
    let separators = compiled(&SEPARATORS)?;
    let digits = compiled(&DIGITS)?;

    Ok(separators
        .split(value)
        .filter(|part| !part.is_empty())
        .flat_map(|part| digits.split(part))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect())
}

/// Fragments of a user's identity that may appear in free text
pub fn personal_fragments(user: &User) -> DomainResult<BTreeSet<String>> {
    let local_part = user.email.split('@').next().unwrap_or_default();
    let mut fragments = split_to_words(local_part)?;

    if let Some(username) = user.username.as_deref() {
        fragments.extend(split_to_words(username)?);
    }

    fragments.extend(
        [user.first_name.as_str(), user.last_name.as_str()]
            .into_iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty()),
    );

    Ok(fragments)
}

/// Replace every identity fragment of `user` in `text` with the deleted-user placeholder.
pub fn scrub_personal_data(text: &str, user: &User) -> DomainResult<String> {
    // longest first, so "annabel" is not split by an earlier "anna"
    let mut fragments: Vec<String> = personal_fragments(user)?.into_iter().collect();
    fragments.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));

    let mut cleaned = text.to_string();
    for fragment in fragments {
        let pattern = RegexBuilder::new(&regex::escape(&fragment))
            .case_insensitive(true)
            .build()
            .map_err(|e| DomainError::Internal(format!("Invalid scrub pattern: {}", e)))?;
        cleaned = pattern.replace_all(&cleaned, DELETED_USER_PLACEHOLDER).into_owned();
    }

    Ok(cleaned)
}
