//! Réglages du lien overview
//!
//! Le lien overview pointe vers le dashboard qui consomme cette API. Son
//! schéma et son autorité ("link root") forment l'origine autorisée en CORS.

use axum::http::Uri;
use serde::Serialize;

use crate::error::StatusError;

pub const LINK_ICON: &str = "monitor.png";
pub const LINK_DISPLAY_NAME: &str = "Status Overview";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverviewSettings {
    overview_link: String,
}

/// Entrée de navigation vers le dashboard configuré.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAction {
    pub icon_file_name: &'static str,
    pub display_name: &'static str,
    pub url_name: String,
}

impl OverviewSettings {
    pub fn with_link(link: Option<&str>) -> Result<Self, StatusError> {
        let mut settings = Self::default();
        settings.set_overview_link(link)?;
        Ok(settings)
    }

    pub fn overview_link(&self) -> &str {
        &self.overview_link
    }

    /// `scheme://authority` du lien overview, vide si non défini.
    pub fn link_root(&self) -> String {
        if self.overview_link.is_empty() {
            return String::new();
        }
        self.overview_link
            .parse::<Uri>()
            .ok()
            .and_then(|uri| Some(format!("{}://{}", uri.scheme_str()?, uri.authority()?)))
            .unwrap_or_default()
    }

    /// Stocke le lien nettoyé des espaces. Vide, il efface le lien ; sinon il
    /// doit être une URL absolue valide, faute de quoi l'ancien est conservé.
    pub fn set_overview_link(&mut self, link: Option<&str>) -> Result<(), StatusError> {
        let link = link.unwrap_or_default().trim();
        check_overview_link(link)?;
        self.overview_link = link.to_string();
        Ok(())
    }

    pub fn link_action(&self) -> Option<LinkAction> {
        if self.overview_link.is_empty() {
            return None;
        }
        Some(LinkAction {
            icon_file_name: LINK_ICON,
            display_name: LINK_DISPLAY_NAME,
            url_name: self.overview_link.clone(),
        })
    }
}

pub fn check_overview_link(link: &str) -> Result<(), StatusError> {
    if link.is_empty() || is_valid_url(link) {
        Ok(())
    } else {
        Err(StatusError::InvalidLink(link.to_string()))
    }
}

pub fn is_valid_url(url: &str) -> bool {
    match url.chars().next() {
        None => return false,
        Some(c) if c.is_whitespace() => return false,
        Some(_) => {}
    }

    let Ok(uri) = url.parse::<Uri>() else {
        return false;
    };
    let scheme_ok = uri
        .scheme_str()
        .is_some_and(|s| s.starts_with(|c: char| c.is_ascii_alphabetic()));
    let host_ok = uri.authority().is_some_and(|a| !a.host().is_empty());
    scheme_ok && host_ok
}
