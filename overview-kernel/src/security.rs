/**
 * ACCESS GATE - Identités, permissions et contexte d'exécution élevé
 *
 * RÔLE : Décider si un appelant peut lire le status overview avant tout
 * travail du cache ou du collecteur, et fournir le contexte système sous
 * lequel la collecte énumère tout le cluster.
 *
 * SÉCURITÉ :
 * - l'en-tête x-api-key désigne une identité nommée et ses permissions
 * - Administer implique Read
 * - l'identité système ne vient jamais d'une requête
 */

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{trace, warn};

use crate::config::ApiKeyConf;
use crate::error::StatusError;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Administer,
}

impl Permission {
    /// Vrai si détenir `self` accorde `other`.
    pub fn implies(self, other: Permission) -> bool {
        self == other || self == Permission::Administer
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => f.write_str("read"),
            Permission::Administer => f.write_str("administer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(String),
    System,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Anonymous => f.write_str("anonymous"),
            Identity::User(name) => f.write_str(name),
            Identity::System => f.write_str("SYSTEM"),
        }
    }
}

pub trait PermissionEvaluator: Send + Sync {
    fn has_permission(&self, identity: &Identity, permission: Permission) -> bool;

    fn has_read_permission(&self, identity: &Identity) -> bool {
        self.has_permission(identity, Permission::Read)
    }

    fn require(&self, identity: &Identity, permission: Permission) -> Result<(), StatusError> {
        if self.has_permission(identity, permission) {
            Ok(())
        } else {
            warn!("[acl] {} denied {} permission", identity, permission);
            Err(StatusError::Unauthorized(permission))
        }
    }

    fn require_read_permission(&self, identity: &Identity) -> Result<(), StatusError> {
        self.require(identity, Permission::Read)
    }
}

/// Évaluateur de permissions adossé aux clés API de la config.
#[derive(Debug, Default, Clone)]
pub struct ApiKeyPermissions {
    // clé -> nom d'identité
    keys: HashMap<String, String>,
    grants: HashMap<String, Vec<Permission>>,
}

impl ApiKeyPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(api_keys: &HashMap<String, ApiKeyConf>) -> Self {
        api_keys.iter().fold(Self::new(), |acc, (name, conf)| {
            acc.with_key(name, &conf.key, &conf.permissions)
        })
    }

    /// Les clés vides sont ignorées : une variable non définie n'ouvre jamais l'API.
    pub fn with_key(mut self, name: &str, key: &str, permissions: &[Permission]) -> Self {
        if key.is_empty() {
            warn!("[acl] ignoring empty API key for '{}'", name);
            return self;
        }
        self.keys.insert(key.to_string(), name.to_string());
        self.grants.insert(name.to_string(), permissions.to_vec());
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn identify(&self, headers: &HeaderMap) -> Identity {
        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|key| self.keys.get(key))
            .map(|name| Identity::User(name.clone()))
            .unwrap_or(Identity::Anonymous)
    }
}

impl PermissionEvaluator for ApiKeyPermissions {
    fn has_permission(&self, identity: &Identity, permission: Permission) -> bool {
        match identity {
            Identity::System => true,
            Identity::Anonymous => false,
            Identity::User(name) => self
                .grants
                .get(name)
                .is_some_and(|granted| granted.iter().any(|p| p.implies(permission))),
        }
    }
}

/// Identité sous laquelle le runtime du cluster est interrogé.
///
/// La collecte tourne toujours en [`ExecutionContext::system`] ; l'identité
/// de l'appelant ne compte que pour le contrôle d'accès.
#[derive(Debug)]
pub struct ExecutionContext {
    identity: Identity,
}

impl ExecutionContext {
    pub fn system() -> Self {
        trace!("[acl] entering system context");
        Self { identity: Identity::System }
    }

    pub fn as_identity(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_system(&self) -> bool {
        self.identity == Identity::System
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if self.is_system() {
            trace!("[acl] leaving system context");
        }
    }
}

/// Exécute `f` sous le contexte système, libéré au retour de `f`.
pub fn with_elevated_context<T>(f: impl FnOnce(&ExecutionContext) -> T) -> T {
    let ctx = ExecutionContext::system();
    f(&ctx)
}
