/**
 * SNAPSHOT CACHE - Cache single-flight des statuts sérialisés, par catégorie
 *
 * RÔLE : Protéger le runtime du cluster des collectes répétées. Un slot par
 * catégorie ; le premier appelant qui rate lance la collecte, les suivants
 * attendent sur le même slot puis lisent son résultat.
 *
 * OPÉRATION : La collecte tourne dans une tâche qui possède le verrou du
 * slot jusqu'au stockage du résultat. Un appelant abandonné (client
 * déconnecté) ne libère donc jamais le slot en cours de collecte.
 *
 * EXPIRATION : TTL d'inactivité mesuré depuis le dernier accès. Les collectes
 * en échec ou vides ne sont jamais stockées.
 */

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3 * 60);

/// Période minimale du janitor (`tokio::time::interval` refuse zéro).
pub const MIN_JANITOR_PERIOD: Duration = Duration::from_secs(1);

/// Payload JSON sérialisé d'une catégorie, partagé en lecture seule.
pub type Snapshot = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    Controller,
    Agents,
    Plugins,
}

impl StatusCategory {
    pub const ALL: [StatusCategory; 3] = [
        StatusCategory::Controller,
        StatusCategory::Agents,
        StatusCategory::Plugins,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Controller => "controller",
            StatusCategory::Agents => "agents",
            StatusCategory::Plugins => "plugins",
        }
    }

    fn slot(self) -> usize {
        match self {
            StatusCategory::Controller => 0,
            StatusCategory::Agents => 1,
            StatusCategory::Plugins => 2,
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Entry {
    snapshot: Snapshot,
    last_access: Instant,
}

type Slot = Arc<Mutex<Option<Entry>>>;

pub struct SnapshotCache {
    idle_ttl: Duration,
    slots: [Slot; 3],
}

impl SnapshotCache {
    /// Un TTL nul désactiverait le cache : il est remplacé par le défaut.
    pub fn new(idle_ttl: Duration) -> Self {
        let idle_ttl = if idle_ttl.is_zero() {
            warn!(
                "[cache] idle TTL cannot be zero, using {}s",
                DEFAULT_IDLE_TTL.as_secs()
            );
            DEFAULT_IDLE_TTL
        } else {
            idle_ttl
        };

        Self {
            idle_ttl,
            slots: std::array::from_fn(|_| Arc::new(Mutex::new(None))),
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Retourne le snapshot vivant de `category`, ou lance `compute` pour en
    /// construire un. La collecte s'exécute dans une tâche détachée qui garde
    /// le slot verrouillé jusqu'à la fin ; les autres catégories ne sont pas
    /// bloquées.
    pub async fn get<F, Fut, E>(
        &self,
        category: StatusCategory,
        compute: F,
    ) -> Result<Option<Snapshot>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>, E>> + Send + 'static,
        E: fmt::Display + From<JoinError> + Send + 'static,
    {
        let mut slot = self.slots[category.slot()].clone().lock_owned().await;
        let now = Instant::now();

        if let Some(entry) = slot.as_mut() {
            if now.duration_since(entry.last_access) < self.idle_ttl {
                trace!("[cache] {} hit", category);
                entry.last_access = now;
                return Ok(Some(entry.snapshot.clone()));
            }
            debug!("[cache] {} expired", category);
            *slot = None;
        }

        debug!("[cache] {} miss, collecting", category);
        let collection = compute();
        let task: JoinHandle<Result<Option<Snapshot>, E>> = tokio::spawn(async move {
            match collection.await {
                Ok(Some(payload)) => {
                    let snapshot: Snapshot = Arc::from(payload);
                    *slot = Some(Entry {
                        snapshot: snapshot.clone(),
                        last_access: Instant::now(),
                    });
                    debug!("[cache] {} stored ({} bytes)", category, snapshot.len());
                    Ok(Some(snapshot))
                }
                Ok(None) => {
                    debug!("[cache] {} has nothing to store", category);
                    Ok(None)
                }
                Err(e) => {
                    warn!("[cache] {} collection failed, nothing cached: {}", category, e);
                    Err(e)
                }
            }
        });

        task.await.unwrap_or_else(|e| Err(E::from(e)))
    }

    /// Vrai si un snapshot vivant existe ; ne compte pas comme un accès.
    pub async fn contains(&self, category: StatusCategory) -> bool {
        let slot = self.slots[category.slot()].lock().await;
        slot.as_ref()
            .is_some_and(|entry| entry.last_access.elapsed() < self.idle_ttl)
    }

    /// Supprime les snapshots expirés. Les slots en cours de collecte sont ignorés.
    pub fn purge_expired(&self) -> usize {
        let mut purged = 0;
        for category in StatusCategory::ALL {
            let Ok(mut slot) = self.slots[category.slot()].try_lock() else {
                continue;
            };
            let expired = slot
                .as_ref()
                .is_some_and(|entry| entry.last_access.elapsed() >= self.idle_ttl);
            if expired {
                *slot = None;
                purged += 1;
                debug!("[cache] evicted idle {} snapshot", category);
            }
        }
        purged
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL)
    }
}

/// Libère périodiquement les snapshots expirés ; les lectures n'en dépendent pas.
pub fn spawn_cache_janitor(cache: Arc<SnapshotCache>, every: Duration) -> JoinHandle<()> {
    let every = every.max(MIN_JANITOR_PERIOD);
    debug!("[cache] starting janitor (every {}s)", every.as_secs());

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            cache.purge_expired();
        }
    })
}
