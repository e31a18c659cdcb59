//! script.rs — Scripted responder: hand-authored trigger patterns with
//! canned reply variants, compiled from TOML.
//!
//! Triggers match in file order and the first hit wins. The reply variant
//! for a hit is a stable hash of (user id, message), so the same user asking
//! the same thing gets the same line back. A trigger's confidence decides
//! whether the arbiter short-circuits on it or lets it compete with the
//! generative providers.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

use regex::Regex;
use serde::Deserialize;

// --- env defaults & names ---
pub const DEFAULT_SCRIPT_CONFIG_PATH: &str = "config/script.toml";
pub const ENV_SCRIPT_CONFIG_PATH: &str = "SCRIPT_CONFIG_PATH";

/// Compiled-in copy of the shipped trigger file, used when no config file is
/// readable at runtime.
const BUILTIN_SCRIPT: &str = include_str!("../config/script.toml");

fn default_trigger_confidence() -> f32 {
    1.0
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptRoot {
    #[serde(default)]
    pub triggers: Vec<TriggerCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerCfg {
    pub id: String,
    pub pattern: String, // regex
    pub replies: Vec<String>,
    /// Confidence carried by a match, in <0.0, 1.0>. Above the arbiter's
    /// short-circuit threshold the reply skips the providers entirely.
    #[serde(default = "default_trigger_confidence")]
    pub confidence: f32,
}

/* ----------------------------
Compiled engine
---------------------------- */

#[derive(Debug)]
struct CompiledTrigger {
    cfg: TriggerCfg,
    re: Regex,
}

/// A scripted match: the chosen reply variant plus trigger metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptReply {
    pub trigger_id: String,
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug)]
pub struct ScriptEngine {
    triggers: Vec<CompiledTrigger>,
}

impl ScriptEngine {
    /// Load from the TOML file named by `SCRIPT_CONFIG_PATH`, defaulting to
    /// `config/script.toml`.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_SCRIPT_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCRIPT_CONFIG_PATH));

        let content = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read script config at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: ScriptRoot = toml::from_str(toml_str)?;
        let triggers = cfg
            .triggers
            .iter()
            .cloned()
            .map(|t| {
                if t.replies.is_empty() {
                    return Err(anyhow::anyhow!("trigger `{}` has no replies", t.id));
                }
                let re = Regex::new(&t.pattern)
                    .map_err(|e| anyhow::anyhow!("trigger `{}` regex error: {}", t.id, e))?;
                Ok(CompiledTrigger { cfg: t, re })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { triggers })
    }

    /// Like [`ScriptEngine::from_toml`], but falls back to the compiled-in
    /// trigger set instead of failing the boot.
    pub fn load_or_builtin() -> Self {
        match Self::from_toml() {
            Ok(eng) => eng,
            Err(e) => {
                tracing::warn!(error = ?e, "script config not loaded, using built-in triggers");
                Self::from_toml_str(BUILTIN_SCRIPT).expect("built-in script config parses")
            }
        }
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// First trigger whose pattern matches `message`, in file order.
    pub fn reply(&self, user_id: &str, message: &str) -> Option<ScriptReply> {
        for t in &self.triggers {
            if t.re.is_match(message) {
                let text = pick_variant(&t.cfg.replies, user_id, message);
                return Some(ScriptReply {
                    trigger_id: t.cfg.id.clone(),
                    text: text.clone(),
                    confidence: t.cfg.confidence.clamp(0.0, 1.0),
                });
            }
        }
        None
    }
}

/// Stable variant choice: hashing (user, message) keeps repeat questions
/// from flip-flopping between canned lines.
fn pick_variant<'a>(replies: &'a [String], user_id: &str, message: &str) -> &'a String {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    message.hash(&mut hasher);
    let idx = (hasher.finish() % replies.len() as u64) as usize;
    &replies[idx]
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// A threadsafe handle that can hot-reload the underlying engine in dev.
/// Enable by setting SCRIPT_HOT_RELOAD=1; active only in debug builds.
#[derive(Clone)]
pub struct ScriptHandle {
    inner: Arc<RwLock<ScriptEngine>>,
}

impl ScriptHandle {
    pub fn new(engine: ScriptEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub fn reply(&self, user_id: &str, message: &str) -> Option<ScriptReply> {
        if let Ok(eng) = self.inner.read() {
            eng.reply(user_id, message)
        } else {
            None
        }
    }

    pub fn trigger_count(&self) -> usize {
        self.inner.read().map(|e| e.trigger_count()).unwrap_or(0)
    }
}

fn hot_reload_enabled() -> bool {
    let want = std::env::var("SCRIPT_HOT_RELOAD")
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    want && cfg!(debug_assertions)
}

/// Start a simple polling watcher on `path` to hot-reload into the handle.
/// Polls mtime every 2s. Uses only std, no external deps.
pub fn start_hot_reload_thread(handle: ScriptHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) => {
                    let changed = match last_mtime {
                        None => {
                            last_mtime = Some(mtime);
                            false
                        }
                        Some(prev) => mtime > prev,
                    };
                    if changed {
                        if let Ok(content) = fs::read_to_string(&path) {
                            if let Ok(new_engine) = ScriptEngine::from_toml_str(&content) {
                                if let Ok(mut guard) = handle.inner.write() {
                                    *guard = new_engine;
                                }
                            }
                        }
                        last_mtime = Some(mtime);
                    }
                }
                Err(_) => {
                    // File missing or unreadable; keep trying.
                }
            }
            thread::sleep(poll);
        }
    });
}

/* ----------------------------
Tests
---------------------------- */
