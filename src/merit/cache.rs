use crate::error::{EvalFault, EvalResult};
use crate::optics::paraxial::PrimaryMetrics;
use crate::optics::seidel::SeidelResult;
use crate::optics::wavefront::ZernikeFit;
use crate::optics::PreparedSystem;
use crate::system::ResolvedSystem;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Intermediates shared between operands of one batch.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    System(Rc<ResolvedSystem>),
    Prepared(Rc<PreparedSystem>),
    Primary(PrimaryMetrics),
    Seidel(Rc<SeidelResult>),
    Zernike(Rc<ZernikeFit>),
    Scalar(f64),
    /// Failures are memoized too, so a broken config is only resolved once.
    Failed(EvalFault),
}

pub trait Cached: Clone {
    fn wrap(self) -> CacheEntry;
    fn unwrap(entry: &CacheEntry) -> Option<Self>;
}

macro_rules! cached {
    ($ty:ty, $variant:ident) => {
        impl Cached for $ty {
            fn wrap(self) -> CacheEntry {
                CacheEntry::$variant(self)
            }

            fn unwrap(entry: &CacheEntry) -> Option<Self> {
                match entry {
                    CacheEntry::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

cached!(Rc<ResolvedSystem>, System);
cached!(Rc<PreparedSystem>, Prepared);
cached!(PrimaryMetrics, Primary);
cached!(Rc<SeidelResult>, Seidel);
cached!(Rc<ZernikeFit>, Zernike);
cached!(f64, Scalar);

/// Per-batch memo. Created when a batch starts and dropped when it returns.
#[derive(Debug, Default)]
pub struct EvalCache {
    entries: HashMap<String, CacheEntry>,
    hits: usize,
    misses: usize,
}

impl EvalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"<kind>:<config>:<params>"`.
    pub fn key(kind: &str, config: &str, params: &str) -> String {
        format!("{kind}:{config}:{params}")
    }

    /// Fixed precision so equal wavelengths written differently share an entry.
    pub fn wavelength_key(um: f64) -> String {
        format!("{um:.9}")
    }

    /// Short stable digest for parameter sets that do not fit in a key.
    pub fn digest(parts: &[String]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(16);
        hex
    }

    pub fn memo<T: Cached>(
        &mut self,
        key: String,
        compute: impl FnOnce() -> EvalResult<T>,
    ) -> EvalResult<T> {
        if let Some(entry) = self.entries.get(&key) {
            if let CacheEntry::Failed(e) = entry {
                self.hits += 1;
                return Err(e.clone());
            }
            if let Some(v) = T::unwrap(entry) {
                self.hits += 1;
                return Ok(v);
            }
        }

        self.misses += 1;
        debug!(key = %key, "cache miss");
        let result = compute();
        let entry = match &result {
            Ok(v) => v.clone().wrap(),
            Err(e) => CacheEntry::Failed(e.clone()),
        };
        self.entries.insert(key, entry);
        result
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
