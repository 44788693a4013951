use std::{env, time::Duration};

use crate::{
    error::{StorageError, StorageResult},
    storage::page::page::page_constants::{DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE},
};

pub const DEFAULT_POOL_PAGES: usize = 50;
pub const DEFAULT_REPLACER_K: usize = 2;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 500;

// Environment overrides
pub const ENV_PAGE_SIZE: &str = "HEAPDB_PAGE_SIZE";
pub const ENV_POOL_PAGES: &str = "HEAPDB_POOL_PAGES";
pub const ENV_REPLACER_K: &str = "HEAPDB_REPLACER_K";
pub const ENV_LOCK_TIMEOUT_MS: &str = "HEAPDB_LOCK_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOptions {
    // Block size in bytes, shared by every page, heap file and buffer pool built from these options
    pub page_size: usize,
    // Maximum number of pages the buffer pool may cache
    pub buffer_pool_pages: usize,
    // Backward k-distance used by the LRU-K replacer
    pub replacer_k: usize,
    // How long a transaction waits on a page lock before it is aborted
    pub lock_timeout: Duration,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_POOL_PAGES,
            replacer_k: DEFAULT_REPLACER_K,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl StorageOptions {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    pub fn with_replacer_k(mut self, k: usize) -> Self {
        self.replacer_k = k;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Defaults overridden by any `HEAPDB_*` variables present in the environment.
    pub fn from_env() -> StorageResult<Self> {
        let mut options = Self::default();

        if let Some(page_size) = read_env(ENV_PAGE_SIZE)? {
            options.page_size = page_size as usize;
        }
        if let Some(pages) = read_env(ENV_POOL_PAGES)? {
            options.buffer_pool_pages = pages as usize;
        }
        if let Some(k) = read_env(ENV_REPLACER_K)? {
            options.replacer_k = k as usize;
        }
        if let Some(timeout_ms) = read_env(ENV_LOCK_TIMEOUT_MS)? {
            options.lock_timeout = Duration::from_millis(timeout_ms);
        }

        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(invalid(format!(
                "page_size must be at least {} bytes, got {}",
                MIN_PAGE_SIZE, self.page_size
            )));
        }
        if self.buffer_pool_pages == 0 {
            return Err(invalid("buffer_pool_pages must be non-zero".to_string()));
        }
        if self.replacer_k == 0 {
            return Err(invalid("replacer_k must be non-zero".to_string()));
        }
        if self.lock_timeout.is_zero() {
            return Err(invalid("lock_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn read_env(key: &str) -> StorageResult<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| invalid(format!("{} = {:?}: {}", key, raw, err))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(invalid(format!("{}: {}", key, err))),
    }
}

fn invalid(message: String) -> StorageError {
    StorageError::InvalidConfig { message }
}
