//! NVS (Non-Volatile Storage) adapter.
//!
//! Persists the duration counters (an 8-byte blob, rewritten at most once
//! per flush interval) and the system configuration (postcard-encoded).
//! On ESP32 this sits on the NVS flash partition with atomic commits; the
//! simulation backend is an in-memory map for host tests.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{StorageError, StoragePort};
use crate::config::SystemConfig;
use crate::error::{Error, Result};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "compressor";
const HOURS_KEY: &str = "hours";
const CONFIG_KEY: &str = "syscfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash. On first boot or after a partition version
    /// mismatch the partition is erased and re-initialised.
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase run from the single
            // main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(Error::Init("nvs erase"));
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(Error::Init("nvs init"));
                }
            } else if ret != ESP_OK {
                return Err(Error::Init("nvs init"));
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// Load the stored configuration, falling back to defaults when the
    /// blob is missing. A corrupt blob is an error, not silently replaced.
    pub fn load_config(&self) -> Result<SystemConfig> {
        match self.get_blob(CONFIG_KEY) {
            Ok(Some(bytes)) => {
                let cfg: SystemConfig = postcard::from_bytes(&bytes)
                    .map_err(|_| Error::Config("stored config is corrupt"))?;
                cfg.validate().map_err(Error::Config)?;
                info!("NvsAdapter: loaded stored configuration");
                Ok(cfg)
            }
            Ok(None) => {
                info!("NvsAdapter: no stored configuration, using defaults");
                Ok(SystemConfig::default())
            }
            Err(_) => Err(Error::Config("config read failed")),
        }
    }

    pub fn save_config(&self, cfg: &SystemConfig) -> Result<()> {
        cfg.validate().map_err(Error::Config)?;
        let bytes: Vec<u8> = postcard::to_allocvec(cfg)
            .map_err(|_| Error::Config("config encode failed"))?;
        self.set_blob(CONFIG_KEY, &bytes)
            .map_err(|_| Error::Config("config write failed"))
    }

    // ── Blob primitives ───────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn get_blob(&self, key: &str) -> core::result::Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .store
            .borrow()
            .get(&format!("{NAMESPACE}::{key}"))
            .cloned())
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_blob(&self, key: &str, data: &[u8]) -> core::result::Result<(), StorageError> {
        self.store
            .borrow_mut()
            .insert(format!("{NAMESPACE}::{key}"), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn get_blob(&self, key: &str) -> core::result::Result<Option<Vec<u8>>, StorageError> {
        Self::with_handle(false, |handle| {
            let key_c = Self::key_cstr(key);
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_c.as_ptr().cast(),
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret == ESP_ERR_NVS_NOT_FOUND {
                return Ok(None);
            }
            if ret != ESP_OK || size == 0 || size > MAX_BLOB_SIZE {
                return Err(StorageError::IoError);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key_c.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            buf.truncate(size);
            Ok(Some(buf))
        })
    }

    #[cfg(target_os = "espidf")]
    fn set_blob(&self, key: &str, data: &[u8]) -> core::result::Result<(), StorageError> {
        Self::with_handle(true, |handle| {
            let key_c = Self::key_cstr(key);
            let ret = unsafe {
                nvs_set_blob(handle, key_c.as_ptr().cast(), data.as_ptr().cast(), data.len())
            };
            if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            if unsafe { nvs_commit(handle) } != ESP_OK {
                return Err(StorageError::IoError);
            }
            Ok(())
        })
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_handle<F, T>(write: bool, f: F) -> core::result::Result<T, StorageError>
    where
        F: FnOnce(nvs_handle_t) -> core::result::Result<T, StorageError>,
    {
        let ns = Self::key_cstr(NAMESPACE);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret == ESP_ERR_NVS_NOT_FOUND {
            return Err(StorageError::NotFound);
        }
        if ret != ESP_OK {
            return Err(StorageError::IoError);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    /// NVS keys are at most 15 bytes plus NUL.
    #[cfg(target_os = "espidf")]
    fn key_cstr(key: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let len = key.len().min(15);
        buf[..len].copy_from_slice(&key.as_bytes()[..len]);
        buf
    }
}

impl StoragePort for NvsAdapter {
    fn load(&mut self, buf: &mut [u8]) -> core::result::Result<usize, StorageError> {
        match self.get_blob(HOURS_KEY)? {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn save(&mut self, data: &[u8]) -> core::result::Result<(), StorageError> {
        self.set_blob(HOURS_KEY, data)
    }
}
