//! LMDB-backed `PageStore`: one environment per log file.
//!
//! Keys are big-endian `u32` page numbers, so a cursor walk visits pages in
//! ascending order. Readers run in their own read-only transactions and never
//! block the writer (LMDB MVCC).

use std::{
    ffi::CString,
    path::{Path, PathBuf},
    ptr,
};

use crossbeam::channel::Receiver;
use liblmdb::{
    MDB_CREATE, MDB_NOTFOUND, MDB_NOTLS, MDB_RDONLY, MDB_RESERVE, MDB_SUCCESS, MDB_cursor_op_MDB_FIRST, MDB_cursor_op_MDB_NEXT, MDB_dbi, MDB_env, MDB_stat, MDB_txn, MDB_val,
    mdb_cursor_close, mdb_cursor_get, mdb_cursor_open, mdb_dbi_close, mdb_dbi_open, mdb_drop, mdb_env_close, mdb_env_create, mdb_env_open, mdb_env_set_mapsize,
    mdb_env_set_maxdbs, mdb_get, mdb_put, mdb_stat, mdb_strerror, mdb_txn_abort, mdb_txn_begin, mdb_txn_commit,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{PageStore, StoreEvent, StoreNotifier};
use crate::{error::StoreError, page::PageNumber};

pub struct LmdbPageStore {
    env: *mut MDB_env,
    dbi: MDB_dbi,
    path: PathBuf,
    notifier: StoreNotifier,
}

// The environment handle is thread-safe under MDB_NOTLS; every transaction
// is begun and finished on the calling thread.
unsafe impl Send for LmdbPageStore {}
unsafe impl Sync for LmdbPageStore {}

impl LmdbPageStore {
    /// Opens (creating if needed) the page store for `file_name` under
    /// `cache_dir`. The directory name is the SHA-256 of the file name.
    pub fn open_for_file(cache_dir: &Path, file_name: &str, map_size: usize) -> Result<Self, StoreError> {
        let dir = cache_dir.join(hex::encode(Sha256::digest(file_name.as_bytes())));
        Self::open(&dir, map_size)
    }

    pub fn open(path: &Path, map_size: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)?;
        let cs = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        let mut env = ptr::null_mut();
        unsafe {
            info!("opening page store at {}", path.display());
            let rc = mdb_env_create(&mut env);
            if rc != MDB_SUCCESS as i32 {
                return Err(from_lmdb_err(rc));
            }

            let rc = mdb_env_set_maxdbs(env, 1);
            if rc != MDB_SUCCESS as i32 {
                mdb_env_close(env);
                return Err(from_lmdb_err(rc));
            }

            let rc = mdb_env_set_mapsize(env, map_size);
            if rc != MDB_SUCCESS as i32 {
                mdb_env_close(env);
                return Err(from_lmdb_err(rc));
            }

            let rc = mdb_env_open(env, cs.as_ptr(), MDB_NOTLS, 0o600);
            if rc != MDB_SUCCESS as i32 {
                mdb_env_close(env);
                return Err(from_lmdb_err(rc));
            }
        }

        let dbi = match unsafe { open_named_db(env, c"/pages".as_ptr()) } {
            Ok(dbi) => dbi,
            Err(e) => {
                unsafe { mdb_env_close(env) };
                return Err(e);
            }
        };

        Ok(Self {
            env,
            dbi,
            path: path.to_path_buf(),
            notifier: StoreNotifier::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the environment and deletes its directory.
    pub fn destroy(self) -> Result<(), StoreError> {
        let path = self.path.clone();
        self.erase_all()?;
        drop(self);
        std::fs::remove_dir_all(&path)?;
        info!("removed page store at {}", path.display());
        Ok(())
    }

    fn begin(&self, flags: u32) -> Result<*mut MDB_txn, StoreError> {
        let mut txn = ptr::null_mut();
        let rc = unsafe { mdb_txn_begin(self.env, ptr::null_mut(), flags, &mut txn) };
        if rc != MDB_SUCCESS as i32 {
            return Err(from_lmdb_err(rc));
        }
        Ok(txn)
    }

    fn commit(txn: *mut MDB_txn) -> Result<(), StoreError> {
        let rc = unsafe { mdb_txn_commit(txn) };
        if rc != MDB_SUCCESS as i32 {
            return Err(from_lmdb_err(rc));
        }
        Ok(())
    }
}

impl PageStore for LmdbPageStore {
    fn put(&self, page: PageNumber, text: &str) -> Result<(), StoreError> {
        let key = page.to_be_bytes();
        let bytes = text.as_bytes();
        let txn = self.begin(0)?;
        unsafe {
            let mut key_val = MDB_val {
                mv_size: key.len(),
                mv_data: key.as_ptr() as *mut libc::c_void,
            };
            let mut data_val = MDB_val {
                mv_size: bytes.len(),
                mv_data: ptr::null_mut(),
            };
            let rc = mdb_put(txn, self.dbi, &mut key_val, &mut data_val, MDB_RESERVE);
            if rc != MDB_SUCCESS as i32 {
                mdb_txn_abort(txn);
                return Err(from_lmdb_err(rc));
            }
            ptr::copy_nonoverlapping(bytes.as_ptr(), data_val.mv_data.cast(), bytes.len());
        }
        Self::commit(txn)?;
        debug!("stored page {page} ({} bytes)", bytes.len());
        self.notifier.notify(StoreEvent::PageWritten(page));
        Ok(())
    }

    fn get(&self, page: PageNumber) -> Result<Option<String>, StoreError> {
        let key = page.to_be_bytes();
        let txn = self.begin(MDB_RDONLY)?;
        let bytes = unsafe {
            let mut key_val = MDB_val {
                mv_size: key.len(),
                mv_data: key.as_ptr() as *mut libc::c_void,
            };
            let mut data_val = MDB_val {
                mv_size: 0,
                mv_data: ptr::null_mut(),
            };
            let rc = mdb_get(txn, self.dbi, &mut key_val, &mut data_val);
            if rc == MDB_NOTFOUND {
                mdb_txn_abort(txn);
                return Ok(None);
            }
            if rc != MDB_SUCCESS as i32 {
                mdb_txn_abort(txn);
                return Err(from_lmdb_err(rc));
            }
            let bytes = std::slice::from_raw_parts(data_val.mv_data as *const u8, data_val.mv_size).to_vec();
            mdb_txn_abort(txn);
            bytes
        };
        String::from_utf8(bytes).map(Some).map_err(|_| StoreError::Utf8 { page })
    }

    fn count(&self) -> Result<usize, StoreError> {
        let txn = self.begin(MDB_RDONLY)?;
        unsafe {
            let mut stat: MDB_stat = std::mem::zeroed();
            let rc = mdb_stat(txn, self.dbi, &mut stat);
            mdb_txn_abort(txn);
            if rc != MDB_SUCCESS as i32 {
                return Err(from_lmdb_err(rc));
            }
            Ok(stat.ms_entries)
        }
    }

    fn erase_all(&self) -> Result<(), StoreError> {
        let txn = self.begin(0)?;
        let rc = unsafe { mdb_drop(txn, self.dbi, 0) };
        if rc != MDB_SUCCESS as i32 {
            unsafe { mdb_txn_abort(txn) };
            return Err(from_lmdb_err(rc));
        }
        Self::commit(txn)?;
        info!("erased page store at {}", self.path.display());
        self.notifier.notify(StoreEvent::Erased);
        Ok(())
    }

    fn page_numbers(&self) -> Result<Vec<PageNumber>, StoreError> {
        let mut pages = Vec::new();
        let txn = self.begin(MDB_RDONLY)?;
        unsafe {
            let mut cursor = ptr::null_mut();
            let rc = mdb_cursor_open(txn, self.dbi, &mut cursor);
            if rc != MDB_SUCCESS as i32 {
                mdb_txn_abort(txn);
                return Err(from_lmdb_err(rc));
            }

            let mut key_val = MDB_val {
                mv_size: 0,
                mv_data: ptr::null_mut(),
            };
            let mut data_val = MDB_val {
                mv_size: 0,
                mv_data: ptr::null_mut(),
            };
            let mut rc = mdb_cursor_get(cursor, &mut key_val, &mut data_val, MDB_cursor_op_MDB_FIRST);
            while rc == MDB_SUCCESS as i32 {
                let raw_key = std::slice::from_raw_parts(key_val.mv_data as *const u8, key_val.mv_size);
                if let Ok(key) = <[u8; 4]>::try_from(raw_key) {
                    pages.push(PageNumber::from_be_bytes(key));
                }
                rc = mdb_cursor_get(cursor, &mut key_val, &mut data_val, MDB_cursor_op_MDB_NEXT);
            }
            mdb_cursor_close(cursor);
            mdb_txn_abort(txn);
            if rc != MDB_NOTFOUND {
                return Err(from_lmdb_err(rc));
            }
        }
        Ok(pages)
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        self.notifier.subscribe()
    }
}

impl Drop for LmdbPageStore {
    fn drop(&mut self) {
        unsafe {
            mdb_dbi_close(self.env, self.dbi);
            mdb_env_close(self.env);
        }
    }
}

/// Opens or creates a named database in the LMDB environment.
unsafe fn open_named_db(env: *mut MDB_env, name_ptr: *const libc::c_char) -> Result<MDB_dbi, StoreError> {
    let mut txn = ptr::null_mut();
    let rc = unsafe { mdb_txn_begin(env, ptr::null_mut(), 0, &mut txn) };
    if rc != MDB_SUCCESS as i32 {
        return Err(from_lmdb_err(rc));
    }

    let mut dbi: MDB_dbi = 0;
    let rc = unsafe { mdb_dbi_open(txn, name_ptr, MDB_CREATE, &mut dbi) };
    if rc != MDB_SUCCESS as i32 {
        unsafe { mdb_txn_abort(txn) };
        return Err(from_lmdb_err(rc));
    }
    let rc = unsafe { mdb_txn_commit(txn) };
    if rc != MDB_SUCCESS as i32 {
        return Err(from_lmdb_err(rc));
    }
    Ok(dbi)
}

pub fn from_lmdb_err(code: i32) -> StoreError {
    let cstr = unsafe { mdb_strerror(code) };
    let message = unsafe { std::ffi::CStr::from_ptr(cstr) }.to_string_lossy().into_owned();
    StoreError::Lmdb { code, message }
}
