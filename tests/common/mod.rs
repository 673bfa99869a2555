#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Receiver;
use irflux::{
    error::StoreError,
    ir::{IrStreamEncoder, MessageToken, StreamMetadata},
    page::PageNumber,
    storage::{MemoryPageStore, PageStore, StoreEvent},
};

pub const BASE_TS: i64 = 1_656_046_464_000;

const LEVELS: [&str; 4] = ["INFO", "WARN", "DEBUG", "ERROR"];
const USERS: [&str; 3] = ["alice", "bob", "carol@example.com"];

/// An IR stream of `n` records. Every record starts with a dictionary
/// variable, so its first byte is a dictionary-variable tag.
pub fn encode_stream(n: usize) -> anyhow::Result<Vec<u8>> {
    let mut enc = IrStreamEncoder::new(&StreamMetadata::new(BASE_TS))?;
    let mut ts = BASE_TS;
    for i in 0..n {
        // mostly small forward steps, with one large and one backwards jump
        ts += match i {
            3 => 90_000_000,
            6 => -250,
            _ => 1_337 * (i as i64 % 5),
        };
        let prefix = format!(" {} [worker-{}] user ", LEVELS[i % LEVELS.len()], i % 3);
        enc.push_record(
            ts,
            &[
                MessageToken::Text(&prefix),
                MessageToken::Dict(USERS[i % USERS.len()]),
                MessageToken::Text(" took "),
                MessageToken::Float("12.5"),
                MessageToken::Text(" ms, status "),
                MessageToken::Int(200 + i as i32),
                MessageToken::Text("\n"),
            ],
        )?;
    }
    Ok(enc.finish())
}

/// In-memory store whose operations can be switched to fail the way a full
/// LMDB map does.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryPageStore,
    pub fail_put: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_count: AtomicBool,
}

pub const MAP_FULL: i32 = -30792;

impl FlakyStore {
    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Lmdb {
                code: MAP_FULL,
                message: "MDB_MAP_FULL: Environment mapsize limit reached".into(),
            });
        }
        Ok(())
    }
}

impl PageStore for FlakyStore {
    fn put(&self, page: PageNumber, text: &str) -> Result<(), StoreError> {
        Self::check(&self.fail_put)?;
        self.inner.put(page, text)
    }

    fn get(&self, page: PageNumber) -> Result<Option<String>, StoreError> {
        Self::check(&self.fail_get)?;
        self.inner.get(page)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Self::check(&self.fail_count)?;
        self.inner.count()
    }

    fn erase_all(&self) -> Result<(), StoreError> {
        self.inner.erase_all()
    }

    fn page_numbers(&self) -> Result<Vec<PageNumber>, StoreError> {
        self.inner.page_numbers()
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}
