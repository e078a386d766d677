// pool.rs — ring of reusable work units for the parallel pipeline.
//
// Each slot owns an input block buffer, a worst-case output buffer, a
// private dictionary copy, and a reusable raw-deflate state. A slot's
// status word (guarded by its mutex, signalled through its condvar) drives
// the reader/worker/writer protocol in compress_mt; the buffers live under
// a second mutex so exactly one thread touches them at a time.
//
// Buffers and deflate state are created lazily on first use. The ring is
// freed in reverse index order on drop. Changing block size, worker count,
// or level requires tearing the pool down and building a new one.

use std::io;
use std::sync::{Condvar, Mutex, MutexGuard};

use flate2::{Compress, Compression};

use crate::config::DICT_SIZE;
use crate::io::prefs::out_buf_size;

/// Pipeline state of one ring slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotStatus {
    /// Released by the writer; the reader may fill it.
    Idle,
    /// A worker owns the slot (dispatched, running, or finished deflating).
    Compressing,
    /// The worker is done; the writer may drain it.
    WritePending,
}

/// Condvar-protected slot state.
#[derive(Debug)]
pub struct SlotState {
    pub status: SlotStatus,
    /// Set while the worker seeded from this slot has not yet copied its
    /// dictionary out of `in_buf`; the reader must not refill until clear.
    pub tail_needed: bool,
}

/// Buffers and deflate state of one slot.
pub struct WorkUnit {
    /// Input block; capacity = block size once initialized.
    pub in_buf: Vec<u8>,
    /// Valid bytes of `in_buf`; a value below the block size marks the
    /// stream's last block.
    pub len: usize,
    /// Check value of `in_buf[..len]` (CRC-32 or Adler-32).
    pub check: u32,
    /// Compressed output; capacity covers worst-case deflate expansion.
    pub out_buf: Vec<u8>,
    pub out_len: usize,
    /// Private copy of the previous block's tail, made by the worker before
    /// deflating so the neighbor slot can be refilled.
    pub dict: Vec<u8>,
    /// Reusable raw-deflate state (32 KiB window, no zlib wrapper).
    pub deflate: Option<Compress>,
}

impl WorkUnit {
    fn new() -> Self {
        WorkUnit {
            in_buf: Vec::new(),
            len: 0,
            check: 0,
            out_buf: Vec::new(),
            out_len: 0,
            dict: Vec::new(),
            deflate: None,
        }
    }

    /// Allocates buffers and the deflate state on first use.
    pub fn ensure_init(&mut self, block_size: usize, out_size: usize, level: u32) {
        if self.in_buf.is_empty() {
            self.in_buf = vec![0u8; block_size];
            self.out_buf = vec![0u8; out_size];
            self.dict = Vec::with_capacity(DICT_SIZE);
        }
        if self.deflate.is_none() {
            self.deflate = Some(Compress::new(Compression::new(level), false));
        }
    }
}

/// One ring slot: protocol state plus data, separately locked.
pub struct Slot {
    pub state: Mutex<SlotState>,
    pub cond: Condvar,
    pub data: Mutex<WorkUnit>,
}

/// The ring itself.
pub struct Pool {
    slots: Vec<Slot>,
    pub block_size: usize,
    pub out_size: usize,
    pub level: u32,
}

impl Pool {
    /// Builds a ring of `n` idle slots. Fails when the worst-case output
    /// size `block_size + block_size/2048 + 10` overflows `usize`.
    pub fn new(n: usize, block_size: usize, level: u32) -> io::Result<Pool> {
        let out_size = out_buf_size(block_size).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "block size too large")
        })?;
        let mut slots = Vec::with_capacity(n);
        for _ in 0..n {
            slots.push(Slot {
                state: Mutex::new(SlotState {
                    status: SlotStatus::Idle,
                    tail_needed: false,
                }),
                cond: Condvar::new(),
                data: Mutex::new(WorkUnit::new()),
            });
        }
        Ok(Pool {
            slots,
            block_size,
            out_size,
            level,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn next(&self, k: usize) -> usize {
        (k + 1) % self.slots.len()
    }

    #[inline]
    pub fn prev(&self, k: usize) -> usize {
        (k + self.slots.len() - 1) % self.slots.len()
    }

    #[inline]
    pub fn slot(&self, k: usize) -> &Slot {
        &self.slots[k]
    }

    /// Blocks until `pred` holds for slot `k`'s state.
    pub fn wait_state<F>(&self, k: usize, pred: F) -> MutexGuard<'_, SlotState>
    where
        F: Fn(&SlotState) -> bool,
    {
        let slot = &self.slots[k];
        let mut guard = slot.state.lock().unwrap();
        while !pred(&guard) {
            guard = slot.cond.wait(guard).unwrap();
        }
        guard
    }

    /// Applies `f` to slot `k`'s state and wakes its waiters.
    pub fn update_state<F>(&self, k: usize, f: F)
    where
        F: FnOnce(&mut SlotState),
    {
        let slot = &self.slots[k];
        let mut guard = slot.state.lock().unwrap();
        f(&mut guard);
        drop(guard);
        slot.cond.notify_all();
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // Teardown in reverse index order.
        while let Some(slot) = self.slots.pop() {
            drop(slot);
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
