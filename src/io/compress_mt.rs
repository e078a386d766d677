//! The parallel compression pipeline: one reader (the calling thread), N
//! compression workers on a bounded pool, one writer thread, all sharing a
//! ring of N work units.
//!
//! The ring provides the backpressure. The reader may refill slot `k` only
//! when the writer has drained it (`Idle`) and the worker seeded from it has
//! copied its preset dictionary out (`tail_needed` clear). Workers deflate
//! their block with the previous block's last 32 KiB as preset dictionary
//! and terminate it with a sync flush (finish on the last block), so the
//! concatenation of the slots' outputs — drained by the writer in strict
//! ring order — is one valid raw deflate stream. Per-block checks fold into
//! the whole-stream value as each slot is drained, in byte order.
//!
//! The on-wire output is therefore identical regardless of how threads are
//! scheduled.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use flate2::FlushCompress;

use crate::config::DICT_SIZE;
use crate::io::check::{check_combine, check_init, check_update};
use crate::io::compress::{deflate_block, CompressStats};
use crate::io::file_io::read_to_capacity;
use crate::io::frame::{write_header, write_trailer, HeaderMeta};
use crate::io::pool::{Pool, SlotStatus};
use crate::io::prefs::{display_level, Format, Prefs};
use crate::threadpool::WorkerPool;

// ---------------------------------------------------------------------------
// Shared pipeline context
// ---------------------------------------------------------------------------

struct PipeCtx {
    pool: Pool,
    format: Format,
    dictionary: bool,
    /// First error raised by any stage; the stream fails with it after the
    /// ring has been drained.
    error: Mutex<Option<io::Error>>,
}

impl PipeCtx {
    fn set_error(&self, e: io::Error) {
        let mut guard = self.error.lock().unwrap();
        if guard.is_none() {
            *guard = Some(e);
        }
    }

    fn has_error(&self) -> bool {
        self.error.lock().unwrap().is_some()
    }

    fn take_error(&self) -> Option<io::Error> {
        self.error.lock().unwrap().take()
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Compresses the block in slot `k`: copy the preset dictionary out of the
/// previous slot (releasing it for the reader), compute the block check,
/// deflate with sync-flush (finish on the last block), then hand the slot to
/// the writer.
fn worker_job(ctx: Arc<PipeCtx>, k: usize, first: bool) {
    let pool = &ctx.pool;
    let need_dict = ctx.dictionary && !first;

    // Private dictionary copy. The buffer is taken out of the slot so the
    // previous slot's lock is never held together with this slot's.
    let mut dict = {
        let mut unit = pool.slot(k).data.lock().unwrap();
        std::mem::take(&mut unit.dict)
    };
    if need_dict {
        let p = pool.prev(k);
        {
            let prev_unit = pool.slot(p).data.lock().unwrap();
            let tail = prev_unit.len.saturating_sub(DICT_SIZE);
            dict.clear();
            dict.extend_from_slice(&prev_unit.in_buf[tail..prev_unit.len]);
        }
        // Dictionary captured; the reader may now reuse the neighbor.
        pool.update_state(p, |st| st.tail_needed = false);
    }

    let result: io::Result<()> = {
        let mut guard = pool.slot(k).data.lock().unwrap();
        let unit = &mut *guard;
        unit.dict = dict;

        let z = unit.deflate.as_mut().expect("slot initialized by reader");
        z.reset();
        let mut res = Ok(());
        if need_dict && !unit.dict.is_empty() {
            if let Err(e) = z.set_dictionary(&unit.dict) {
                res = Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("deflate dictionary failed: {}", e),
                ));
            }
        }

        unit.check = check_update(
            ctx.format,
            check_init(ctx.format),
            &unit.in_buf[..unit.len],
        );

        if res.is_ok() {
            let last = unit.len < pool.block_size;
            let flush = if last {
                FlushCompress::Finish
            } else {
                FlushCompress::Sync
            };
            res = match deflate_block(z, &unit.in_buf[..unit.len], &mut unit.out_buf, flush)
            {
                Ok(n) => {
                    unit.out_len = n;
                    Ok(())
                }
                Err(e) => Err(e),
            };
        }
        if res.is_err() {
            unit.out_len = 0;
        }
        res
    };

    if let Err(e) = result {
        ctx.set_error(e);
    }
    pool.update_state(k, |st| st.status = SlotStatus::WritePending);
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Drains slots in strict ring order: header once, each block's compressed
/// bytes, per-block check folded into the running value, trailer after the
/// short block.
///
/// A write failure is recorded and the remaining slots are still drained
/// (releasing them) so the reader cannot block on a stuck ring.
fn writer_loop<W: Write>(
    ctx: &PipeCtx,
    prefs: &Prefs,
    meta: &HeaderMeta,
    dst: &mut W,
) -> io::Result<CompressStats> {
    let head_len = match write_header(dst, prefs, meta) {
        Ok(n) => n,
        Err(e) => {
            ctx.set_error(e);
            0
        }
    };

    let mut check = check_init(prefs.format);
    let mut ulen: u64 = 0;
    let mut clen: u64 = 0;
    let mut k = 0usize;

    loop {
        drop(
            ctx.pool
                .wait_state(k, |st| st.status == SlotStatus::WritePending),
        );
        let last = {
            let unit = ctx.pool.slot(k).data.lock().unwrap();
            if !ctx.has_error() {
                if let Err(e) = dst.write_all(&unit.out_buf[..unit.out_len]) {
                    ctx.set_error(e);
                }
            }
            ulen += unit.len as u64;
            clen += unit.out_len as u64;
            check = check_combine(prefs.format, check, unit.check, unit.len as u64);
            unit.len < ctx.pool.block_size
        };
        ctx.pool.update_state(k, |st| st.status = SlotStatus::Idle);
        if last {
            break;
        }
        k = ctx.pool.next(k);
        if k == 0 {
            display_level(3, ".");
        }
    }

    if let Some(e) = ctx.take_error() {
        return Err(e);
    }
    write_trailer(dst, prefs, meta, ulen, clen, check, head_len)?;
    Ok(CompressStats { ulen, clen })
}

// ---------------------------------------------------------------------------
// Reader / entry point
// ---------------------------------------------------------------------------

/// Compresses `src` to `dst` using `prefs.nb_workers` concurrent block
/// compressors. The output is byte-identical across runs and worker counts
/// (for a fixed block size, level, and dictionary setting).
pub fn compress_stream_parallel<W: Write + Send>(
    src: &mut dyn Read,
    dst: &mut W,
    prefs: &Prefs,
    meta: &HeaderMeta,
) -> io::Result<CompressStats> {
    let n_slots = prefs.nb_workers.max(2);
    let pool = Pool::new(n_slots, prefs.block_size, prefs.level)?;
    let ctx = Arc::new(PipeCtx {
        pool,
        format: prefs.format,
        dictionary: prefs.dictionary,
        error: Mutex::new(None),
    });
    let workers = WorkerPool::new(n_slots, n_slots)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "cannot create worker pool"))?;

    std::thread::scope(|s| -> io::Result<CompressStats> {
        let writer_ctx = Arc::clone(&ctx);
        let writer = s.spawn(move || writer_loop(&writer_ctx, prefs, meta, dst));

        let mut k = 0usize;
        let mut seq: u64 = 0;
        loop {
            drop(
                ctx.pool
                    .wait_state(k, |st| st.status == SlotStatus::Idle && !st.tail_needed),
            );

            // After any stage failed there is no point reading further;
            // terminate the writer with an empty final block.
            if ctx.has_error() {
                let mut unit = ctx.pool.slot(k).data.lock().unwrap();
                unit.ensure_init(ctx.pool.block_size, ctx.pool.out_size, ctx.pool.level);
                unit.len = 0;
                unit.out_len = 0;
                unit.check = check_init(ctx.format);
                drop(unit);
                ctx.pool
                    .update_state(k, |st| st.status = SlotStatus::WritePending);
                break;
            }

            let n = {
                let mut unit = ctx.pool.slot(k).data.lock().unwrap();
                unit.ensure_init(ctx.pool.block_size, ctx.pool.out_size, ctx.pool.level);
                match read_to_capacity(src, &mut unit.in_buf) {
                    Ok(n) => {
                        unit.len = n;
                        n
                    }
                    Err(e) => {
                        ctx.set_error(e);
                        unit.len = 0;
                        unit.out_len = 0;
                        unit.check = check_init(ctx.format);
                        drop(unit);
                        ctx.pool
                            .update_state(k, |st| st.status = SlotStatus::WritePending);
                        break;
                    }
                }
            };

            // The worker for this slot reads the previous slot's tail as its
            // preset dictionary; hold that buffer until the copy is signalled.
            if ctx.dictionary && seq > 0 {
                ctx.pool
                    .update_state(ctx.pool.prev(k), |st| st.tail_needed = true);
            }
            ctx.pool
                .update_state(k, |st| st.status = SlotStatus::Compressing);
            let job_ctx = Arc::clone(&ctx);
            let first = seq == 0;
            workers.submit(move || worker_job(job_ctx, k, first));
            seq += 1;

            // A short read marks the last block; it has been dispatched.
            if n < ctx.pool.block_size {
                break;
            }
            k = ctx.pool.next(k);
        }

        let res = writer.join().expect("writer thread panicked");
        workers.wait_idle();
        res
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
