//! Reusable byte buffers.
//!
//! A [`BufferPool`] hands out cleared `Vec<u8>` buffers that go back to the
//! pool when the [`PooledBuffer`] guard is dropped. The pool is bounded: once
//! `max_idle` buffers are parked, further returns are simply dropped.

use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default capacity of a freshly allocated buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Default number of idle buffers kept around.
pub const DEFAULT_MAX_IDLE: usize = 16;

/// A bounded pool of byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_idle: usize,
    borrowed: AtomicUsize,
    created: AtomicUsize,
}

impl BufferPool {
    /// Creates a pool handing out buffers of at least `buffer_size` bytes of
    /// capacity, keeping at most `max_idle` of them when returned.
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            buffer_size: buffer_size.max(1),
            max_idle,
            borrowed: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
        }
    }

    /// Checks out an empty buffer.
    pub fn checkout(&self) -> PooledBuffer<'_> {
        let buf = self.idle.lock().pop().unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Vec::with_capacity(self.buffer_size)
        });
        self.borrowed.fetch_add(1, Ordering::Relaxed);

        PooledBuffer { buf, pool: self }
    }

    fn release(&self, mut buf: Vec<u8>) {
        self.borrowed.fetch_sub(1, Ordering::Relaxed);
        buf.clear();

        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    /// Configured capacity of new buffers.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of parked buffers.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Number of buffers currently checked out.
    pub fn borrowed(&self) -> usize {
        self.borrowed.load(Ordering::Relaxed)
    }

    /// Total number of buffers ever allocated by this pool.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Copies `src` into `dst` through a pooled scratch buffer.
    ///
    /// Returns the number of bytes copied.
    pub fn copy<R: Read + ?Sized, W: Write + ?Sized>(&self, dst: &mut W, src: &mut R) -> io::Result<u64> {
        let mut scratch = self.checkout();
        let len = self.buffer_size;
        scratch.resize(len, 0);

        let mut written = 0u64;
        loop {
            let n = match src.read(&mut scratch[..]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            dst.write_all(&scratch[..n])?;
            written += n as u64;
        }
        Ok(written)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_MAX_IDLE)
    }
}

/// A buffer checked out of a [`BufferPool`]; returned on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
