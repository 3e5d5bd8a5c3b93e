//! Wait-free byte-buffer access shared by every concurrency primitive the
//! image is built from: position counters, term buffers, and the
//! loss-change handoff all read and write through `AtomicBuffer`.

pub mod flow_control;
pub mod loss_change;
pub mod loss_detector;
pub mod position;
pub mod term_buffers;
pub mod term_rebuilder;

use std::mem::size_of;
use std::ops::{Deref, DerefMut};
use std::ptr::{read_volatile, write_volatile};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::util::{ImageError, IndexT, Result};

fn bounds_check_slice(slice: &[u8], offset: IndexT, size: IndexT) -> Result<()> {
    if offset < 0 || size < 0 || slice.len() as IndexT - offset < size {
        Err(ImageError::OutOfBounds)
    } else {
        Ok(())
    }
}

/// Atomic operations on slices of memory.
///
/// Every field the image mutates across threads (position counters, term
/// buffer frame headers, the loss-change triple) goes through this trait
/// rather than a lock.
pub trait AtomicBuffer: Deref<Target = [u8]> + DerefMut<Target = [u8]> {
    /// Check that there are at least `size` bytes of memory available
    /// beginning at some offset.
    fn bounds_check(&self, offset: IndexT, size: IndexT) -> Result<()> {
        bounds_check_slice(self.deref(), offset, size)
    }

    /// Overlay a struct on a buffer.
    ///
    /// NOTE: Has the potential to cause undefined behavior if alignment is incorrect.
    fn overlay<T>(&self, offset: IndexT) -> Result<&T>
    where
        T: Sized,
    {
        self.bounds_check(offset, size_of::<T>() as IndexT)
            .map(|_| {
                let offset_ptr = unsafe { self.as_ptr().offset(offset as isize) };
                unsafe { &*(offset_ptr as *const T) }
            })
    }

    /// Overlay a mutable value on the buffer.
    ///
    /// NOTE: Has the potential to cause undefined behavior if alignment is incorrect
    fn overlay_mut<T>(&mut self, offset: IndexT) -> Result<&mut T>
    where
        T: Sized,
    {
        self.bounds_check(offset, size_of::<T>() as IndexT)
            .map(|_| {
                let offset_ptr = unsafe { self.as_mut_ptr().offset(offset as isize) };
                unsafe { &mut *(offset_ptr as *mut T) }
            })
    }

    /// Overlay a struct on a buffer, and perform a volatile read.
    fn overlay_volatile<T>(&self, offset: IndexT) -> Result<T>
    where
        T: Copy,
    {
        self.bounds_check(offset, size_of::<T>() as IndexT)
            .map(|_| {
                let offset_ptr = unsafe { self.as_ptr().offset(offset as isize) };
                unsafe { read_volatile(offset_ptr as *const T) }
            })
    }

    /// Perform a volatile write of a value over a buffer.
    fn write_volatile<T>(&mut self, offset: IndexT, val: T) -> Result<()>
    where
        T: Copy,
    {
        self.bounds_check(offset, size_of::<T>() as IndexT)
            .map(|_| {
                let offset_ptr = unsafe { self.as_mut_ptr().offset(offset as isize) };
                unsafe { write_volatile(offset_ptr as *mut T, val) };
            })
    }

    /// Perform an atomic Compare-And-Swap of a 64-bit value. Returns `Ok(true)`
    /// if the update was successful, and `Ok(false)` if the update failed.
    fn compare_and_set_i64(&self, offset: IndexT, expected: i64, update: i64) -> Result<bool> {
        self.overlay::<AtomicI64>(offset).map(|a| {
            a.compare_exchange(expected, update, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        })
    }

    /// Perform a volatile read of an `i64` value.
    fn get_i64_volatile(&self, offset: IndexT) -> Result<i64> {
        self.overlay_volatile::<i64>(offset)
    }

    /// Read an `i64` value from the buffer without performing any synchronization.
    fn get_i64(&self, offset: IndexT) -> Result<i64> {
        self.overlay::<i64>(offset).copied()
    }

    /// Perform a volatile (release-ordered) write of an `i64` value.
    fn put_i64_ordered(&mut self, offset: IndexT, value: i64) -> Result<()> {
        self.write_volatile::<i64>(offset, value)
    }

    /// Write an `i64` value into the buffer without performing any synchronization.
    fn put_i64(&mut self, offset: IndexT, value: i64) -> Result<()> {
        self.overlay_mut::<i64>(offset).map(|i| *i = value)
    }

    /// Write the contents of a byte slice to this buffer. Does not perform any synchronization.
    fn put_slice(
        &mut self,
        index: IndexT,
        source: &[u8],
        source_index: IndexT,
        len: IndexT,
    ) -> Result<()> {
        self.bounds_check(index, len)?;
        bounds_check_slice(source, source_index, len)?;

        let index = index as usize;
        let source_index = source_index as usize;
        let len = len as usize;

        self[index..index + len].copy_from_slice(&source[source_index..source_index + len]);
        Ok(())
    }

    /// Write the contents of one buffer to another. Does not perform any synchronization.
    fn put_bytes<B>(
        &mut self,
        index: IndexT,
        source: &B,
        source_index: IndexT,
        len: IndexT,
    ) -> Result<()>
    where
        B: AtomicBuffer,
    {
        self.bounds_check(index, len)?;
        source.bounds_check(source_index, len)?;

        let index = index as usize;
        let source_index = source_index as usize;
        let len = len as usize;

        self[index..index + len].copy_from_slice(&source[source_index..source_index + len]);
        Ok(())
    }

    /// Repeatedly write a value into an atomic buffer. Guaranteed to use `memset`.
    fn set_memory(&mut self, offset: IndexT, length: usize, value: u8) -> Result<()> {
        self.bounds_check(offset, length as IndexT).map(|_| unsafe {
            self.as_mut_ptr()
                .offset(offset as isize)
                .write_bytes(value, length)
        })
    }

    /// Perform a volatile read of an `i32` from the buffer.
    fn get_i32_volatile(&self, offset: IndexT) -> Result<i32> {
        self.overlay_volatile::<i32>(offset)
    }

    /// Read an `i32` value from the buffer without performing any synchronization.
    fn get_i32(&self, offset: IndexT) -> Result<i32> {
        self.overlay::<i32>(offset).copied()
    }

    /// Perform a volatile (release-ordered) write of an `i32` into the buffer.
    fn put_i32_ordered(&mut self, offset: IndexT, value: i32) -> Result<()> {
        self.write_volatile::<i32>(offset, value)
    }

    /// Write an `i32` value into the buffer without performing any synchronization.
    fn put_i32(&mut self, offset: IndexT, value: i32) -> Result<()> {
        self.overlay_mut::<i32>(offset).map(|i| *i = value)
    }

    /// Return the total number of bytes in this buffer.
    fn capacity(&self) -> IndexT {
        self.len() as IndexT
    }
}

impl AtomicBuffer for Vec<u8> {}

impl AtomicBuffer for &mut [u8] {}
