// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Out-of-band resource handles
//!
//! A message may carry file-descriptor handles next to its payload. The bus
//! duplicates every handle at admission time (one set per receiver), so the
//! sender may close its own copy immediately after `send` returns and each
//! receiver still holds an independent descriptor referencing the same
//! underlying resource. Handles travel atomically with their payload: a
//! consumer never observes one without the other.

use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};

/// An owned out-of-band resource (file descriptor) attached to a message.
///
/// Closes the descriptor on drop. Cloning goes through [`try_clone`], which
/// duplicates the descriptor (`dup`), because descriptor duplication can
/// fail at the OS level.
///
/// [`try_clone`]: ResourceHandle::try_clone
#[derive(Debug)]
pub struct ResourceHandle {
    fd: OwnedFd,
}

impl ResourceHandle {
    /// Duplicate the underlying descriptor into a new independent handle.
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            fd: self.fd.try_clone()?,
        })
    }

    /// Consume the handle, returning the owned descriptor.
    pub fn into_fd(self) -> OwnedFd {
        self.fd
    }

    /// Consume the handle as a [`File`] for read/write convenience.
    pub fn into_file(self) -> File {
        File::from(self.fd)
    }

    /// Raw descriptor value (for logging/diagnostics only).
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for ResourceHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl From<OwnedFd> for ResourceHandle {
    fn from(fd: OwnedFd) -> Self {
        Self { fd }
    }
}

impl From<File> for ResourceHandle {
    fn from(file: File) -> Self {
        Self { fd: file.into() }
    }
}

impl From<ResourceHandle> for OwnedFd {
    fn from(handle: ResourceHandle) -> Self {
        handle.fd
    }
}

impl IntoRawFd for ResourceHandle {
    fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }
}

/// Duplicate a handle list for one delivery.
///
/// Fails as a unit: either every handle duplicates or none are handed out,
/// preserving payload/handle atomicity per receiver.
pub(crate) fn clone_handles(handles: &[ResourceHandle]) -> io::Result<Vec<ResourceHandle>> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.try_clone()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // test scaffolding

    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};

    #[test]
    fn clone_refers_to_same_resource() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"shared").unwrap();

        let original = ResourceHandle::from(file);
        let dup = original.try_clone().unwrap();
        drop(original);

        let mut reader = dup.into_file();
        reader.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "shared");
    }

    #[test]
    fn clone_handles_duplicates_each() {
        let a = ResourceHandle::from(tempfile::tempfile().unwrap());
        let b = ResourceHandle::from(tempfile::tempfile().unwrap());
        let dups = clone_handles(&[a, b]).unwrap();
        assert_eq!(dups.len(), 2);
    }
}
