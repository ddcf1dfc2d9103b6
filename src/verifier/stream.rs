//! Entry stream that checks digests while the caller reads.

use std::io::{self, Read};
use std::sync::Mutex;

use crate::error::TrustViolation;
use crate::signature::Signers;

use super::{lock_verifier, JarVerifier, ManifestEntryVerifier};

/// Reads one entry and feeds its bytes to the archive's verifier.
///
/// At most `size` bytes are read from the inner source. When the count
/// reaches zero the entry is finalized; a trust violation found there is
/// returned by the next `read` (or by [`close`](Self::close)), once.
pub struct VerifyingEntryStream<'v, R> {
    inner: R,
    name: String,
    remaining: u64,
    verifier: &'v Mutex<JarVerifier>,
    mev: ManifestEntryVerifier,
    /// Set when the entry began while the verifier was still reading
    /// META-INF; only then do reads go through the lock.
    parsing_meta: bool,
    finished: bool,
    deferred: Option<TrustViolation>,
    signers: Option<Signers>,
}

impl<'v, R: Read> VerifyingEntryStream<'v, R> {
    pub fn new(
        inner: R,
        name: &str,
        size: u64,
        is_directory: bool,
        verifier: &'v Mutex<JarVerifier>,
    ) -> Self {
        let (mev, parsing_meta) = {
            let mut guard = lock_verifier(verifier);
            let mut mev = guard.entry_verifier();
            guard.begin_entry(name, is_directory, &mut mev);
            (mev, guard.is_parsing_meta())
        };

        let mut stream = Self {
            inner,
            name: name.to_string(),
            remaining: size,
            verifier,
            mev,
            parsing_meta,
            finished: false,
            deferred: None,
            signers: None,
        };
        if size == 0 {
            if let Err(violation) = stream.finish() {
                stream.deferred = Some(violation);
            }
        }
        stream
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signers established when the entry was finalized
    pub fn signers(&self) -> Option<&Signers> {
        self.signers.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Surface a pending trust violation. Closing before the end of the
    /// entry leaves it unverified, which is not an error.
    pub fn close(mut self) -> io::Result<()> {
        match self.deferred.take() {
            Some(violation) => Err(violation.into()),
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> Result<(), TrustViolation> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let result = lock_verifier(self.verifier).end_entry(&mut self.mev);
        match result {
            Ok(signers) => {
                self.signers = signers;
                Ok(())
            }
            Err(violation) => {
                log::warn!("{}: {}", self.name, violation);
                Err(violation)
            }
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        if self.parsing_meta {
            lock_verifier(self.verifier).update(bytes, &mut self.mev);
        } else {
            self.mev.update(bytes);
        }
    }
}

impl<R: Read> Read for VerifyingEntryStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(violation) = self.deferred.take() {
            return Err(violation.into());
        }
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let limit = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = self.inner.read(&mut buf[..limit])?;
        if n == 0 {
            log::debug!("{}: source ended with {} bytes left", self.name, self.remaining);
            self.remaining = 0;
            self.finish()?;
            return Ok(0);
        }

        self.feed(&buf[..n]);
        self.remaining -= n as u64;
        if self.remaining == 0 {
            if let Err(violation) = self.finish() {
                self.deferred = Some(violation);
            }
        }
        Ok(n)
    }
}
