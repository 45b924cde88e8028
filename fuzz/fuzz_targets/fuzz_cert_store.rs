//! Fuzz target: certificate loading from NVS
//!
//! Stores arbitrary bytes under the certificate, key and CA slots and
//! loads them back through `CertStore`, verifying:
//! - No panics on oversized, non-UTF-8 or truncated blobs
//! - A loaded bundle is always PEM, NUL-terminated and within its size limit
//!
//! cargo fuzz run fuzz_cert_store

#![no_main]

use aws_sensor::adapters::cert_store::CertStore;
use aws_sensor::app::ports::{MAX_CERT_SIZE, MAX_KEY_SIZE, StorageError, StoragePort};
use aws_sensor::config::{AWS_NAMESPACE, KEY_CERT, KEY_PRIVATE_KEY, KEY_ROOT_CA};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

// ── In-memory StoragePort for fuzz testing ────────────────────

#[derive(Default)]
struct MemStore {
    data: HashMap<String, Vec<u8>>,
}

impl StoragePort for MemStore {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.data.get(&format!("{ns}::{key}")) {
            Some(v) if v.len() > buf.len() => Err(StorageError::BufferTooSmall),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.data.insert(format!("{ns}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&format!("{ns}::{key}"));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.contains_key(&format!("{ns}::{key}"))
    }

    fn erase_namespace(&mut self, ns: &str) -> Result<(), StorageError> {
        let prefix = format!("{ns}::");
        self.data.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}

fn check_pem(blob: &[u8], limit: usize) {
    assert!(blob.len() <= limit);
    assert!(blob.starts_with(b"-----BEGIN "));
    assert_eq!(blob.last(), Some(&0));
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First two bytes split the rest into cert / key / CA slices.
    let body = &data[2..];
    let a = (data[0] as usize).min(body.len());
    let b = (a + data[1] as usize).min(body.len());

    let mut store = MemStore::default();
    let _ = store.write(AWS_NAMESPACE, KEY_CERT, &body[..a]);
    let _ = store.write(AWS_NAMESPACE, KEY_PRIVATE_KEY, &body[a..b]);
    if b < body.len() {
        let _ = store.write(AWS_NAMESPACE, KEY_ROOT_CA, &body[b..]);
    }

    if let Ok(bundle) = CertStore::load(&store) {
        check_pem(&bundle.client_cert, MAX_CERT_SIZE);
        check_pem(&bundle.private_key, MAX_KEY_SIZE);
        if let Some(ca) = bundle.root_ca {
            check_pem(&ca, MAX_CERT_SIZE);
        }
    }
});
