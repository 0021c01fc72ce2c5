//! Hand-written doubles shared by the provider and accumulator tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{RateError, RateSource};
use crate::models::{FieldMap, ProductRate, RateKey, RateRecord, ServiceRate};
use crate::store::{RateStore, StoreError};

pub(crate) fn product_record(
    code: &str,
    exception: u32,
    national: Decimal,
    imported: Decimal,
    state: Decimal,
) -> RateRecord {
    RateRecord::Product(ProductRate {
        code: code.to_string(),
        jurisdiction: "SP".to_string(),
        exception,
        description: format!("Produto {code}"),
        national,
        imported,
        state,
    })
}

pub(crate) fn service_record(
    code: &str,
    national: Decimal,
    imported: Decimal,
    state: Decimal,
    municipal: Decimal,
) -> RateRecord {
    RateRecord::Service(ServiceRate {
        code: code.to_string(),
        jurisdiction: "SP".to_string(),
        description: format!("Serviço {code}"),
        kind: Some("NBS".to_string()),
        national,
        imported,
        state,
        municipal,
    })
}

/// Answers from a fixed table and counts how often it was asked.
/// Keys with no configured response answer `NotFound`.
pub(crate) struct StubSource {
    responses: Mutex<HashMap<RateKey, Result<RateRecord, RateError>>>,
    calls: AtomicUsize,
}

impl StubSource {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with(
        self,
        record: RateRecord,
    ) -> Self {
        let key = record.key();
        self.responding(key, Ok(record))
    }

    pub(crate) fn failing(
        self,
        key: RateKey,
        error: RateError,
    ) -> Self {
        self.responding(key, Err(error))
    }

    pub(crate) fn responding(
        self,
        key: RateKey,
        response: Result<RateRecord, RateError>,
    ) -> Self {
        self.set(key, response);
        self
    }

    /// Change the answer for `key` after construction.
    pub(crate) fn set(
        &self,
        key: RateKey,
        response: Result<RateRecord, RateError>,
    ) {
        self.responses
            .lock()
            .expect("stub source lock poisoned")
            .insert(key, response);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for StubSource {
    async fn fetch(
        &self,
        key: &RateKey,
    ) -> Result<RateRecord, RateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .responses
            .lock()
            .expect("stub source lock poisoned")
            .get(key)
            .cloned();
        response.unwrap_or_else(|| Err(RateError::NotFound(key.clone())))
    }
}

/// A store whose reads or writes always fail.
pub(crate) struct BrokenStore {
    pub(crate) fail_reads: bool,
}

#[async_trait]
impl RateStore for BrokenStore {
    async fn get(
        &self,
        _key: &str,
    ) -> Result<Option<FieldMap>, StoreError> {
        if self.fail_reads {
            Err(StoreError::Connection("connection refused".to_string()))
        } else {
            Ok(None)
        }
    }

    async fn set_with_expiry(
        &self,
        _key: &str,
        _fields: &FieldMap,
        _ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }
}
