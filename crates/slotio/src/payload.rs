//! Payloads of successful requests.

use bytes::Bytes;

/// Completion record kept by the fetch backend.
///
/// The registry stores the record as delivered; the body is never copied.
#[derive(Debug, Clone)]
pub struct FetchRecord {
    url: String,
    status: u16,
    body: Bytes,
}

impl FetchRecord {
    pub fn new(url: impl Into<String>, status: u16, body: Bytes) -> Self {
        Self {
            url: url.into(),
            status,
            body,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Bytes retrieved by a successful request.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Buffer allocated for a synchronous read.
    Owned(Vec<u8>),
    /// Record handed over by an asynchronous backend.
    Fetched(FetchRecord),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Owned(buf) => buf,
            Payload::Fetched(record) => record.body(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(buf: Vec<u8>) -> Self {
        Payload::Owned(buf)
    }
}

impl From<FetchRecord> for Payload {
    fn from(record: FetchRecord) -> Self {
        Payload::Fetched(record)
    }
}
