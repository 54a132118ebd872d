use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

/// Prefix marking an id the backend has not issued yet
pub const TEMP_PREFIX: &str = "temp-";

/// True when `id` was minted locally and has never been persisted
pub fn is_temporary(id: &str) -> bool {
    id.starts_with(TEMP_PREFIX)
}

/// Generate a document seed from the script id using CRC32
pub fn get_document_seed(script_id: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(script_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential id generator for one open script.
///
/// Local ids, temporary component ids and temporary segment ids share one
/// counter, so no two ids minted by the same document ever collide. The
/// counter is serialized with the document and keeps counting after a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    pub fn new(script_id: &str) -> Self {
        Self {
            seed: get_document_seed(script_id),
            count: 0,
        }
    }

    pub fn from_seed(seed: String) -> Self {
        Self { seed, count: 0 }
    }

    fn next(&mut self) -> u64 {
        self.count += 1;
        self.count
    }

    /// Next client-side identity for an element
    pub fn local_id(&mut self) -> String {
        let n = self.next();
        format!("{}-{}", self.seed, n)
    }

    pub fn temp_component_id(&mut self) -> String {
        let n = self.next();
        format!("{}c-{}-{}", TEMP_PREFIX, self.seed, n)
    }

    pub fn temp_segment_id(&mut self) -> String {
        let n = self.next();
        format!("{}s-{}-{}", TEMP_PREFIX, self.seed, n)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}
