// Cache Backend
//
// Key/value store for transformed pipeline results. Values hold serialized
// asset records; content and source maps live in separate blobs keyed by
// the `content_key`/`map_key` stored on the asset value. Persistence is the
// backend's business; the core only reads and writes.

use std::io::{Cursor, Read};

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>);
    fn get_blob(&self, key: &str) -> Option<Vec<u8>>;
    fn set_blob(&self, key: &str, value: Vec<u8>);

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Streaming access to a blob, for backends that can avoid buffering.
    fn get_stream(&self, key: &str) -> Option<Box<dyn Read + Send>> {
        self.get_blob(key)
            .map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read + Send>)
    }
}
