use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{MediaKey, ObjectStorage, StorageError};

/// Test storage that can be told to fail writes or reads for matching keys.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    failing_puts: Mutex<Vec<String>>,
    failing_gets: Mutex<Vec<String>>,
    missing: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts_containing(&self, fragment: &str) {
        self.failing_puts.lock().unwrap().push(fragment.to_string());
    }

    pub fn fail_gets_containing(&self, fragment: &str) {
        self.failing_gets.lock().unwrap().push(fragment.to_string());
    }

    /// Reads of matching keys report the object as gone.
    pub fn lose_objects_containing(&self, fragment: &str) {
        self.missing.lock().unwrap().push(fragment.to_string());
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &MediaKey, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if self.failing_puts.lock().unwrap().iter().any(|f| key.as_str().contains(f)) {
            return Err(StorageError::Backend(format!("injected put failure for {key}")));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &MediaKey) -> Result<Vec<u8>, StorageError> {
        if self.failing_gets.lock().unwrap().iter().any(|f| key.as_str().contains(f)) {
            return Err(StorageError::Backend(format!("injected get failure for {key}")));
        }
        if self.missing.lock().unwrap().iter().any(|f| key.as_str().contains(f)) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key.as_str())
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
