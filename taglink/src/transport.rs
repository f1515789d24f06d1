use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
	#[error("tag transport error: {0}")]
	Other(String),
}

/// The resource-tagging API's interface, as far as `taglink` is concerned.
/// A real implementation would be backed by a cloud SDK client; that SDK is
/// an out-of-scope external collaborator (spec.md §1) — this crate depends
/// only on the trait.
#[async_trait]
pub trait TagTransport: Send + Sync {
	async fn list_tags(&self, resource: &str) -> Result<HashMap<String, String>, TransportError>;
	async fn tag_resource(&self, resource: &str, tags: HashMap<String, String>) -> Result<(), TransportError>;
	async fn untag_resource(&self, resource: &str, tag_keys: Vec<String>) -> Result<(), TransportError>;
}

/// An in-memory fake used by tests and the `taglink-demo` binary. Each
/// resource ARN maps to its own tag set.
#[derive(Default)]
pub struct FakeTagTransport {
	resources: tokio::sync::Mutex<HashMap<String, HashMap<String, String>>>,
}

impl FakeTagTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Directly set a tag, bypassing `tag_resource`, to simulate the remote
	/// end of the link writing a tag behind our back (what the harvester
	/// is meant to observe).
	pub async fn poke(&self, resource: &str, key: &str, value: &str) {
		let mut resources = self.resources.lock().await;
		resources.entry(resource.to_string()).or_default().insert(key.to_string(), value.to_string());
	}
}

#[async_trait]
impl TagTransport for FakeTagTransport {
	async fn list_tags(&self, resource: &str) -> Result<HashMap<String, String>, TransportError> {
		let resources = self.resources.lock().await;
		Ok(resources.get(resource).cloned().unwrap_or_default())
	}

	async fn tag_resource(&self, resource: &str, tags: HashMap<String, String>) -> Result<(), TransportError> {
		let mut resources = self.resources.lock().await;
		let entry = resources.entry(resource.to_string()).or_default();
		for (k, v) in tags {
			entry.insert(k, v);
		}
		Ok(())
	}

	async fn untag_resource(&self, resource: &str, tag_keys: Vec<String>) -> Result<(), TransportError> {
		let mut resources = self.resources.lock().await;
		if let Some(entry) = resources.get_mut(resource) {
			for key in tag_keys {
				entry.remove(&key);
			}
		}
		Ok(())
	}
}
