//! Mapping between client-generated message IDs and the IDs the server
//! assigns once a message is stored.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimisticIds {
    to_server: HashMap<String, String>,
    to_client: HashMap<String, String>,
}

impl OptimisticIds {
    /// Record that `client_id` was stored as `server_id`. Any earlier
    /// pairing of either ID is dropped.
    pub fn link(&mut self, client_id: &str, server_id: &str) {
        self.remove_client(client_id);
        self.remove_server(server_id);
        self.to_server
            .insert(client_id.to_string(), server_id.to_string());
        self.to_client
            .insert(server_id.to_string(), client_id.to_string());
    }

    pub fn server_id(&self, client_id: &str) -> Option<&str> {
        self.to_server.get(client_id).map(String::as_str)
    }

    pub fn client_id(&self, server_id: &str) -> Option<&str> {
        self.to_client.get(server_id).map(String::as_str)
    }

    pub fn remove_client(&mut self, client_id: &str) -> Option<String> {
        let server_id = self.to_server.remove(client_id)?;
        self.to_client.remove(&server_id);
        Some(server_id)
    }

    pub fn remove_server(&mut self, server_id: &str) -> Option<String> {
        let client_id = self.to_client.remove(server_id)?;
        self.to_server.remove(&client_id);
        Some(client_id)
    }

    pub fn len(&self) -> usize {
        self.to_server.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_server.is_empty()
    }

    pub fn clear(&mut self) {
        self.to_server.clear();
        self.to_client.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_work_both_ways() {
        let mut ids = OptimisticIds::default();
        ids.link("tmp-1", "m-1");
        assert_eq!(ids.server_id("tmp-1"), Some("m-1"));
        assert_eq!(ids.client_id("m-1"), Some("tmp-1"));

        assert_eq!(ids.remove_server("m-1"), Some("tmp-1".to_string()));
        assert!(ids.is_empty());
        assert_eq!(ids.client_id("m-1"), None);
    }

    #[test]
    fn relinking_replaces_stale_pairs() {
        let mut ids = OptimisticIds::default();
        ids.link("tmp-1", "m-1");
        ids.link("tmp-1", "m-2");
        assert_eq!(ids.len(), 1);
        assert_eq!(ids.client_id("m-1"), None);
        assert_eq!(ids.client_id("m-2"), Some("tmp-1"));
    }
}
