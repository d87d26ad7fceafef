use super::{DirectoryClient, DirectoryRecord, SearchRequest, SearchScope};
use crate::dn::{path_key, PathKey};
use crate::error::{InventoryError, Result};
use std::path::Path;

/// In-memory directory answering searches from a fixed set of records.
///
/// Loaded from a JSON array of `{"dn": ..., "attributes": {...}}` objects, so
/// an inventory can be built offline from an exported directory snapshot.
#[derive(Debug, Default)]
pub struct SnapshotDirectory {
    records: Vec<(PathKey, DirectoryRecord)>,
    searches: usize,
}

impl SnapshotDirectory {
    pub fn new(records: Vec<DirectoryRecord>) -> Result<Self> {
        let records = records
            .into_iter()
            .map(|record| Ok((path_key(&record.dn)?, record)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            records,
            searches: 0,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let unreadable = |reason: String| {
            InventoryError::DirectoryUnavailable(format!("snapshot {}: {reason}", path.display()))
        };
        let bytes = std::fs::read(path).map_err(|err| unreadable(err.to_string()))?;
        let records: Vec<DirectoryRecord> =
            serde_json::from_slice(&bytes).map_err(|err| unreadable(err.to_string()))?;
        tracing::debug!(path = %path.display(), records = records.len(), "loaded snapshot");
        Self::new(records)
    }

    /// Number of searches answered so far.
    #[cfg(test)]
    pub fn searches(&self) -> usize {
        self.searches
    }

    fn matching(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryRecord>> {
        self.searches += 1;
        tracing::debug!(
            search = self.searches,
            base = %request.base,
            filter = %request.filter,
            "snapshot search"
        );
        let base = path_key(&request.base)?;
        Ok(self
            .records
            .iter()
            .filter(|(key, _)| in_scope(key, &base, request.scope))
            .filter(|(_, record)| request.filter.matches(record))
            .map(|(_, record)| project(record, &request.attributes))
            .collect())
    }
}

impl DirectoryClient for SnapshotDirectory {
    fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryRecord>> {
        self.matching(request)
    }

    fn search_paged(
        &mut self,
        request: &SearchRequest,
        page_size: u32,
        sink: &mut dyn FnMut(DirectoryRecord) -> Result<()>,
    ) -> Result<()> {
        let records = self.matching(request)?;
        let page_size = usize::try_from(page_size).unwrap_or(usize::MAX).max(1);
        for (number, page) in records.chunks(page_size).enumerate() {
            tracing::trace!(page = number + 1, entries = page.len(), "snapshot page");
            for record in page {
                sink(record.clone())?;
            }
        }
        Ok(())
    }
}

fn in_scope(key: &PathKey, base: &PathKey, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => key == base,
        SearchScope::OneLevel => key.depth() == base.depth() + 1 && key.starts_with(base),
        SearchScope::Subtree => key.starts_with(base),
    }
}

/// Keep only the requested attributes, like a directory server would.
fn project(record: &DirectoryRecord, attributes: &[String]) -> DirectoryRecord {
    let mut projected = DirectoryRecord::new(record.dn.clone());
    for (name, values) in &record.attributes {
        if attributes.iter().any(|wanted| wanted.eq_ignore_ascii_case(name)) {
            projected.attributes.insert(name.clone(), values.clone());
        }
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::SnapshotDirectory;
    use crate::directory::{DirectoryClient, DirectoryRecord, Filter, SearchRequest, SearchScope};

    fn directory() -> SnapshotDirectory {
        SnapshotDirectory::new(vec![
            DirectoryRecord::new("ou=hosts,dc=example")
                .with_values("objectClass", ["organizationalUnit"]),
            DirectoryRecord::new("cn=h1,ou=hosts,dc=example")
                .with_values("objectClass", ["device"])
                .with_values("cn", ["h1"])
                .with_values("description", ["first"]),
            DirectoryRecord::new("cn=h2,ou=rack,ou=hosts,dc=example")
                .with_values("objectClass", ["device"])
                .with_values("cn", ["h2"]),
        ])
        .expect("valid snapshot")
    }

    fn request(base: &str, scope: SearchScope) -> SearchRequest {
        SearchRequest {
            base: base.to_string(),
            scope,
            filter: Filter::object_class("device"),
            attributes: vec!["cn".to_string()],
        }
    }

    fn dns(records: &[DirectoryRecord]) -> Vec<&str> {
        records.iter().map(|record| record.dn.as_str()).collect()
    }

    #[test]
    fn scopes_follow_the_path_hierarchy() {
        let mut directory = directory();
        let sub = directory.search(&request("OU=hosts, dc=example", SearchScope::Subtree)).unwrap();
        assert_eq!(
            dns(&sub),
            vec![
                "cn=h1,ou=hosts,dc=example",
                "cn=h2,ou=rack,ou=hosts,dc=example"
            ]
        );

        let one = directory.search(&request("ou=hosts,dc=example", SearchScope::OneLevel)).unwrap();
        assert_eq!(dns(&one), vec!["cn=h1,ou=hosts,dc=example"]);

        let base = directory
            .search(&request(
                "cn=h2,ou=rack,ou=hosts,dc=example",
                SearchScope::Base,
            ))
            .unwrap();
        assert_eq!(dns(&base), vec!["cn=h2,ou=rack,ou=hosts,dc=example"]);
        assert_eq!(directory.searches(), 3);
    }

    #[test]
    fn only_requested_attributes_are_returned() {
        let mut directory = directory();
        let records = directory
            .search(&request("cn=h1,ou=hosts,dc=example", SearchScope::Base))
            .unwrap();
        assert_eq!(records[0].values("cn"), ["h1".to_string()]);
        assert!(records[0].values("description").is_empty());
    }

    #[test]
    fn missing_base_is_an_empty_result() {
        let mut directory = directory();
        let records = directory
            .search(&request("ou=nowhere,dc=example", SearchScope::Subtree))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn paged_search_feeds_every_record() {
        let mut directory = directory();
        let mut seen = Vec::new();
        directory
            .search_paged(&request("dc=example", SearchScope::Subtree), 1, &mut |record| {
                seen.push(record.dn);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn snapshot_file_loads_records() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"[{"dn": "cn=h1,dc=example", "attributes": {"objectClass": ["device"], "cn": ["h1"]}}]"#,
        )
        .expect("write snapshot");
        let mut directory = SnapshotDirectory::load(&path).expect("load snapshot");
        let records = directory.search(&request("dc=example", SearchScope::Subtree)).unwrap();
        assert_eq!(dns(&records), vec!["cn=h1,dc=example"]);
    }
}
