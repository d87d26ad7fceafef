use super::{DirectoryClient, DirectoryRecord, SearchRequest, SearchScope};
use crate::config::Config;
use crate::error::{InventoryError, Result};
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{LdapConn, LdapConnSettings, LdapError, Scope, SearchEntry};
use std::time::Duration;

/// `noSuchObject`: the search base does not exist, which is an empty result here.
const RC_NO_SUCH_OBJECT: u32 = 32;

/// Synchronous LDAP connection bound once per process.
pub struct LdapDirectory {
    conn: LdapConn,
}

impl LdapDirectory {
    pub fn connect(config: &Config) -> Result<Self> {
        let settings =
            LdapConnSettings::new().set_conn_timeout(Duration::from_secs(config.timeout));
        let mut conn = LdapConn::with_settings(settings, &config.uri)
            .map_err(|err| unavailable(&format!("connect to {}", config.uri), err))?;

        if let Some(binddn) = &config.binddn {
            let password = config.bindpw.as_deref().unwrap_or_default();
            conn.simple_bind(binddn, password)
                .and_then(|result| result.success())
                .map_err(|err| unavailable(&format!("bind as {binddn}"), err))?;
            tracing::debug!(binddn = %binddn, "bound to directory");
        } else {
            tracing::debug!("using anonymous bind");
        }

        Ok(Self { conn })
    }
}

impl DirectoryClient for LdapDirectory {
    fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryRecord>> {
        let filter = request.filter.to_string();
        let attrs: Vec<&str> = request.attributes.iter().map(String::as_str).collect();
        tracing::debug!(base = %request.base, filter = %filter, "search");

        let result = self
            .conn
            .search(&request.base, scope(request.scope), &filter, attrs)
            .map_err(|err| unavailable(&format!("search {}", request.base), err))?;
        if result.1.rc == RC_NO_SUCH_OBJECT {
            return Ok(Vec::new());
        }
        let (entries, _) = result
            .success()
            .map_err(|err| unavailable(&format!("search {}", request.base), err))?;
        Ok(entries
            .into_iter()
            .map(|entry| record(SearchEntry::construct(entry)))
            .collect())
    }

    fn search_paged(
        &mut self,
        request: &SearchRequest,
        page_size: u32,
        sink: &mut dyn FnMut(DirectoryRecord) -> Result<()>,
    ) -> Result<()> {
        let filter = request.filter.to_string();
        let attrs: Vec<&str> = request.attributes.iter().map(String::as_str).collect();
        let page_size = i32::try_from(page_size).unwrap_or(i32::MAX);
        tracing::debug!(base = %request.base, filter = %filter, page_size, "paged search");

        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(page_size)),
        ];
        let context = format!("search {}", request.base);
        let mut stream = self
            .conn
            .streaming_search_with(adapters, &request.base, scope(request.scope), &filter, attrs)
            .map_err(|err| unavailable(&context, err))?;

        while let Some(entry) = stream.next().map_err(|err| unavailable(&context, err))? {
            sink(record(SearchEntry::construct(entry)))?;
        }

        let result = stream.result();
        if result.rc == RC_NO_SUCH_OBJECT {
            return Ok(());
        }
        result.success().map_err(|err| unavailable(&context, err))?;
        Ok(())
    }
}

impl Drop for LdapDirectory {
    fn drop(&mut self) {
        if let Err(err) = self.conn.unbind() {
            tracing::debug!(error = %err, "unbind failed");
        }
    }
}

fn scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

fn record(entry: SearchEntry) -> DirectoryRecord {
    DirectoryRecord {
        dn: entry.dn,
        attributes: entry.attrs.into_iter().collect(),
    }
}

fn unavailable(context: &str, err: LdapError) -> InventoryError {
    InventoryError::DirectoryUnavailable(format!("{context}: {err}"))
}
