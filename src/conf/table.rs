//! Ordered path table and lookup
//!
//! The table keeps entries in declaration order. Lookups go literal name
//! first, then `~` patterns in declaration order, then the `all` /
//! `all_others` catch-alls.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::{ConfError, PathError};
use super::name::{is_reserved, validate_path_name};
use super::path::PathConf;

/// Result of resolving a requested path name
#[derive(Debug, Clone)]
pub struct PathMatch {
    /// Configuration that applies to the path
    pub conf: Arc<PathConf>,
    /// Submatches when a pattern entry matched (group 0 = whole name)
    pub matches: Option<Vec<String>>,
}

impl PathMatch {
    /// Capture groups as a slice (empty for literal matches)
    pub fn captures(&self) -> &[String] {
        self.matches.as_deref().unwrap_or_default()
    }
}

/// Validated path entries in declaration order
#[derive(Debug, Clone, Default)]
pub struct PathTable {
    entries: Vec<Arc<PathConf>>,
    index: HashMap<String, usize>,
}

impl PathTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append an entry
    pub fn insert(&mut self, name: &str, mut conf: PathConf) -> Result<(), ConfError> {
        if self.index.contains_key(name) {
            return Err(ConfError::DuplicatePath(name.to_string()));
        }

        conf.validate(name)?;

        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(Arc::new(conf));
        Ok(())
    }

    /// Entry declared under exactly this name
    pub fn get(&self, name: &str) -> Option<&Arc<PathConf>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Iterate entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PathConf>> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a requested path name
    pub fn find(&self, name: &str) -> Result<PathMatch, PathError> {
        find_path_conf(self, name)
    }
}

/// Find the configuration that applies to `name`
///
/// Precedence: entry declared under exactly `name`, then pattern entries in
/// declaration order, then `all` / `all_others`. Exact matches carry no capture groups.
pub fn find_path_conf(table: &PathTable, name: &str) -> Result<PathMatch, PathError> {
    validate_path_name(name).map_err(|reason| PathError::InvalidName {
        name: name.to_string(),
        reason,
    })?;

    // exact name, including a request spelled like a pattern or catch-all entry
    if let Some(conf) = table.get(name) {
        return Ok(PathMatch {
            conf: Arc::clone(conf),
            matches: None,
        });
    }

    let pattern_match = |conf: &Arc<PathConf>| {
        conf.regexp
            .as_ref()
            .and_then(|re| re.captures(name))
            .map(|matches| PathMatch {
                conf: Arc::clone(conf),
                matches: Some(matches),
            })
    };

    // regular expression paths
    if let Some(found) = table
        .iter()
        .filter(|conf| !is_reserved(&conf.name))
        .find_map(pattern_match)
    {
        return Ok(found);
    }

    // catch-alls go after every other entry
    table
        .iter()
        .filter(|conf| is_reserved(&conf.name))
        .find_map(pattern_match)
        .ok_or_else(|| PathError::NotConfigured(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::NameError;

    fn table(entries: &[(&str, PathConf)]) -> PathTable {
        let mut table = PathTable::new();
        for (name, conf) in entries {
            table.insert(name, conf.clone()).unwrap();
        }
        table
    }

    fn on_demand(source: &str) -> PathConf {
        PathConf::default().source(source).source_on_demand(true)
    }

    #[test]
    fn test_literal_beats_pattern() {
        let table = table(&[
            (r"~^cam-(\d+)$", on_demand("rtsp://10.0.0.$G1/live")),
            ("cam-1", PathConf::default().source("rtsp://special/live")),
        ]);

        let found = table.find("cam-1").unwrap();
        assert_eq!(found.conf.name, "cam-1");
        assert!(found.matches.is_none());
        assert!(found.captures().is_empty());

        let found = table.find("cam-2").unwrap();
        assert_eq!(found.conf.name, r"~^cam-(\d+)$");
        assert_eq!(
            found.matches,
            Some(vec!["cam-2".to_string(), "2".to_string()])
        );
    }

    #[test]
    fn test_pattern_beats_catch_all() {
        // catch-alls declared first still lose
        let table = table(&[
            ("all_others", PathConf::default()),
            ("all", PathConf::default()),
            (r"~^cam-(\d+)$", on_demand("rtsp://10.0.0.$G1/live")),
        ]);

        let found = table.find("cam-7").unwrap();
        assert_eq!(found.conf.name, r"~^cam-(\d+)$");

        let found = table.find("other").unwrap();
        assert_eq!(found.conf.name, "all_others");
        assert_eq!(found.matches, Some(vec!["other".to_string()]));
    }

    #[test]
    fn test_overlapping_patterns_use_declaration_order() {
        let table = table(&[
            ("~^cam-a", PathConf::default().max_readers(1)),
            ("~^cam-", PathConf::default().max_readers(2)),
        ]);
        assert_eq!(table.find("cam-a1").unwrap().conf.max_readers, 1);
        assert_eq!(table.find("cam-b1").unwrap().conf.max_readers, 2);
    }

    #[test]
    fn test_exact_name_of_pattern_entry() {
        let table = table(&[
            ("~cam", PathConf::default().max_readers(1)),
            ("all", PathConf::default().max_readers(2)),
        ]);

        let found = table.find("~cam").unwrap();
        assert_eq!(found.conf.name, "~cam");
        assert!(found.matches.is_none());

        let found = table.find("all").unwrap();
        assert_eq!(found.conf.max_readers, 2);
        assert!(found.matches.is_none());

        // still a pattern for every other name
        let found = table.find("xcamx").unwrap();
        assert_eq!(found.conf.name, "~cam");
        assert_eq!(found.matches, Some(vec!["cam".to_string()]));
    }

    #[test]
    fn test_not_configured() {
        let table = table(&[("cam1", PathConf::default())]);
        assert_eq!(
            table.find("cam2").unwrap_err(),
            PathError::NotConfigured("cam2".to_string())
        );
    }

    #[test]
    fn test_invalid_requested_names() {
        let table = table(&[("all", PathConf::default())]);
        for (name, reason) in [
            ("", NameError::Empty),
            ("/x", NameError::LeadingSlash),
            ("x/", NameError::TrailingSlash),
            ("x y", NameError::InvalidCharacters),
        ] {
            assert_eq!(
                table.find(name).unwrap_err(),
                PathError::InvalidName {
                    name: name.to_string(),
                    reason
                }
            );
        }
        assert!(table.find("a/b-1_2.c").is_ok());
    }

    #[test]
    fn test_optional_group_is_empty_string() {
        let table = table(&[(r"~^cam(-(\d+))?$", PathConf::default())]);
        let found = table.find("cam").unwrap();
        assert_eq!(
            found.matches,
            Some(vec!["cam".to_string(), String::new(), String::new()])
        );
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut table = PathTable::new();
        table.insert("cam", PathConf::default()).unwrap();
        assert!(matches!(
            table.insert("cam", PathConf::default()),
            Err(ConfError::DuplicatePath(_))
        ));
        assert_eq!(table.len(), 1);
    }
}
