//! Descriptor Scanner - 깊이 제한 BFS
//!
//! Search roots are depth 0. Every level is a sorted, de-duplicated frontier,
//! so two scans of an unchanged tree produce the same descriptors in the same
//! order. A directory that is identified is reported and not descended into;
//! links are examined but never descended into (roots excepted).

use crate::descriptor::{Descriptor, DescriptorBuilder, LinkType};
use crate::software::{DescriptorRegistration, SoftwareHandler};
use qavm_foundation::{Error, Result, DEFAULT_MAX_DEPTH};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy)]
pub struct DescriptorScanner {
    max_depth: usize,
}

impl Default for DescriptorScanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl DescriptorScanner {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Scan for one descriptor type of one handler
    pub fn scan(
        &self,
        software_uid: &str,
        type_key: &str,
        registration: &DescriptorRegistration,
        search_paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<Vec<Descriptor>> {
        let qualifier = &registration.qualifier;
        let config = qualifier.identification_config();
        let roots = qualifier.process_search_paths(search_paths.to_vec());
        debug!(
            software = software_uid,
            type_key,
            roots = roots.len(),
            max_depth = self.max_depth,
            "Scanning"
        );

        let mut frontier: BTreeSet<PathBuf> = roots.into_iter().filter(|p| p.is_dir()).collect();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut seen_uids: HashSet<String> = HashSet::new();
        let mut found = Vec::new();

        for depth in 0..=self.max_depth {
            if frontier.is_empty() {
                break;
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut next = BTreeSet::new();
            for dir in frontier {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if !visited.insert(dir.clone()) {
                    continue;
                }
                trace!(depth, dir = %dir.display(), "Examining");

                if config.matches(&dir) {
                    let contents = config.read_contents(&dir);
                    if qualifier.identify(&dir, &contents) {
                        let mut builder = DescriptorBuilder::new(&dir, software_uid, type_key);
                        match registration.factory.populate(&mut builder, &contents) {
                            Ok(()) => {
                                let descriptor = builder.build();
                                if seen_uids.insert(descriptor.uid().to_string()) {
                                    debug!(dir = %dir.display(), uid = descriptor.uid(), "Identified");
                                    found.push(descriptor);
                                }
                            }
                            Err(e) => warn!(dir = %dir.display(), "Descriptor rejected: {}", e),
                        }
                        continue;
                    }
                }

                if depth == self.max_depth || (depth > 0 && LinkType::detect(&dir).is_link()) {
                    continue;
                }
                next.extend(subdirectories(&dir));
            }
            frontier = next;
        }

        debug!(software = software_uid, type_key, found = found.len(), "Scan finished");
        Ok(found)
    }

    /// Scan every descriptor type of a handler, keyed by type key
    pub fn scan_handler(
        &self,
        handler: &SoftwareHandler,
        search_paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, Vec<Descriptor>>> {
        let software_uid = handler.uid();
        let mut results = BTreeMap::new();
        for (type_key, registration) in handler.descriptors() {
            let found = self.scan(&software_uid, type_key, registration, search_paths, cancel)?;
            results.insert(type_key.clone(), found);
        }
        Ok(results)
    }
}

/// Sorted child directories; unreadable directories yield nothing
fn subdirectories(dir: &Path) -> BTreeSet<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect(),
        Err(e) => {
            trace!(dir = %dir.display(), "Skipping unreadable directory: {}", e);
            BTreeSet::new()
        }
    }
}
