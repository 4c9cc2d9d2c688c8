use std::collections::HashMap;

use crate::models::{
    quotes::Quote,
    sync::{Conflict, Resolution},
};

/// Outcome of merging a remote set into the local collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Merge {
    pub quotes: Vec<Quote>,
    pub added: usize,
    pub replaced: usize,
}

impl Merge {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.replaced > 0
    }
}

/// Positions of local records by join key.
///
/// A remote record with an id joins on id, falling back to the text of local
/// records that have no id. A remote record without an id joins on text.
#[derive(Default)]
struct JoinIndex {
    by_id: HashMap<String, usize>,
    by_text: HashMap<String, usize>,
    unkeyed_by_text: HashMap<String, usize>,
}

impl JoinIndex {
    fn build(quotes: &[Quote]) -> Self {
        let mut index = JoinIndex::default();

        for (pos, quote) in quotes.iter().enumerate() {
            index.insert(pos, quote);
        }

        index
    }

    fn insert(&mut self, pos: usize, quote: &Quote) {
        match &quote.id {
            Some(id) => {
                self.by_id.entry(id.clone()).or_insert(pos);
            }
            None => {
                self.unkeyed_by_text.entry(quote.text.clone()).or_insert(pos);
            }
        }

        self.by_text.entry(quote.text.clone()).or_insert(pos);
    }

    fn remove(&mut self, pos: usize, quote: &Quote) {
        if let Some(id) = &quote.id {
            if self.by_id.get(id) == Some(&pos) {
                self.by_id.remove(id);
            }
        }

        for map in [&mut self.by_text, &mut self.unkeyed_by_text] {
            if map.get(&quote.text) == Some(&pos) {
                map.remove(&quote.text);
            }
        }
    }

    fn find(&self, remote: &Quote) -> Option<usize> {
        match &remote.id {
            Some(id) => self
                .by_id
                .get(id)
                .or_else(|| self.unkeyed_by_text.get(&remote.text))
                .copied(),
            None => self.by_text.get(&remote.text).copied(),
        }
    }

    /// True when `remote` would be found by an indexed id-less record with
    /// the same text, the reverse direction of `find`.
    fn claims(&self, remote: &Quote) -> bool {
        remote.id.is_some() && self.unkeyed_by_text.contains_key(&remote.text)
    }
}

/// Drops remote records that a later record of the same set would join on,
/// so every surviving record claims its own local counterpart. The last one
/// wins.
fn dedup_remote(remote: &[Quote]) -> Vec<&Quote> {
    let mut index = JoinIndex::default();
    let mut kept = Vec::with_capacity(remote.len());

    for server in remote.iter().rev() {
        if index.find(server).is_some() || index.claims(server) {
            continue;
        }

        index.insert(kept.len(), server);
        kept.push(server);
    }

    kept.reverse();
    kept
}

/// Remote records whose local counterpart carries different content.
pub fn detect_conflicts(local: &[Quote], remote: &[Quote]) -> Vec<Conflict> {
    let index = JoinIndex::build(local);

    dedup_remote(remote)
        .into_iter()
        .filter_map(|server| {
            let local = &local[index.find(server)?];

            if !local.differs_from(server) {
                return None;
            }

            let id = server
                .id
                .clone()
                .or_else(|| local.id.clone())
                .unwrap_or_else(|| server.text.clone());

            Some(Conflict {
                id,
                local: local.clone(),
                server: server.clone(),
            })
        })
        .collect()
}

/// Additive merge: local-only records always survive, unmatched remote
/// records are appended, and matched records follow `resolution`.
pub fn merge(local: &[Quote], remote: &[Quote], resolution: Resolution) -> Merge {
    let mut quotes = local.to_vec();
    let mut index = JoinIndex::build(&quotes);
    let mut added = 0;
    let mut replaced = 0;

    for server in dedup_remote(remote) {
        match index.find(server) {
            Some(pos) => {
                if !quotes[pos].differs_from(server) || resolution == Resolution::KeepLocal {
                    continue;
                }

                let old = std::mem::replace(&mut quotes[pos], server.clone());
                index.remove(pos, &old);
                index.insert(pos, server);
                replaced += 1;
            }
            None => {
                index.insert(quotes.len(), server);
                quotes.push(server.clone());
                added += 1;
            }
        }
    }

    Merge {
        quotes,
        added,
        replaced,
    }
}
