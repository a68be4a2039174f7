use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::entities::disease::DiseaseKey;

/// The single gene-symbol → disease index.
///
/// Symbols are upper-cased on ingest. Raw symbols listed next to an approved
/// symbol become aliases of it; a lookup through any member of an alias group
/// sees the diseases indexed under every member.
#[derive(Debug, Clone, Default)]
pub struct GeneIndex {
    by_symbol: HashMap<String, Vec<DiseaseKey>>,
    alias_to_primary: HashMap<String, String>,
    primary_to_aliases: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GeneIndexStats {
    pub total_genes: usize,
    pub total_aliases: usize,
    pub total_disease_associations: usize,
    pub unique_diseases: usize,
}

fn fold_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl GeneIndex {
    pub fn link(&mut self, symbol: &str, disease: DiseaseKey) {
        let symbol = fold_symbol(symbol);
        if symbol.is_empty() {
            return;
        }
        let entries = self.by_symbol.entry(symbol).or_default();
        if !entries.contains(&disease) {
            entries.push(disease);
        }
    }

    /// Registers `alias` as another name for `primary`; the first registration wins.
    pub fn add_alias(&mut self, alias: &str, primary: &str) {
        let alias = fold_symbol(alias);
        let primary = fold_symbol(primary);
        if alias.is_empty() || primary.is_empty() || alias == primary {
            return;
        }
        if self.alias_to_primary.contains_key(&alias) {
            return;
        }
        self.alias_to_primary.insert(alias.clone(), primary.clone());
        self.primary_to_aliases
            .entry(primary)
            .or_default()
            .push(alias);
    }

    pub fn contains(&self, symbol: &str) -> bool {
        let symbol = fold_symbol(symbol);
        self.by_symbol.contains_key(&symbol) || self.alias_to_primary.contains_key(&symbol)
    }

    pub fn primary_symbol(&self, symbol: &str) -> String {
        let symbol = fold_symbol(symbol);
        self.alias_to_primary.get(&symbol).cloned().unwrap_or(symbol)
    }

    /// Other members of the symbol's alias group (primary first).
    pub fn aliases_of(&self, symbol: &str) -> Vec<String> {
        let symbol = fold_symbol(symbol);
        let primary = self.primary_symbol(&symbol);
        std::iter::once(primary.clone())
            .chain(
                self.primary_to_aliases
                    .get(&primary)
                    .into_iter()
                    .flatten()
                    .cloned(),
            )
            .filter(|s| *s != symbol)
            .collect()
    }

    /// Diseases linked to `symbol`, deduplicated with first occurrence winning.
    ///
    /// Order: the queried symbol, then its primary symbol, then the primary's
    /// aliases in registration order. Unknown symbols yield an empty list.
    pub fn search_by_gene(&self, symbol: &str, include_aliases: bool) -> Vec<DiseaseKey> {
        let symbol = fold_symbol(symbol);
        if symbol.is_empty() {
            return Vec::new();
        }

        let mut lookups = vec![symbol.clone()];
        if include_aliases {
            let primary = self.primary_symbol(&symbol);
            lookups.push(primary.clone());
            if let Some(aliases) = self.primary_to_aliases.get(&primary) {
                lookups.extend(aliases.iter().cloned());
            }
        }

        let mut seen = HashSet::new();
        lookups
            .iter()
            .filter_map(|s| self.by_symbol.get(s))
            .flatten()
            .filter(|key| seen.insert((*key).clone()))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> GeneIndexStats {
        let unique: HashSet<&DiseaseKey> = self.by_symbol.values().flatten().collect();
        GeneIndexStats {
            total_genes: self.by_symbol.len(),
            total_aliases: self.alias_to_primary.len(),
            total_disease_associations: self.by_symbol.values().map(Vec::len).sum(),
            unique_diseases: unique.len(),
        }
    }
}
