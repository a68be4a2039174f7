//! The read-only disease registry built once at startup.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::entities::candidate::DiseaseCandidate;
use crate::entities::disease::{Disease, DiseaseKey, Vocabulary};
use crate::error::MatcherError;
use crate::sources::mondo::{self, MondoTerm};
use crate::sources::omim::{self, GenemapRow, MimTitle};

pub(crate) mod gene_index;

use gene_index::{GeneIndex, GeneIndexStats};

/// Every known OMIM and MONDO disease, their cross-references and the gene index.
///
/// OMIM and MONDO records for the same concept stay separate and are linked
/// only through the cross-reference map.
#[derive(Debug)]
pub struct DiseaseRegistry {
    diseases: Vec<Disease>,
    by_key: HashMap<DiseaseKey, usize>,
    cross_refs: HashMap<DiseaseKey, DiseaseKey>,
    gene_index: GeneIndex,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegistryStats {
    pub omim_diseases: usize,
    pub mondo_diseases: usize,
    pub cross_references: usize,
    pub genes: GeneIndexStats,
}

impl DiseaseRegistry {
    pub fn len(&self) -> usize {
        self.diseases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diseases.is_empty()
    }

    /// Records in load order.
    pub fn diseases(&self) -> &[Disease] {
        &self.diseases
    }

    pub fn get(&self, key: &DiseaseKey) -> Option<&Disease> {
        self.by_key.get(key).map(|&i| &self.diseases[i])
    }

    pub fn cross_reference(&self, key: &DiseaseKey) -> Option<&DiseaseKey> {
        self.cross_refs.get(key)
    }

    /// `MONDO:xxxxxxx` for a bare OMIM number.
    pub fn mondo_for_omim(&self, omim_digits: &str) -> Option<String> {
        self.cross_reference(&DiseaseKey::omim(omim_digits))
            .and_then(DiseaseKey::mondo_curie)
    }

    /// Bare OMIM number for a MONDO id in any accepted spelling.
    pub fn omim_for_mondo(&self, mondo_id: &str) -> Option<String> {
        let key = DiseaseKey::parse(mondo_id)?;
        self.cross_reference(&key)
            .and_then(DiseaseKey::omim_digits)
            .map(str::to_string)
    }

    /// Fills whichever of `omim_id`/`mondo_id` is missing from the cross-reference map.
    pub fn enrich(&self, candidate: &mut DiseaseCandidate) {
        if candidate.mondo_id.is_none() {
            if let Some(omim) = candidate.omim_id.as_deref() {
                candidate.mondo_id = self.mondo_for_omim(omim);
            }
        }
        if candidate.omim_id.is_none() {
            if let Some(mondo) = candidate.mondo_id.as_deref() {
                candidate.omim_id = self.omim_for_mondo(mondo);
            }
        }
    }

    pub fn gene_index(&self) -> &GeneIndex {
        &self.gene_index
    }

    /// Registry records linked to `symbol` through the gene index.
    pub fn diseases_for_gene(&self, symbol: &str, include_aliases: bool) -> Vec<&Disease> {
        self.gene_index
            .search_by_gene(symbol, include_aliases)
            .iter()
            .filter_map(|key| self.get(key))
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let omim_diseases = self
            .diseases
            .iter()
            .filter(|d| d.source == Vocabulary::Omim)
            .count();
        RegistryStats {
            omim_diseases,
            mondo_diseases: self.diseases.len() - omim_diseases,
            cross_references: self
                .cross_refs
                .keys()
                .filter(|k| matches!(k, DiseaseKey::Omim(_)))
                .count(),
            genes: self.gene_index.stats(),
        }
    }
}

/// Accumulates parsed source records; OMIM must be added before MONDO so
/// MONDO records can inherit genes through their OMIM cross-reference.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    diseases: Vec<Disease>,
    by_key: HashMap<DiseaseKey, usize>,
    cross_refs: HashMap<DiseaseKey, DiseaseKey>,
    gene_index: GeneIndex,
}

impl RegistryBuilder {
    fn entry(&mut self, key: DiseaseKey, name: &str, source: Vocabulary) -> &mut Disease {
        let idx = match self.by_key.get(&key) {
            Some(&idx) => idx,
            None => {
                self.diseases.push(Disease::new(key.clone(), name, source));
                self.by_key.insert(key, self.diseases.len() - 1);
                self.diseases.len() - 1
            }
        };
        &mut self.diseases[idx]
    }

    pub fn add_mim_titles(mut self, titles: Vec<MimTitle>) -> Self {
        for title in titles {
            let key = DiseaseKey::omim(&title.mim_number);
            let disease = self.entry(key, &title.preferred_title, Vocabulary::Omim);
            for alt in title
                .preferred_symbol
                .into_iter()
                .chain(title.alternative_titles)
            {
                if alt != disease.name && !disease.alternative_names.contains(&alt) {
                    disease.alternative_names.push(alt);
                }
            }
        }
        self
    }

    pub fn add_genemap(mut self, rows: Vec<GenemapRow>) -> Self {
        for row in rows {
            let symbols = row.all_symbols();
            if let Some(approved) = row.approved_symbol.as_deref() {
                for raw in &row.gene_symbols {
                    self.gene_index.add_alias(raw, approved);
                }
            }
            for phenotype in &row.phenotypes {
                let key = DiseaseKey::omim(&phenotype.mim_number);
                let disease = self.entry(key.clone(), &phenotype.name, Vocabulary::Omim);
                for symbol in &symbols {
                    disease.add_gene(symbol);
                }
                for symbol in &symbols {
                    self.gene_index.link(symbol, key.clone());
                }
            }
        }
        self
    }

    pub fn add_mondo(mut self, terms: Vec<MondoTerm>) -> Self {
        for term in terms {
            let key = DiseaseKey::mondo(&term.id);
            let omim_key = term.omim_xrefs.first().map(|digits| DiseaseKey::omim(digits));
            for digits in &term.omim_xrefs {
                self.cross_refs
                    .entry(DiseaseKey::omim(digits))
                    .or_insert_with(|| key.clone());
            }
            if let Some(omim_key) = &omim_key {
                self.cross_refs
                    .entry(key.clone())
                    .or_insert_with(|| omim_key.clone());
            }

            let inherited_genes = self
                .cross_refs
                .get(&key)
                .and_then(|omim| self.by_key.get(omim))
                .map(|&idx| self.diseases[idx].genes.clone())
                .unwrap_or_default();

            let disease = self.entry(key.clone(), &term.name, Vocabulary::Mondo);
            disease.exact_synonyms = term.exact_synonyms;
            disease.related_synonyms = term.related_synonyms;
            disease.alternative_names = term.other_synonyms;
            disease.subsets = term.subsets;
            for gene in &inherited_genes {
                disease.add_gene(gene);
            }
            for gene in &inherited_genes {
                self.gene_index.link(gene, key.clone());
            }
        }
        self
    }

    pub fn build(self) -> Result<DiseaseRegistry, MatcherError> {
        if self.diseases.is_empty() {
            return Err(MatcherError::SourceUnavailable {
                source_name: "disease registry".into(),
                reason: "No OMIM or MONDO diseases were loaded.".into(),
                suggestion: "check DISEASE_MATCHER_DATASETS_DIR".into(),
            });
        }

        let mut diseases = self.diseases;
        for disease in &mut diseases {
            disease.cross_reference = self.cross_refs.get(&disease.id).cloned();
        }

        Ok(DiseaseRegistry {
            diseases,
            by_key: self.by_key,
            cross_refs: self.cross_refs,
            gene_index: self.gene_index,
        })
    }
}

fn open_dataset(path: &Path) -> Result<BufReader<File>, MatcherError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| MatcherError::Dataset {
            path: path.display().to_string(),
            message: err.to_string(),
        })
}

fn load_mondo_terms(settings: &Settings) -> Result<Vec<MondoTerm>, MatcherError> {
    let json_path = settings.mondo_json_path();
    if json_path.exists() {
        return mondo::parse_mondo_json(open_dataset(&json_path)?).map_err(|err| {
            MatcherError::Dataset {
                path: json_path.display().to_string(),
                message: err.to_string(),
            }
        });
    }
    let obo_path = settings.mondo_obo_path();
    if obo_path.exists() {
        return mondo::parse_mondo_obo(open_dataset(&obo_path)?);
    }
    warn!(
        json = %json_path.display(),
        obo = %obo_path.display(),
        "MONDO ontology not found; continuing with OMIM only"
    );
    Ok(Vec::new())
}

/// Loads every reference file named by `settings`.
///
/// A missing `genemap2.txt` or an empty registry is fatal; missing titles or
/// ontology files only reduce coverage.
pub fn load(settings: &Settings) -> Result<DiseaseRegistry, MatcherError> {
    if !settings.genemap_path.exists() {
        return Err(MatcherError::SourceUnavailable {
            source_name: "genemap2".into(),
            reason: format!("{} does not exist.", settings.genemap_path.display()),
            suggestion: "download genemap2.txt from OMIM or set DISEASE_MATCHER_GENEMAP_PATH"
                .into(),
        });
    }

    let titles_path = settings.mim_titles_path();
    let titles = if titles_path.exists() {
        omim::parse_mim_titles(open_dataset(&titles_path)?)?
    } else {
        warn!(path = %titles_path.display(), "mimTitles.txt not found; OMIM names come from genemap2 only");
        Vec::new()
    };
    let genemap = omim::parse_genemap(open_dataset(&settings.genemap_path)?)?;
    let mondo_terms = load_mondo_terms(settings)?;

    info!(
        mim_titles = titles.len(),
        genemap_rows = genemap.len(),
        mondo_terms = mondo_terms.len(),
        "Parsed reference datasets"
    );

    let registry = RegistryBuilder::default()
        .add_mim_titles(titles)
        .add_genemap(genemap)
        .add_mondo(mondo_terms)
        .build()?;

    let stats = registry.stats();
    info!(
        omim = stats.omim_diseases,
        mondo = stats.mondo_diseases,
        cross_references = stats.cross_references,
        genes = stats.genes.total_genes,
        aliases = stats.genes.total_aliases,
        "Disease registry ready"
    );
    Ok(registry)
}
