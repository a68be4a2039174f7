//! Russian diagnosis text → English search queries.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::sources::llm::{ChatRequest, LlmClient};
use crate::sources::retry::{RetryPolicy, with_retry};

const TRANSLATE_API: &str = "query-translation";
const SYSTEM_PROMPT: &str = include_str!("../../templates/prompts/translate_system.txt");
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 500;

const FALLBACK_DICTIONARY: &[(&str, &str)] = &[
    ("мышечная дистрофия", "muscular dystrophy"),
    ("дюшенна", "duchenne"),
    ("беккера", "becker"),
    ("синдром", "syndrome"),
    ("болезнь", "disease"),
    ("дауна", "down"),
    ("вильсона", "wilson"),
    ("паркинсона", "parkinson"),
    ("альцгеймера", "alzheimer"),
    ("хантингтона", "huntington"),
    ("гоше", "gaucher"),
    ("помпе", "pompe"),
    ("фабри", "fabry"),
    ("ниманна-пика", "niemann-pick"),
    ("тея-сакса", "tay-sachs"),
    ("краббе", "krabbe"),
    ("метахроматическая лейкодистрофия", "metachromatic leukodystrophy"),
    ("адренолейкодистрофия", "adrenoleukodystrophy"),
    ("муковисцидоз", "cystic fibrosis"),
    ("фенилкетонурия", "phenylketonuria"),
    ("галактоземия", "galactosemia"),
    ("гомоцистинурия", "homocystinuria"),
    ("тирозинемия", "tyrosinemia"),
    ("кленового сиропа", "maple syrup urine"),
    ("глутаровая ацидурия", "glutaric aciduria"),
    ("метилмалоновая ацидемия", "methylmalonic acidemia"),
    ("пропионовая ацидемия", "propionic acidemia"),
    ("изовалериановая ацидемия", "isovaleric acidemia"),
    ("дефицит биотинидазы", "biotinidase deficiency"),
    ("карнитиновая недостаточность", "carnitine deficiency"),
    ("митохондриальная", "mitochondrial"),
    ("лизосомная", "lysosomal"),
    ("пероксисомная", "peroxisomal"),
    ("гликогеноз", "glycogen storage disease"),
    ("порфирия", "porphyria"),
    ("гемофилия", "hemophilia"),
    ("талассемия", "thalassemia"),
    ("серповидноклеточная", "sickle cell"),
    ("анемия", "anemia"),
    ("тромбоцитопения", "thrombocytopenia"),
    ("нейтропения", "neutropenia"),
    ("иммунодефицит", "immunodeficiency"),
    ("аутоиммунный", "autoimmune"),
    ("ревматоидный артрит", "rheumatoid arthritis"),
    ("системная красная волчанка", "systemic lupus erythematosus"),
    ("склеродермия", "scleroderma"),
    ("дерматомиозит", "dermatomyositis"),
    ("полимиозит", "polymyositis"),
    ("васкулит", "vasculitis"),
    ("гранулематоз", "granulomatosis"),
    ("саркоидоз", "sarcoidosis"),
    ("амилоидоз", "amyloidosis"),
    ("бронхиальная астма", "bronchial asthma"),
    (
        "хроническая обструктивная болезнь легких",
        "chronic obstructive pulmonary disease",
    ),
    ("идиопатический легочный фиброз", "idiopathic pulmonary fibrosis"),
    ("легочная гипертензия", "pulmonary hypertension"),
    ("апноэ сна", "sleep apnea"),
    ("нарколепсия", "narcolepsy"),
    ("эпилепсия", "epilepsy"),
    ("мигрень", "migraine"),
    ("рассеянный склероз", "multiple sclerosis"),
    ("боковой амиотрофический склероз", "amyotrophic lateral sclerosis"),
    ("спинальная мышечная атрофия", "spinal muscular atrophy"),
    ("миастения", "myasthenia gravis"),
    ("периферическая нейропатия", "peripheral neuropathy"),
    ("синдром гийена-барре", "guillain-barre syndrome"),
    (
        "хроническая воспалительная демиелинизирующая полинейропатия",
        "chronic inflammatory demyelinating polyneuropathy",
    ),
    ("наследственная", "hereditary"),
    ("врожденная", "congenital"),
    ("приобретенная", "acquired"),
    ("идиопатическая", "idiopathic"),
    ("первичная", "primary"),
    ("вторичная", "secondary"),
    ("острая", "acute"),
    ("хроническая", "chronic"),
    ("прогрессирующая", "progressive"),
    ("рецидивирующая", "relapsing"),
    ("ремиттирующая", "remitting"),
    ("злокачественная", "malignant"),
    ("доброкачественная", "benign"),
    ("метастатическая", "metastatic"),
    ("инвазивная", "invasive"),
    ("карцинома", "carcinoma"),
    ("саркома", "sarcoma"),
    ("лимфома", "lymphoma"),
    ("лейкемия", "leukemia"),
    ("меланома", "melanoma"),
    ("глиома", "glioma"),
    ("астроцитома", "astrocytoma"),
    ("медуллобластома", "medulloblastoma"),
    ("нейробластома", "neuroblastoma"),
    ("ретинобластома", "retinoblastoma"),
    ("гепатобластома", "hepatoblastoma"),
    ("нефробластома", "nephroblastoma"),
    ("тератома", "teratoma"),
    ("хориокарцинома", "choriocarcinoma"),
    ("аденома", "adenoma"),
    ("папиллома", "papilloma"),
    ("фиброма", "fibroma"),
    ("липома", "lipoma"),
    ("гемангиома", "hemangioma"),
    ("невус", "nevus"),
    ("кератоз", "keratosis"),
    ("псориаз", "psoriasis"),
    ("экзема", "eczema"),
    ("атопический дерматит", "atopic dermatitis"),
    ("себорейный дерматит", "seborrheic dermatitis"),
    ("контактный дерматит", "contact dermatitis"),
    ("крапивница", "urticaria"),
    ("ангионевротический отек", "angioedema"),
    ("анафилаксия", "anaphylaxis"),
    ("пищевая аллергия", "food allergy"),
    ("лекарственная аллергия", "drug allergy"),
    ("поллиноз", "hay fever"),
    ("аллергический ринит", "allergic rhinitis"),
    ("аллергический конъюнктивит", "allergic conjunctivitis"),
];

struct FallbackDictionary {
    /// Multi-word entries, longest first.
    phrases: Vec<(&'static str, &'static str)>,
    words: HashMap<&'static str, &'static str>,
}

fn dictionary() -> &'static FallbackDictionary {
    static DICT: OnceLock<FallbackDictionary> = OnceLock::new();
    DICT.get_or_init(|| {
        let mut phrases: Vec<_> = FALLBACK_DICTIONARY
            .iter()
            .copied()
            .filter(|(ru, _)| ru.contains(' '))
            .collect();
        phrases.sort_by_key(|(ru, _)| std::cmp::Reverse(ru.chars().count()));

        let mut words: HashMap<&'static str, &'static str> = FALLBACK_DICTIONARY
            .iter()
            .copied()
            .filter(|(ru, _)| !ru.contains(' '))
            .collect();
        // Single words of multi-word entries translate positionally when both
        // sides have the same word count.
        for (ru, en) in &phrases {
            let ru_words: Vec<&'static str> = ru.split(' ').collect();
            let en_words: Vec<&'static str> = en.split(' ').collect();
            if ru_words.len() == en_words.len() {
                for (r, e) in ru_words.into_iter().zip(en_words) {
                    words.entry(r).or_insert(e);
                }
            }
        }
        FallbackDictionary { phrases, words }
    })
}

/// Deterministic dictionary translation used whenever the LLM is unavailable.
///
/// Known phrases are replaced first, then single words; unknown words (names,
/// numbers) are kept verbatim.
pub fn fallback_translation(text: &str) -> String {
    let dict = dictionary();
    let mut padded = format!(" {} ", text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" "));
    for (ru, en) in &dict.phrases {
        let needle = format!(" {ru} ");
        if padded.contains(&needle) {
            padded = padded.replace(&needle, &format!(" {en} "));
        }
    }
    padded
        .split_whitespace()
        .map(|word| dict.words.get(word).copied().unwrap_or(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("valid regex"))
}

fn bracketed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]").expect("valid regex"))
}

fn string_items(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn queries_from_json(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => string_items(items),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("search_queries") {
                if let Some(thinking) = map.get("thinking") {
                    debug!(%thinking, "Translation reasoning");
                }
                return string_items(items);
            }
            if let Some(Value::Array(items)) = map.get("queries") {
                return string_items(items);
            }
            map.values()
                .find_map(|v| match v {
                    Value::Array(items) if items.iter().all(Value::is_string) => {
                        Some(string_items(items))
                    }
                    _ => None,
                })
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

fn queries_from_text(content: &str) -> Vec<String> {
    let quoted: Vec<String> = quoted_re()
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect();
    if !quoted.is_empty() {
        return quoted;
    }
    bracketed_re()
        .captures(content)
        .map(|caps| {
            caps[1]
                .split(',')
                .map(|q| q.trim_matches(|c| matches!(c, ' ' | '"' | '\'')).to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Extracts query strings from any of the shapes models answer with.
pub(crate) fn decode_queries(content: &str, max_queries: usize) -> Vec<String> {
    let raw = match serde_json::from_str::<Value>(content.trim()) {
        Ok(value) => queries_from_json(&value),
        Err(_) => queries_from_text(content),
    };
    raw.into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(max_queries)
        .collect()
}

/// LLM-backed expansion of a diagnosis phrase into English search queries.
pub struct QueryTranslator {
    llm: Arc<dyn LlmClient>,
    policy: RetryPolicy,
    timeout: Duration,
    max_queries: usize,
}

impl QueryTranslator {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &Settings) -> Self {
        Self {
            llm,
            policy: settings.llm.retry,
            timeout: settings.llm.timeout,
            max_queries: settings.ranking.max_search_queries,
        }
    }

    fn request(text: &str, context: Option<&str>) -> ChatRequest {
        let mut user = format!("Disease description in Russian: {text}");
        if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
            user.push_str(&format!("\nAdditional context: {context}"));
        }
        ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            user,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            json_mode: false,
        }
    }

    /// Up to `max_queries` English queries; never fails.
    ///
    /// Any LLM error or an answer without usable queries falls back to
    /// [`fallback_translation`].
    pub async fn generate_queries(&self, text: &str, context: Option<&str>) -> Vec<String> {
        let request = Self::request(text, context);
        let outcome = with_retry(TRANSLATE_API, &self.policy, self.timeout, || {
            self.llm.complete(&request)
        })
        .await;

        let queries = match outcome {
            Ok(content) => {
                debug!(%content, "Translation response");
                decode_queries(&content, self.max_queries)
            }
            Err(err) => {
                warn!(error = %err, text, "Query translation failed; using dictionary fallback");
                return vec![fallback_translation(text)];
            }
        };

        if queries.is_empty() {
            warn!(text, "Translation returned no usable queries; using dictionary fallback");
            return vec![fallback_translation(text)];
        }
        info!(text, count = queries.len(), ?queries, "Generated search queries");
        queries
    }
}
