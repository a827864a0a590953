//! Text vectorizers.
//!
//! Fitting reads only the train partition; `transform` never mutates state.
//! Tokens unseen at fit time are ignored at transform time, so applying the
//! fitted transform to held-out or live data cannot raise on unknown values.

use crate::error::{PipelineError, Result};
use crate::params::{FeatureParams, VectorizerKind};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whitespace tokenizer with n-gram expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokenizer {
    min_token_length: usize,
    ngram_max: usize,
}

impl Tokenizer {
    pub fn new(min_token_length: usize, ngram_max: usize) -> Self {
        Self {
            min_token_length,
            ngram_max: ngram_max.max(1),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty() && s.len() >= self.min_token_length)
            .map(|s| s.to_lowercase())
            .collect();

        let mut terms = Vec::with_capacity(tokens.len() * self.ngram_max);
        for n in 1..=self.ngram_max {
            if tokens.len() >= n {
                for window in tokens.windows(n) {
                    terms.push(window.join(" "));
                }
            }
        }
        terms
    }
}

/// Count-based vectorizer with a fixed, deterministically ordered vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountVectorizer {
    tokenizer: Tokenizer,
    vocabulary: HashMap<String, usize>,
    max_features: Option<usize>,
}

impl CountVectorizer {
    pub fn new(tokenizer: Tokenizer, max_features: Option<usize>) -> Self {
        Self {
            tokenizer,
            vocabulary: HashMap::new(),
            max_features,
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let terms = self.tokenizer.tokenize(doc);
            let unique: std::collections::HashSet<&String> = terms.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }

        // Order by document frequency, ties broken lexicographically, so the
        // fitted vocabulary is identical across runs.
        let mut ranked: Vec<(String, usize)> = doc_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        if let Some(max) = self.max_features {
            ranked.truncate(max);
        }

        if ranked.is_empty() {
            return Err(PipelineError::EmptyVocabulary {
                n_docs: documents.len(),
            });
        }

        self.vocabulary.clear();
        for (idx, (term, _)) in ranked.into_iter().enumerate() {
            self.vocabulary.insert(term, idx);
        }
        Ok(())
    }

    pub fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }

        let n_features = self.vocabulary.len();
        let rows: Vec<Vec<f64>> = documents
            .par_iter()
            .map(|doc| {
                let mut row = vec![0.0; n_features];
                for term in self.tokenizer.tokenize(doc) {
                    // Terms outside the fitted vocabulary are skipped.
                    if let Some(&idx) = self.vocabulary.get(&term) {
                        row[idx] += 1.0;
                    }
                }
                row
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((documents.len(), n_features), flat).map_err(|e| {
            PipelineError::ShapeError {
                expected: format!("{} x {}", documents.len(), n_features),
                actual: e.to_string(),
            }
        })
    }

    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }
}

/// TF-IDF vectorizer on top of the count vectorizer, with smoothed IDF and
/// L2 row normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    counts: CountVectorizer,
    idf: Option<Vec<f64>>,
}

impl TfidfVectorizer {
    pub fn new(tokenizer: Tokenizer, max_features: Option<usize>) -> Self {
        Self {
            counts: CountVectorizer::new(tokenizer, max_features),
            idf: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.idf.is_some()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.counts.vocabulary_len()
    }

    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        self.counts.fit(documents)?;

        let count_matrix = self.counts.transform(documents)?;
        let n_docs = documents.len() as f64;
        let idf: Vec<f64> = (0..count_matrix.ncols())
            .map(|j| {
                let df = count_matrix.column(j).iter().filter(|&&v| v > 0.0).count() as f64;
                ((n_docs + 1.0) / (df + 1.0)).ln() + 1.0
            })
            .collect();

        self.idf = Some(idf);
        Ok(())
    }

    pub fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        let idf = self.idf.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        let mut matrix = self.counts.transform(documents)?;

        for mut row in matrix.rows_mut() {
            for (value, idf_j) in row.iter_mut().zip(idf.iter()) {
                *value *= idf_j;
            }
            let norm: f64 = row.iter().map(|&v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }

        Ok(matrix)
    }

    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }
}

/// Tagged feature transform; new vectorizer families are added as variants
/// without touching the training or serving paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Vectorizer {
    Count(CountVectorizer),
    Tfidf(TfidfVectorizer),
}

impl Vectorizer {
    pub fn from_params(params: &FeatureParams) -> Self {
        let tokenizer = Tokenizer::new(params.min_token_length, params.ngram_max);
        match params.vectorizer {
            VectorizerKind::Count => {
                Self::Count(CountVectorizer::new(tokenizer, params.max_features))
            }
            VectorizerKind::Tfidf => {
                Self::Tfidf(TfidfVectorizer::new(tokenizer, params.max_features))
            }
        }
    }

    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        match self {
            Self::Count(v) => v.fit(documents),
            Self::Tfidf(v) => v.fit(documents),
        }
    }

    pub fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        match self {
            Self::Count(v) => v.transform(documents),
            Self::Tfidf(v) => v.transform(documents),
        }
    }

    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    pub fn vocabulary_len(&self) -> usize {
        match self {
            Self::Count(v) => v.vocabulary_len(),
            Self::Tfidf(v) => v.vocabulary_len(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            Self::Count(v) => v.is_fitted(),
            Self::Tfidf(v) => v.is_fitted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenizer_min_length_and_ngrams() {
        let tokenizer = Tokenizer::new(2, 2);
        let terms = tokenizer.tokenize("a big dog");
        assert!(terms.contains(&"big".to_string()));
        assert!(terms.contains(&"dog".to_string()));
        assert!(terms.contains(&"big dog".to_string()));
        assert!(!terms.contains(&"a".to_string()));
    }

    #[test]
    fn test_count_vectorizer_counts_terms() {
        let mut v = CountVectorizer::new(Tokenizer::new(2, 1), None);
        let x = v.fit_transform(&docs(&["spam spam ham", "ham eggs"])).unwrap();
        assert_eq!(x.nrows(), 2);
        assert_eq!(x.ncols(), 3);
        // Each row sums to the number of kept tokens in the document.
        assert_eq!(x.row(0).sum(), 3.0);
        assert_eq!(x.row(1).sum(), 2.0);
    }

    #[test]
    fn test_fit_ordering_is_deterministic() {
        let corpus = docs(&["one two three", "two three four", "three four five"]);
        let mut a = CountVectorizer::new(Tokenizer::new(2, 1), Some(3));
        let mut b = CountVectorizer::new(Tokenizer::new(2, 1), Some(3));
        a.fit(&corpus).unwrap();
        b.fit(&corpus).unwrap();
        assert_eq!(a.vocabulary, b.vocabulary);
    }

    #[test]
    fn test_unknown_tokens_are_ignored() {
        let mut v = CountVectorizer::new(Tokenizer::new(2, 1), None);
        v.fit(&docs(&["alpha beta"])).unwrap();
        let x = v.transform(&docs(&["gamma delta alpha"])).unwrap();
        assert_eq!(x.row(0).sum(), 1.0);
    }

    #[test]
    fn test_empty_vocabulary_is_an_error() {
        let mut v = CountVectorizer::new(Tokenizer::new(2, 1), None);
        let err = v.fit(&docs(&["a", "i"])).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyVocabulary { .. }));
    }

    #[test]
    fn test_tfidf_rows_are_unit_norm() {
        let mut v = TfidfVectorizer::new(Tokenizer::new(2, 1), None);
        let x = v.fit_transform(&docs(&["spam offer now", "meeting notes today"])).unwrap();
        for row in x.rows() {
            let norm: f64 = row.iter().map(|&v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_transform_does_not_mutate_state() {
        let mut v = Vectorizer::from_params(&FeatureParams::default());
        v.fit(&docs(&["alpha beta gamma"])).unwrap();
        let before = serde_json::to_string(&v).unwrap();
        let _ = v.transform(&docs(&["beta delta"])).unwrap();
        let after = serde_json::to_string(&v).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_serde_round_trip_preserves_transform() {
        let mut v = Vectorizer::from_params(&FeatureParams::default());
        let corpus = docs(&["free offer now", "lunch at noon"]);
        v.fit(&corpus).unwrap();
        let reloaded: Vectorizer =
            serde_json::from_str(&serde_json::to_string(&v).unwrap()).unwrap();
        let a = v.transform(&corpus).unwrap();
        let b = reloaded.transform(&corpus).unwrap();
        assert_eq!(a, b);
    }
}
