/// A catalog row for a model known to work well for shell commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub ollama_name: &'static str,
    pub description: &'static str,
    pub size: &'static str,
    pub model_type: &'static str,
    pub recommended: bool,
}

/// Catalog of selectable models, in display and selection order
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "llama3.2:3b",
        ollama_name: "llama3.2:3b",
        description: "Llama 3.2 3B - Fast and efficient for command generation",
        size: "2.0GB",
        model_type: "Language Model",
        recommended: true,
    },
    CatalogEntry {
        name: "llama3.2:1b",
        ollama_name: "llama3.2:1b",
        description: "Llama 3.2 1B - Ultra-fast and lightweight",
        size: "1.3GB",
        model_type: "Language Model",
        recommended: true,
    },
    CatalogEntry {
        name: "codegemma:7b",
        ollama_name: "codegemma:7b",
        description: "CodeGemma 7B - Specialized for code and shell commands",
        size: "5.0GB",
        model_type: "Code Model",
        recommended: true,
    },
    CatalogEntry {
        name: "llama3.1:8b",
        ollama_name: "llama3.1:8b",
        description: "Llama 3.1 8B - Balanced performance and accuracy",
        size: "4.7GB",
        model_type: "Language Model",
        recommended: false,
    },
    CatalogEntry {
        name: "mistral:7b",
        ollama_name: "mistral:7b",
        description: "Mistral 7B - Good general purpose model",
        size: "4.1GB",
        model_type: "Language Model",
        recommended: false,
    },
    CatalogEntry {
        name: "phi3:mini",
        ollama_name: "phi3:mini",
        description: "Phi-3 Mini - Microsoft's compact model",
        size: "2.3GB",
        model_type: "Small Model",
        recommended: false,
    },
];

impl CatalogEntry {
    /// Find catalog entry by name or Ollama identifier
    #[must_use]
    pub fn find(name: &str) -> Option<&'static Self> {
        CATALOG
            .iter()
            .find(|m| m.name == name || m.ollama_name == name)
    }

    /// Get all model names
    #[must_use]
    pub fn all_names() -> Vec<&'static str> {
        CATALOG.iter().map(|m| m.name).collect()
    }

    /// Find closest match using Levenshtein distance
    #[must_use]
    pub fn suggest(name: &str) -> Option<&'static str> {
        if name.is_empty() {
            return None;
        }

        CATALOG
            .iter()
            .map(|m| (m.name, levenshtein_distance(name, m.name)))
            .min_by_key(|(_, dist)| *dist)
            .filter(|(_, dist)| *dist <= 2) // Only suggest if within 2 edits
            .map(|(model_name, _)| model_name)
    }
}

/// A catalog entry together with its reconciled readiness
///
/// Built fresh on every listing; `downloaded` is only ever set by the
/// inventory reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub ollama_name: String,
    pub description: String,
    pub size: String,
    pub model_type: String,
    pub recommended: bool,
    pub downloaded: bool,
}

impl ModelDescriptor {
    #[must_use]
    pub fn new(entry: &CatalogEntry, downloaded: bool) -> Self {
        Self {
            name: entry.name.to_string(),
            ollama_name: entry.ollama_name.to_string(),
            description: entry.description.to_string(),
            size: entry.size.to_string(),
            model_type: entry.model_type.to_string(),
            recommended: entry.recommended,
            downloaded,
        }
    }
}

/// Pick the model to use: configured default, then first downloaded, then
/// first recommended, then first listed.
#[must_use]
pub fn select_current(models: &[ModelDescriptor], default_model: &str) -> Option<ModelDescriptor> {
    models
        .iter()
        .find(|m| m.name == default_model || m.ollama_name == default_model)
        .or_else(|| models.iter().find(|m| m.downloaded))
        .or_else(|| models.iter().find(|m| m.recommended))
        .or_else(|| models.first())
        .cloned()
}

/// Pick a recommended model, preferring one that is already downloaded
#[must_use]
pub fn select_recommended(models: &[ModelDescriptor]) -> Option<ModelDescriptor> {
    models
        .iter()
        .find(|m| m.recommended && m.downloaded)
        .or_else(|| models.iter().find(|m| m.recommended))
        .or_else(|| models.first())
        .cloned()
}

/// Calculate Levenshtein distance between two strings
#[allow(clippy::needless_range_loop)]
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let (len1, len2) = (s1_chars.len(), s2_chars.len());

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for i in 0..=len1 {
        matrix[i][0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for (i, c1) in s1_chars.iter().enumerate() {
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != c2);
            matrix[i + 1][j + 1] = (matrix[i][j + 1] + 1)
                .min(matrix[i + 1][j] + 1)
                .min(matrix[i][j] + cost);
        }
    }

    matrix[len1][len2]
}
