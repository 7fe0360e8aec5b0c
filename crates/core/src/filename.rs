use std::path::Path;

/// Values encoded in the generation tool's file naming convention:
/// `<testNumber>-<test-name...>-seed<seed>-...-<batchNumber>.png`,
/// with `_` and `-` interchangeable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameInfo {
    pub test_number: Option<String>,
    pub batch_number: Option<String>,
    pub seed: Option<String>,
    pub test_name: Option<String>,
}

impl FilenameInfo {
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::parse(&stem)
    }

    pub fn parse(stem: &str) -> Self {
        let normalized = stem.replace('_', "-");
        let mut tokens: Vec<&str> = normalized
            .split('-')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        let mut info = Self::default();

        if tokens.first().is_some_and(|t| is_numeric(t)) {
            info.test_number = Some(tokens.remove(0).to_string());
        }
        if tokens.last().is_some_and(|t| is_numeric(t)) {
            info.batch_number = tokens.pop().map(str::to_string);
        }

        for (index, token) in tokens.iter().enumerate() {
            let lower = token.to_ascii_lowercase();
            let Some(rest) = lower.strip_prefix("seed") else {
                continue;
            };

            let seed = if rest.is_empty() {
                tokens.get(index + 1).filter(|t| is_numeric(t)).copied()
            } else if is_numeric(rest) {
                Some(&token[4..])
            } else {
                None
            };

            if let Some(seed) = seed {
                info.seed = Some(seed.to_string());
                info.test_name = Some(tokens[..index].join("-"));
                break;
            }
        }

        info
    }
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}
