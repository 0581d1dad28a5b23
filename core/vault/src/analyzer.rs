//! Password strength analysis.
//!
//! The repository only needs a strength class per password; the analyzer
//! is injected so callers can plug in a dictionary-backed estimator.

use std::fmt;

/// Strength rating for a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PasswordStrength {
    VeryWeak,
    Weak,
    Fair,
    Good,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    /// Numeric score from 0 (very weak) to 5 (very strong).
    pub fn score(&self) -> u8 {
        match self {
            PasswordStrength::VeryWeak => 0,
            PasswordStrength::Weak => 1,
            PasswordStrength::Fair => 2,
            PasswordStrength::Good => 3,
            PasswordStrength::Strong => 4,
            PasswordStrength::VeryStrong => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PasswordStrength::VeryWeak => "Very Weak",
            PasswordStrength::Weak => "Weak",
            PasswordStrength::Fair => "Fair",
            PasswordStrength::Good => "Good",
            PasswordStrength::Strong => "Strong",
            PasswordStrength::VeryStrong => "Very Strong",
        }
    }

    /// Whether the audit should flag a password of this strength.
    pub fn is_weak(&self) -> bool {
        matches!(self, PasswordStrength::VeryWeak | PasswordStrength::Weak)
    }

    fn from_entropy(bits: f64) -> Self {
        if bits < 28.0 {
            PasswordStrength::VeryWeak
        } else if bits < 36.0 {
            PasswordStrength::Weak
        } else if bits < 60.0 {
            PasswordStrength::Fair
        } else if bits < 80.0 {
            PasswordStrength::Good
        } else if bits < 100.0 {
            PasswordStrength::Strong
        } else {
            PasswordStrength::VeryStrong
        }
    }
}

impl fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of analyzing one password.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordAnalysis {
    pub strength: PasswordStrength,
    pub score: u8,
    /// Estimated entropy in bits.
    pub entropy: f64,
    /// Suggestions for improvement.
    pub feedback: Vec<String>,
}

/// Classifies password strength.
pub trait PasswordAnalyzer: Send + Sync {
    fn analyze(&self, password: &str) -> PasswordAnalysis;
}

const COMMON_WORDS: &[&str] = &["password", "qwerty", "letmein", "welcome", "admin", "iloveyou"];

/// Character-class entropy estimate with pattern penalties.
///
/// Entropy is `length * log2(charset)`. A common word caps the result at
/// `Weak`; runs and sequences subtract bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntropyAnalyzer;

impl EntropyAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordAnalyzer for EntropyAnalyzer {
    fn analyze(&self, password: &str) -> PasswordAnalysis {
        let chars: Vec<char> = password.chars().collect();
        let length = chars.len();
        let mut feedback = Vec::new();

        let has_lowercase = chars.iter().any(|c| c.is_lowercase());
        let has_uppercase = chars.iter().any(|c| c.is_uppercase());
        let has_digits = chars.iter().any(|c| c.is_ascii_digit());
        let has_symbols = chars.iter().any(|c| !c.is_alphanumeric() && !c.is_whitespace());

        let charset_size: u32 = [
            (has_lowercase, 26),
            (has_uppercase, 26),
            (has_digits, 10),
            (has_symbols, 32),
        ]
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, size)| size)
        .sum();

        let mut entropy = if charset_size > 0 {
            length as f64 * f64::from(charset_size).log2()
        } else {
            0.0
        };

        if length < 8 {
            feedback.push("Use at least 8 characters".to_string());
        } else if length < 12 {
            feedback.push("Consider using 12+ characters".to_string());
        }
        if !has_lowercase || !has_uppercase {
            feedback.push("Mix upper and lower case letters".to_string());
        }
        if !has_digits {
            feedback.push("Add numbers".to_string());
        }
        if !has_symbols {
            feedback.push("Add special characters".to_string());
        }

        let repeats = chars
            .windows(3)
            .filter(|w| w[0] == w[1] && w[1] == w[2])
            .count();
        let sequences = chars
            .windows(3)
            .filter(|w| {
                let (a, b, c) = (
                    i64::from(u32::from(w[0])),
                    i64::from(u32::from(w[1])),
                    i64::from(u32::from(w[2])),
                );
                (b - a == 1 && c - b == 1) || (a - b == 1 && b - c == 1)
            })
            .count();
        if repeats > 0 {
            feedback.push("Avoid repeating characters".to_string());
        }
        if sequences > 0 {
            feedback.push("Avoid sequences like 'abc' or '123'".to_string());
        }
        entropy = (entropy - 4.0 * (repeats + sequences) as f64).max(0.0);

        let mut strength = PasswordStrength::from_entropy(entropy);
        let lowered = password.to_lowercase();
        if COMMON_WORDS.iter().any(|w| lowered.contains(w)) {
            feedback.push("Avoid common words".to_string());
            strength = strength.min(PasswordStrength::Weak);
        }

        PasswordAnalysis {
            strength,
            score: strength.score(),
            entropy,
            feedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strength(password: &str) -> PasswordStrength {
        EntropyAnalyzer.analyze(password).strength
    }

    #[test]
    fn test_very_weak() {
        assert_eq!(strength(""), PasswordStrength::VeryWeak);
        assert_eq!(strength("xyz"), PasswordStrength::VeryWeak);
        assert_eq!(strength("123456"), PasswordStrength::VeryWeak);
    }

    #[test]
    fn test_common_word_is_capped() {
        let analysis = EntropyAnalyzer.analyze("MyPassword2024!");
        assert!(analysis.strength.is_weak());
        assert!(analysis.feedback.iter().any(|f| f.contains("common")));
    }

    #[test]
    fn test_mixed_passwords() {
        assert_eq!(strength("N3wP@ss!"), PasswordStrength::Fair);
        assert_eq!(strength("Tr0ub4dor&3"), PasswordStrength::Good);
        assert!(strength("c0rrect-H0rse-b4ttery-St@ple") >= PasswordStrength::Strong);
    }

    #[test]
    fn test_patterns_reduce_entropy() {
        let plain = EntropyAnalyzer.analyze("Kq7!mZ2#");
        let patterned = EntropyAnalyzer.analyze("Abc123!!!");
        assert!(patterned.feedback.iter().any(|f| f.contains("repeating")));
        assert!(patterned.feedback.iter().any(|f| f.contains("sequences")));
        assert!(plain.feedback.iter().all(|f| !f.contains("sequences")));
    }

    #[test]
    fn test_score_matches_strength() {
        let analysis = EntropyAnalyzer.analyze("Tr0ub4dor&3");
        assert_eq!(analysis.score, 3);
        assert!(analysis.entropy > 60.0);
        assert_eq!(PasswordStrength::Weak.to_string(), "Weak");
    }
}
